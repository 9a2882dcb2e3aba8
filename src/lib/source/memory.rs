use std::collections::HashMap;

use super::{DeclarationSource, Package, Scan};
use crate::{ast, parser, pretty_error, Error};

/// Declarations which are already in memory.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    root: Vec<ast::File>,
    packages: HashMap<String, Vec<ast::File>>,
    /// Every location `load` was called with, in order
    pub loads: Vec<String>,
}

fn parse(name: &str, src: &str) -> Result<ast::File, Error> {
    parser::go::file(src).map_err(|e| Error::Parse(format!("{}:{}", name, pretty_error(src, e))))
}

impl Memory {
    pub fn new(root: Vec<ast::File>) -> Memory {
        Memory {
            root,
            ..Memory::default()
        }
    }

    /// Parses `src` as the single file of the scanned package
    pub fn parse(src: &str) -> Result<Memory, Error> { Ok(Memory::new(vec![parse("<root>", src)?])) }

    pub fn with_package(mut self, location: &str, files: Vec<ast::File>) -> Memory {
        self.packages.entry(location.to_string()).or_default().extend(files);
        self
    }

    /// Parses `src` as a file of the package at `location`
    pub fn with_source(self, location: &str, src: &str) -> Result<Memory, Error> {
        let file = parse(location, src)?;
        Ok(self.with_package(location, vec![file]))
    }
}

impl DeclarationSource for Memory {
    fn scan(&mut self) -> Result<Scan, Error> { Ok(Scan::from_files(self.root.clone())) }

    fn load(&mut self, location: &str) -> Result<Option<Package>, Error> {
        self.loads.push(location.to_string());
        Ok(self
            .packages
            .get(location)
            .map(|files| Package::from_files(files.clone())))
    }
}
