//! Where declarations come from
//!
//! The builder asks a [`DeclarationSource`] for the declarations of the
//! scanned package once, and for the declarations of any other package it
//! meets a reference into, on demand.
use std::collections::HashMap;

use super::{ast, Error};

pub mod fs;
pub mod memory;

pub use self::fs::Fs;
pub use self::memory::Memory;

pub trait DeclarationSource {
    /// Declarations of the scanned package
    fn scan(&mut self) -> Result<Scan, Error>;
    /// Declarations of the package at `location` (an import path), or `None`
    /// if nothing is known about it
    fn load(&mut self, location: &str) -> Result<Option<Package>, Error>;
}

/// Contents of the scanned package
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Scan {
    /// Structs, collection aliases and instantiation aliases, in declaration order
    pub decls: Vec<ast::Decl>,
    pub imports: Vec<ast::Import>,
}

impl Scan {
    pub fn from_files(files: Vec<ast::File>) -> Scan {
        let mut scan = Scan::default();
        for file in files {
            scan.imports.extend(file.imports);
            scan.decls.extend(
                file.decls
                    .into_iter()
                    .filter(|d| !matches!(d, ast::Decl::Alias { .. })),
            );
        }
        scan
    }
}

/// Contents of a package other than the scanned one
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Package {
    /// Struct fields, by struct name
    pub structs: HashMap<String, Vec<ast::RawField>>,
    /// Targets of `type X = Y` aliases
    pub aliases: HashMap<String, ast::TypeExpr>,
    pub imports: Vec<ast::Import>,
}

impl Package {
    pub fn from_files(files: Vec<ast::File>) -> Package {
        let mut pkg = Package::default();
        for file in files {
            pkg.imports.extend(file.imports);
            for decl in file.decls {
                match decl {
                    ast::Decl::Struct { name, fields, .. } => {
                        pkg.structs.entry(name).or_insert(fields);
                    }
                    ast::Decl::Alias { name, target } => {
                        pkg.aliases.entry(name).or_insert(target);
                    }
                    _ => (),
                }
            }
        }
        pkg
    }

    pub fn find_struct(&self, name: &str) -> Option<&[ast::RawField]> { self.structs.get(name).map(|f| f.as_slice()) }
}
