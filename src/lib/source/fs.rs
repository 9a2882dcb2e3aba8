//! Reads declarations from Go source files on disk
//!
//! Import paths are mapped to directories through the `go.mod` of the
//! module containing the scanned directory: the module itself, its local
//! `replace` targets, and its requirements inside the module cache.
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use super::{DeclarationSource, Package, Scan};
use crate::{ast, parser, pretty_error, Error};

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_source_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "go")
        && !path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.ends_with("_test.go"))
}

/// Directories the go tool ignores when matching `./...`
fn is_ignored_dir(name: &str) -> bool { name.starts_with('.') || name.starts_with('_') || name == "testdata" || name == "vendor" }

fn parse_file(path: &Path) -> Result<ast::File, Error> {
    let src = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    parser::go::file(&src).map_err(|e| Error::Parse(format!("{}:{}", path.display(), pretty_error(&src, e))))
}

/// Escapes a module path the way the module cache does: every uppercase
/// letter becomes `!` followed by its lowercase form.
pub fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `$GOMODCACHE`, or `$GOPATH/pkg/mod`, or `~/go/pkg/mod`
pub fn module_cache_dir() -> Option<PathBuf> {
    if let Some(cache) = env::var_os("GOMODCACHE").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(cache));
    }
    let gopath = match env::var_os("GOPATH").filter(|v| !v.is_empty()) {
        Some(gopath) => env::split_paths(&gopath).next()?,
        None => PathBuf::from(env::var_os("HOME")?).join("go"),
    };
    Some(gopath.join("pkg").join("mod"))
}

/// Walks up from `from` to the first directory containing a `go.mod`.
pub fn find_module_root(from: &Path) -> Option<PathBuf> {
    let start = fs::canonicalize(from).unwrap_or_else(|_| from.to_path_buf());
    start.ancestors().find(|dir| dir.join("go.mod").is_file()).map(Path::to_path_buf)
}

fn unquote(s: &str) -> &str { s.trim().trim_matches('"') }

fn is_local_path(path: &str) -> bool { path == "." || path.starts_with("./") || path.starts_with("../") || path.starts_with('/') }

/// Module paths and the directories holding them
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Modules {
    dirs: HashMap<String, PathBuf>,
}

impl Modules {
    /// Reads the `module`, `require` and `replace` directives of a `go.mod`.
    /// Lines which are not understood are skipped.
    pub fn parse(go_mod: &str, root: &Path, cache: Option<&Path>) -> Modules {
        let mut modules = Modules::default();
        let mut requires = Vec::new();
        let mut replaces = Vec::new();
        let mut block: Option<&str> = None;

        for line in go_mod.lines() {
            let line = match line.find("//") {
                Some(i) => &line[..i],
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            if block.is_some() && line == ")" {
                block = None;
                continue;
            }
            let (directive, rest) = match block {
                Some(directive) => (directive, line),
                None => match line.split_once(char::is_whitespace) {
                    Some((directive, rest)) => (directive, rest.trim()),
                    None => continue,
                },
            };
            if rest == "(" {
                block = Some(match directive {
                    "require" => "require",
                    "replace" => "replace",
                    _ => "",
                });
                continue;
            }
            match directive {
                "module" => {
                    modules.dirs.insert(unquote(rest).to_string(), root.to_path_buf());
                }
                "require" => {
                    let mut parts = rest.split_whitespace().map(unquote);
                    if let (Some(path), Some(version)) = (parts.next(), parts.next()) {
                        requires.push((path.to_string(), version.to_string()));
                    }
                }
                "replace" => {
                    if let Some((old, new)) = rest.split_once("=>") {
                        let old = old.split_whitespace().map(unquote).next();
                        let mut new = new.split_whitespace().map(unquote);
                        if let (Some(old), Some(path)) = (old, new.next()) {
                            replaces.push((old.to_string(), path.to_string(), new.next().map(String::from)));
                        }
                    }
                }
                _ => (),
            }
        }

        let in_cache = |path: &str, version: &str| cache.map(|c| c.join(format!("{}@{}", escape_module_path(path), version)));
        for (path, version) in requires {
            if let Some(dir) = in_cache(&path, &version) {
                modules.dirs.entry(path).or_insert(dir);
            }
        }
        for (old, new, version) in replaces {
            let dir = if is_local_path(&new) {
                Some(root.join(new))
            } else {
                version.and_then(|v| in_cache(&new, &v))
            };
            if let Some(dir) = dir {
                modules.dirs.insert(old, dir);
            }
        }
        modules
    }

    /// Directory of the package at `import_path`, if it is inside a known module
    pub fn resolve(&self, import_path: &str) -> Option<PathBuf> {
        let parts = import_path.split('/').collect::<Vec<_>>();
        // longest module path first
        (1..=parts.len()).rev().find_map(|i| {
            let dir = self.dirs.get(&parts[..i].join("/"))?;
            Some(parts[i..].iter().fold(dir.clone(), |dir, part| dir.join(part)))
        })
    }
}

/// Scans a directory tree of Go files
pub struct Fs {
    root: PathBuf,
    skip: Vec<PathBuf>,
    modules: Option<Modules>,
}

impl Fs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Fs {
        Fs {
            root: root.into(),
            skip: Vec::new(),
            modules: None,
        }
    }

    /// Leaves `dir` out of the scan; used for the output directory.
    pub fn skipping<P: AsRef<Path>>(mut self, dir: P) -> Fs {
        if let Ok(dir) = fs::canonicalize(dir) {
            self.skip.push(dir);
        }
        self
    }

    fn is_skipped(&self, dir: &Path) -> bool {
        !self.skip.is_empty()
            && fs::canonicalize(dir)
                .map(|dir| self.skip.iter().any(|s| *s == dir))
                .unwrap_or(false)
    }

    fn modules(&mut self) -> &Modules {
        let root = &self.root;
        self.modules.get_or_insert_with(|| {
            let module_root = match find_module_root(root) {
                Some(dir) => dir,
                None => {
                    debug!(dir = %root.display(), "no go.mod found, external types stay opaque");
                    return Modules::default();
                }
            };
            match fs::read_to_string(module_root.join("go.mod")) {
                Ok(go_mod) => Modules::parse(&go_mod, &module_root, module_cache_dir().as_deref()),
                Err(e) => {
                    debug!(dir = %module_root.display(), error = %e, "unable to read go.mod");
                    Modules::default()
                }
            }
        })
    }
}

impl DeclarationSource for Fs {
    fn scan(&mut self) -> Result<Scan, Error> {
        fs::metadata(&self.root).map_err(|e| io_error(&self.root, e))?;
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !(entry.file_name().to_str().map_or(false, is_ignored_dir) || self.is_skipped(entry.path()))
            });
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                io_error(&path, e.into())
            })?;
            if entry.file_type().is_file() && is_source_file(entry.path()) {
                trace!(file = %entry.path().display(), "scanning");
                files.push(parse_file(entry.path())?);
            }
        }
        debug!(dir = %self.root.display(), files = files.len(), "scanned");
        Ok(Scan::from_files(files))
    }

    fn load(&mut self, location: &str) -> Result<Option<Package>, Error> {
        let dir = match self.modules().resolve(location) {
            Some(dir) if dir.is_dir() => dir,
            _ => return Ok(None),
        };
        let mut paths = fs::read_dir(&dir)
            .map_err(|e| io_error(&dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_source_file(path))
            .collect::<Vec<_>>();
        paths.sort();
        let files = paths.iter().map(|p| parse_file(p)).collect::<Result<Vec<_>, _>>()?;
        debug!(location, dir = %dir.display(), files = files.len(), "loaded package");
        Ok(Some(Package::from_files(files)))
    }
}
