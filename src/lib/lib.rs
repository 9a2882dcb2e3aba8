#[macro_use]
extern crate thiserror;

use std::fs;
use std::path::PathBuf;

use peg::error::ParseError;
use peg::str::LineCol;
use tracing::info;

#[macro_use]
mod macros;

pub mod ast;
pub mod builder;
mod external;
pub mod gen;
pub mod manifest;
pub mod mapper;
pub mod model;
pub mod options;
pub mod parser;
pub mod patch;
pub mod snapshot;
pub mod source;
pub mod tag;
pub mod transform;

pub use builder::Builder;
pub use options::{EmbedMode, Layer, Options, TagFilter};
pub use source::DeclarationSource;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Parsing failed with:\n{0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("{}: {}", .path.display(), .source)]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Manifest error: {0}")]
    Manifest(String),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

pub(crate) fn pretty_error(file: &str, err: ParseError<LineCol>) -> String {
    let mut out_str = String::new();
    let token = match file.get(err.location.offset..).and_then(|rest| rest.chars().next()) {
        Some(c) => format!("'{}'", c.escape_default()),
        None => "end of input".to_string(),
    };
    out_str += &format!(
        "\nUnexpected {} at line {}, column {}, expected {}",
        token, err.location.line, err.location.column, err.expected
    );
    let line = file.split('\n').nth(err.location.line - 1).unwrap_or("");
    out_str += &format!("\n|\n|  {}\n", line);
    let mark_column = match err.location.column {
        n if n < 1 => 0,
        n => n - 1,
    };
    out_str += &format!("|~~{}^\n", "~".repeat(mark_column));

    out_str
}

/// Runs the whole pipeline over the declarations of `source`, and returns
/// the contents of the generated file.
pub fn generate(opts: &Options, source: &mut dyn DeclarationSource) -> Result<String, Error> {
    let mut builder = Builder::new(opts, source)?;
    let types = builder.build_all();

    let mut structs = mapper::to_output(&types, opts);
    let bases = structs.len();
    patch::synthesize(&mut structs, opts);
    info!(types = bases, patches = structs.len() - bases, "mapped types");

    let lang = gen::Go::new(&gen::go::package_name(&opts.out_dir), builder.imports(), &structs);
    Ok(gen::generate(&lang, &structs))
}

/// Writes `contents` to the output path, creating the output directory.
pub fn write(opts: &Options, contents: &str) -> Result<PathBuf, Error> {
    fs::create_dir_all(&opts.out_dir).map_err(|source| Error::Io {
        path: opts.out_dir.clone(),
        source,
    })?;
    let path = opts.out_path();
    fs::write(&path, contents).map_err(|source| Error::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), bytes = contents.len(), "wrote generated file");
    Ok(path)
}

/// Generates from the Go files under the input directory, and writes the result.
pub fn run(opts: &Options) -> Result<PathBuf, Error> {
    let mut source = source::Fs::new(opts.in_dir.clone()).skipping(&opts.out_dir);
    let contents = generate(opts, &mut source)?;
    write(opts, &contents)
}
