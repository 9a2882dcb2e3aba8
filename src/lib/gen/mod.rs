//! Renders the output model as source code
use std::fmt::Write;

use super::model::OutputStruct;

pub mod gen_ctx;
pub mod go;

pub use self::go::Go;

pub trait Language {}

/// Everything which comes before the first definition
pub trait Common {
    fn gen_common(&self, out: &mut String);
}

pub trait Definition<Lang: Language> {
    fn gen_def(&self, lang: &Lang, out: &mut String);
}

/// Renders every struct, sorted by name, after the common preamble
pub fn generate<Lang>(lang: &Lang, structs: &[OutputStruct]) -> String
where
    Lang: Language + Common,
    OutputStruct: Definition<Lang>,
{
    let mut sorted = structs.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = String::new();
    lang.gen_common(&mut out);
    for def in sorted {
        append!(out, "\n");
        def.gen_def(lang, &mut out);
    }
    out
}
