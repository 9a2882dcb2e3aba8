use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write;
use std::path::Path;

use super::gen_ctx::GenCtx;
use super::*;
use crate::model::OutputRef;

pub const HEADER: &str = "// Code generated by dtoc. DO NOT EDIT.";

#[derive(Clone, PartialEq, Debug, Default)]
pub struct Go {
    package: String,
    /// Import path to the alias it is referred to by
    imports: BTreeMap<String, String>,
    patch_slice: bool,
}
impl Language for Go {}

fn path_base(path: &str) -> &str { path.rsplit('/').next().unwrap_or(path) }

/// Name of the package generated into `out_dir`
pub fn package_name(out_dir: &Path) -> String {
    let base = out_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>();
    if name.is_empty() {
        return "api".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'v');
    }
    name
}

impl Go {
    /// `aliases` maps import aliases to import paths, every location the
    /// structs refer to is imported under its alias from there, or else under
    /// the base of its path. A clashing alias gets a number, `model2`.
    pub fn new(package: &str, aliases: &BTreeMap<String, String>, structs: &[OutputStruct]) -> Go {
        let locations = structs.iter().flat_map(|def| def.imports.iter()).collect::<BTreeSet<_>>();
        let patch_slice = structs
            .iter()
            .any(|def| def.fields.iter().any(|f| f.r#type.uses_patch_collection()));

        let mut imports = BTreeMap::new();
        let mut taken = HashSet::new();
        for location in locations {
            let wanted = aliases
                .iter()
                .find(|(_, path)| path.as_str() == location.as_str())
                .map(|(alias, _)| alias.clone())
                .unwrap_or_else(|| path_base(location).to_string());
            let mut alias = wanted.clone();
            let mut count = 1;
            while taken.contains(&alias) {
                count += 1;
                alias = format!("{}{}", wanted, count);
            }
            taken.insert(alias.clone());
            imports.insert(location.clone(), alias);
        }
        Go {
            package: package.to_string(),
            imports,
            patch_slice,
        }
    }

    pub fn type_ref(&self, r: &OutputRef) -> String {
        match r {
            OutputRef::Pointer(inner) => format!("*{}", self.type_ref(inner)),
            OutputRef::Collection(inner) => format!("[]{}", self.type_ref(inner)),
            OutputRef::PatchCollection(inner) => format!("PatchSlice[{}]", self.type_ref(inner)),
            OutputRef::Leaf {
                name,
                location: Some(location),
            } => match self.imports.get(location) {
                Some(alias) => format!("{}.{}", alias, name),
                None => name.clone(),
            },
            OutputRef::Leaf { name, location: None } => name.clone(),
        }
    }
}

impl Common for Go {
    fn gen_common(&self, out: &mut String) {
        appendln!(out, "{}", HEADER);
        appendln!(out);
        appendln!(out, "package {}", self.package);
        if !self.imports.is_empty() {
            appendln!(out);
            appendln!(out, "import (");
            for (path, alias) in self.imports.iter() {
                if alias == path_base(path) {
                    appendln!(out, "\t\"{}\"", path);
                } else {
                    appendln!(out, "\t{} \"{}\"", alias, path);
                }
            }
            appendln!(out, ")");
        }
        if self.patch_slice {
            appendln!(out);
            appendln!(out, "// PatchSlice is a collection whose elements are patched individually");
            appendln!(out, "type PatchSlice[T any] []T");
        }
    }
}

impl Definition<Go> for OutputStruct {
    fn gen_def(&self, lang: &Go, out: &mut String) {
        let mut ctx = GenCtx::new(out);
        ctx.comment(&self.comment);

        if let Some(alias) = &self.alias {
            let star = if self.alias_ptr { "*" } else { "" };
            appendln!(ctx.out, "type {} []{}{}", self.name, star, alias);
            return;
        }
        if self.fields.is_empty() {
            appendln!(ctx.out, "type {} struct{{}}", self.name);
            return;
        }

        appendln!(ctx.out, "type {} struct {{", self.name);
        ctx.push_indent();
        for field in self.fields.iter() {
            ctx.comment(&field.comment);
            let r#type = lang.type_ref(&field.r#type);
            let tag = if field.tag.is_empty() {
                String::new()
            } else {
                format!(" `{}`", field.tag)
            };
            if field.embedded {
                appendln!(ctx.out, "{}{}{}", ctx.indentation, r#type, tag);
            } else {
                appendln!(ctx.out, "{}{} {}{}", ctx.indentation, field.name, r#type, tag);
            }
        }
        ctx.pop_indent();
        appendln!(ctx.out, "}}");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::OutputField;
    use crate::tag::StructTag;

    fn field(name: &str, r#type: OutputRef, tag: &str) -> OutputField {
        OutputField {
            name: name.to_string(),
            r#type,
            tag: StructTag::parse(tag),
            raw_tag: StructTag::parse(tag),
            comment: String::new(),
            embedded: false,
        }
    }

    #[test]
    fn renders_go() {
        let structs = vec![
            OutputStruct {
                name: "Widget".to_string(),
                comment: "Widget is a widget".to_string(),
                fields: vec![
                    field(
                        "ID",
                        OutputRef::external("UUID", "github.com/google/uuid"),
                        "json:\"id\"",
                    ),
                    OutputField {
                        comment: "last change".to_string(),
                        ..field("When", OutputRef::pointer(OutputRef::external("Time", "time")), "")
                    },
                    OutputField {
                        embedded: true,
                        ..field("Model", OutputRef::external("Model", "example.com/base/model"), "")
                    },
                ],
                imports: ["github.com/google/uuid", "time", "example.com/base/model"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                ..OutputStruct::default()
            },
            OutputStruct {
                name: "Widgets".to_string(),
                alias: Some("Widget".to_string()),
                alias_ptr: true,
                ..OutputStruct::default()
            },
            OutputStruct {
                name: "WidgetPatch".to_string(),
                fields: vec![field(
                    "Parts",
                    OutputRef::pointer(OutputRef::patch_collection(OutputRef::pointer(OutputRef::leaf(
                        "PartPatch",
                    )))),
                    "",
                )],
                ..OutputStruct::default()
            },
            OutputStruct {
                name: "Empty".to_string(),
                ..OutputStruct::default()
            },
        ];
        let mut aliases = BTreeMap::new();
        aliases.insert("m".to_string(), "example.com/base/model".to_string());
        aliases.insert("uuid".to_string(), "github.com/google/uuid".to_string());

        let go = Go::new("api", &aliases, &structs);
        let expected = [
            "// Code generated by dtoc. DO NOT EDIT.",
            "",
            "package api",
            "",
            "import (",
            "\tm \"example.com/base/model\"",
            "\t\"github.com/google/uuid\"",
            "\t\"time\"",
            ")",
            "",
            "// PatchSlice is a collection whose elements are patched individually",
            "type PatchSlice[T any] []T",
            "",
            "type Empty struct{}",
            "",
            "// Widget is a widget",
            "type Widget struct {",
            "\tID uuid.UUID `json:\"id\"`",
            "\t// last change",
            "\tWhen *time.Time",
            "\tm.Model",
            "}",
            "",
            "type WidgetPatch struct {",
            "\tParts *PatchSlice[*PartPatch]",
            "}",
            "",
            "type Widgets []*Widget",
            "",
        ]
        .join("\n");
        assert_eq!(generate(&go, &structs), expected);
    }

    #[test]
    fn no_imports_no_helper() {
        let structs = vec![OutputStruct {
            name: "Part".to_string(),
            comment: "Part of a widget\n\nwith details".to_string(),
            fields: vec![field("Name", OutputRef::leaf("string"), "")],
            ..OutputStruct::default()
        }];
        let go = Go::new("dto", &BTreeMap::new(), &structs);
        assert_eq!(
            generate(&go, &structs),
            "// Code generated by dtoc. DO NOT EDIT.\n\npackage dto\n\n// Part of a widget\n//\n// with details\ntype Part struct {\n\tName string\n}\n"
        );
    }

    #[test]
    fn numbers_clashing_import_aliases() {
        let structs = vec![OutputStruct {
            name: "Widget".to_string(),
            fields: vec![
                field("Owner", OutputRef::external("User", "example.com/a/model"), ""),
                field("Gadget", OutputRef::external("Gadget", "example.com/b/model"), ""),
                field("Part", OutputRef::external("Part", "example.com/c/model"), ""),
            ],
            imports: ["example.com/a/model", "example.com/b/model", "example.com/c/model"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..OutputStruct::default()
        }];
        let go = Go::new("api", &BTreeMap::new(), &structs);
        let generated = generate(&go, &structs);
        assert!(generated.contains(
            "import (\n\t\"example.com/a/model\"\n\tmodel2 \"example.com/b/model\"\n\tmodel3 \"example.com/c/model\"\n)\n"
        ));
        assert!(generated.contains("\tOwner model.User\n\tGadget model2.Gadget\n\tPart model3.Part\n"));
    }

    #[test]
    fn sanitizes_package_names() {
        assert_eq!(package_name(Path::new("api")), "api");
        assert_eq!(package_name(Path::new("out/my-api")), "my_api");
        assert_eq!(package_name(Path::new(".dtoc/snapshots/current/20240101T000000Z")), "v20240101T000000Z");
        assert_eq!(package_name(Path::new("")), "api");
    }
}
