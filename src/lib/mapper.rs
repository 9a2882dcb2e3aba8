//! Maps the resolved type graph to the output model
use tracing::trace;

use super::model::{leaf, Kind, OutputField, OutputRef, OutputStruct, Ptr, ResolvedType};
use super::options::{EmbedMode, Options};

/// Maps every type which should be generated to an [`OutputStruct`],
/// keeping the order of `types`.
pub fn to_output(types: &[Ptr<ResolvedType>], opts: &Options) -> Vec<OutputStruct> {
    types
        .iter()
        .filter_map(|ty| map_type(&ty.borrow(), opts))
        .collect()
}

fn is_excluded(name: &str, opts: &Options) -> bool { opts.is_type_excluded(opts.base_name(name)) }

fn map_type(ty: &ResolvedType, opts: &Options) -> Option<OutputStruct> {
    // templates only exist to be instantiated
    if ty.omit || ty.is_template() {
        return None;
    }
    if is_excluded(&ty.name, opts) {
        trace!(ty = %ty.name, "excluded by name");
        return None;
    }
    match ty.kind {
        Kind::Struct => Some(map_struct(ty, opts)),
        Kind::Alias => {
            let target = ty.underlying.as_ref().map(|u| leaf(u).borrow().name.clone());
            match target {
                Some(target) if is_excluded(&target, opts) => {
                    trace!(ty = %ty.name, target = %target, "alias of an excluded type");
                    None
                }
                _ => map_alias(ty),
            }
        }
        _ => None,
    }
}

fn is_exported(name: &str) -> bool { name.chars().next().map_or(false, char::is_uppercase) }

fn map_struct(ty: &ResolvedType, opts: &Options) -> OutputStruct {
    let mut out = OutputStruct {
        name: ty.name.clone(),
        comment: ty.comment.clone(),
        ..OutputStruct::default()
    };
    for field in ty.fields.iter().filter(|f| !f.omit) {
        if !is_exported(&field.name) && !(field.embedded && opts.embed == EmbedMode::Include) {
            continue;
        }
        let r#type = output_ref(&field.r#type);
        r#type.collect_locations(&mut out.imports);
        let name = if field.embedded {
            leaf(&field.r#type).borrow().name.clone()
        } else {
            field.name.clone()
        };
        out.fields.push(OutputField {
            name,
            r#type,
            tag: field.tag.clone(),
            raw_tag: field.raw_tag.clone(),
            comment: field.comment.clone(),
            embedded: field.embedded,
        });
    }
    out
}

/// Maps `type X []T` and `type X []*T`. Any other alias shape has no output.
fn map_alias(ty: &ResolvedType) -> Option<OutputStruct> {
    let collection = ty.underlying.as_ref()?.borrow();
    let elem = match (collection.kind, &collection.underlying) {
        (Kind::Collection, Some(elem)) => elem.borrow(),
        _ => return None,
    };
    let (target, alias_ptr) = match (elem.kind, &elem.underlying) {
        (Kind::Pointer, Some(target)) => (target.borrow().name.clone(), true),
        _ => (elem.name.clone(), false),
    };
    Some(OutputStruct {
        name: ty.name.clone(),
        alias: Some(target),
        alias_ptr,
        comment: ty.comment.clone(),
        ..OutputStruct::default()
    })
}

/// Projects a type reference, down to its leaf.
pub fn output_ref(ty: &Ptr<ResolvedType>) -> OutputRef {
    let t = ty.borrow();
    match (t.kind, &t.underlying) {
        (Kind::Pointer, Some(inner)) => OutputRef::pointer(output_ref(inner)),
        (Kind::Collection, Some(inner)) => OutputRef::collection(output_ref(inner)),
        (Kind::Pointer, None) | (Kind::Collection, None) => OutputRef::leaf("UNKNOWN"),
        _ if t.location.is_empty() => OutputRef::leaf(t.name.as_str()),
        _ => OutputRef::external(t.name.as_str(), t.location.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::builder::Builder;
    use crate::model::find;
    use crate::source::Memory;

    const SRC: &str = "package model

import \"github.com/google/uuid\"

type Base struct {
	ID uuid.UUID `json:\"id\"`
}

// Widget is a widget
type Widget struct {
	Base
	Name     string
	internal int
	Parts    []*Part
	Labels   map[string]string
}

type Part struct {
	Name string
}

type Widgets []*Widget
type Parts []Part

type Page[T any] struct {
	Items []T
}
";

    fn output(opts: &Options) -> Vec<OutputStruct> {
        let mut source = Memory::parse(SRC).unwrap();
        let types = Builder::new(opts, &mut source).unwrap().build_all();
        to_output(&types, opts)
    }

    fn names(structs: &[OutputStruct]) -> Vec<&str> { structs.iter().map(|s| s.name.as_str()).collect() }

    #[test]
    fn maps_structs_and_aliases() {
        let opts = Options {
            suffix: "DTO".to_string(),
            ..Options::default()
        };
        let out = output(&opts);
        assert_eq!(names(&out), vec!["BaseDTO", "WidgetDTO", "PartDTO", "WidgetsDTO", "PartsDTO"]);

        let widget = find(&out, "WidgetDTO").unwrap();
        assert_eq!(widget.comment, "Widget is a widget");
        assert_eq!(
            widget.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["ID", "Name", "Parts", "Labels"]
        );
        assert_eq!(
            widget.field("ID").unwrap().r#type,
            OutputRef::external("UUID", "github.com/google/uuid")
        );
        assert_eq!(
            widget.field("Parts").unwrap().r#type,
            OutputRef::collection(OutputRef::pointer(OutputRef::leaf("PartDTO")))
        );
        assert_eq!(
            widget.field("Labels").unwrap().r#type,
            OutputRef::leaf("map[string]string")
        );
        assert_eq!(
            widget.imports,
            vec!["github.com/google/uuid".to_string()].into_iter().collect::<BTreeSet<_>>()
        );

        let widgets = find(&out, "WidgetsDTO").unwrap();
        assert_eq!(widgets.alias.as_deref(), Some("WidgetDTO"));
        assert!(widgets.alias_ptr);
        assert!(widgets.fields.is_empty());
        let parts = find(&out, "PartsDTO").unwrap();
        assert_eq!(parts.alias.as_deref(), Some("PartDTO"));
        assert!(!parts.alias_ptr);
    }

    #[test]
    fn include_mode_names_embedded_fields_by_type() {
        let opts = Options {
            embed: EmbedMode::Include,
            ..Options::default()
        };
        let out = output(&opts);
        let widget = find(&out, "Widget").unwrap();
        let base = widget.field("Base").unwrap();
        assert!(base.embedded);
        assert_eq!(base.r#type, OutputRef::leaf("Base"));
        assert!(widget.field("ID").is_some());
        assert!(widget.field("internal").is_none());
    }

    #[test]
    fn skips_excluded_types_and_their_aliases() {
        let opts = Options {
            suffix: "DTO".to_string(),
            exclude_types: vec!["WIDGET".to_string()],
            ..Options::default()
        };
        let out = output(&opts);
        assert_eq!(names(&out), vec!["BaseDTO", "PartDTO", "PartsDTO"]);
    }

    #[test]
    fn skips_suffixed_names_excluded_by_base_name() {
        let opts = Options {
            suffix: "DTO".to_string(),
            exclude_types: vec!["part".to_string()],
            ..Options::default()
        };
        let mut part = ResolvedType::shell("PartDTO");
        part.name_resolved = true;
        let part = Ptr::new(part);
        let parts = Ptr::new(ResolvedType {
            kind: Kind::Alias,
            underlying: Some(ResolvedType::collection(part.clone())),
            ..ResolvedType::shell("PartsDTO")
        });
        assert!(to_output(&[part, parts], &opts).is_empty());
    }
}
