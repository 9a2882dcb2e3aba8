//! Per-type transformations, run over the graph once it is fully populated
use std::collections::HashSet;

use tracing::trace;

use super::model::{Kind, Ptr, ResolvedField, ResolvedType};
use super::options::{EmbedMode, Options};
use super::tag::StructTag;

/// Tag markers which inline a named field, as `(key, part)`
const EMBED_MARKERS: &[(&str, &str)] = &[
    ("gorm", "embedded"),
    ("db", "embedded"),
    ("json", "inline"),
    ("yaml", "inline"),
    ("mapstructure", "squash"),
];

/// Runs every transformation over `ty`, in order, once. Local structs whose
/// fields `ty` inlines are transformed first, so that what gets inlined does
/// not depend on declaration order.
pub fn run(ty: &Ptr<ResolvedType>, opts: &Options) {
    {
        let mut t = ty.borrow_mut();
        if t.omit || t.transformed {
            return;
        }
        t.transformed = true;
    }
    let name = ty.borrow().name.clone();
    if opts.is_type_excluded(&name) {
        trace!(ty = %name, "excluded by name");
        ty.borrow_mut().omit = true;
        return;
    }
    if filter_deprecated(ty, opts) {
        trace!(ty = %name, "deprecated, omitting");
        return;
    }
    for target in inlined_targets(ty) {
        run(&target, opts);
    }
    flatten_embedded(ty, opts.embed);
    flatten_tag_embedded(ty, opts.embed);
    apply_suffix(ty, &opts.suffix);
    dedupe_fields(ty);
}

/// Omits the type if its comment marks it as deprecated, otherwise drops its
/// deprecated fields. Returns whether the type was omitted.
pub fn filter_deprecated(ty: &Ptr<ResolvedType>, opts: &Options) -> bool {
    if !opts.exclude_deprecated {
        return false;
    }
    let mut ty = ty.borrow_mut();
    if ty.comment.to_lowercase().contains("deprecated") {
        ty.is_deprecated = true;
        ty.omit = true;
        return true;
    }
    ty.fields.retain(|f| !f.deprecated);
    false
}

/// Fields an embedded field of type `ty` contributes, looking through pointers
fn inner_fields(ty: &Ptr<ResolvedType>) -> Vec<ResolvedField> {
    let t = ty.borrow();
    match (t.kind, &t.underlying) {
        (Kind::Pointer, Some(inner)) => inner_fields(inner),
        _ if t.has_fields() => t.fields.clone(),
        _ => Vec::new(),
    }
}

/// The type behind any number of pointers
fn pointee(ty: &Ptr<ResolvedType>) -> Ptr<ResolvedType> {
    let next = {
        let t = ty.borrow();
        match (t.kind, &t.underlying) {
            (Kind::Pointer, Some(inner)) => Some(inner.clone()),
            _ => None,
        }
    };
    match next {
        Some(next) => pointee(&next),
        None => ty.clone(),
    }
}

fn is_local_struct(ty: &Ptr<ResolvedType>) -> bool {
    let t = ty.borrow();
    t.kind == Kind::Struct && !t.is_external
}

/// Local structs whose fields the embedding passes would inline into `ty`
fn inlined_targets(ty: &Ptr<ResolvedType>) -> Vec<Ptr<ResolvedType>> {
    let targets = ty
        .borrow()
        .fields
        .iter()
        .filter(|f| f.embedded || (is_tag_embedded(&f.raw_tag) && is_struct(&f.r#type)))
        .map(|f| pointee(&f.r#type))
        .filter(is_local_struct)
        .collect::<Vec<_>>();
    targets
}

fn is_struct(ty: &Ptr<ResolvedType>) -> bool {
    let t = ty.borrow();
    match (t.kind, &t.underlying) {
        (Kind::Pointer, Some(inner)) => is_struct(inner),
        (kind, _) => kind == Kind::Struct,
    }
}

/// Rebuilds the fields of `ty`, replacing the fields `pick` selects by the
/// fields of their type. Include mode keeps the replaced field in front.
fn inline(ty: &Ptr<ResolvedType>, mode: EmbedMode, pick: impl Fn(&ResolvedField) -> bool) {
    if ty.borrow().kind != Kind::Struct {
        return;
    }
    // taken out, so that a type embedding itself sees no fields
    let fields = std::mem::take(&mut ty.borrow_mut().fields);
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        if !pick(&field) {
            out.push(field);
            continue;
        }
        let inner = inner_fields(&field.r#type);
        trace!(field = %field.name, inlined = inner.len(), ?mode, "inlining");
        if mode == EmbedMode::Include {
            out.push(field);
        }
        out.extend(inner);
    }
    ty.borrow_mut().fields = out;
}

/// Inlines the fields of anonymous embedded fields
pub fn flatten_embedded(ty: &Ptr<ResolvedType>, mode: EmbedMode) { inline(ty, mode, |f| f.embedded) }

/// Whether the declared tag marks the field for inlining
pub fn is_tag_embedded(raw_tag: &StructTag) -> bool {
    EMBED_MARKERS
        .iter()
        .any(|(key, part)| raw_tag.has_part(key, part, &[';', ',']))
}

/// Inlines the fields of named struct fields carrying an embedding tag marker
pub fn flatten_tag_embedded(ty: &Ptr<ResolvedType>, mode: EmbedMode) {
    inline(ty, mode, |f| !f.embedded && is_tag_embedded(&f.raw_tag) && is_struct(&f.r#type))
}

/// Adds `suffix` to the name of the type, once.
pub fn apply_suffix(ty: &Ptr<ResolvedType>, suffix: &str) {
    let mut ty = ty.borrow_mut();
    if ty.name_resolved || suffix.is_empty() {
        return;
    }
    if !ty.name.ends_with(suffix) {
        ty.name.push_str(suffix);
    }
    ty.name_resolved = true;
}

/// Drops every field whose name was already seen, keeping the first one.
/// Unnamed fields are all kept.
pub fn dedupe_fields(ty: &Ptr<ResolvedType>) {
    let mut ty = ty.borrow_mut();
    if ty.kind != Kind::Struct {
        return;
    }
    let mut seen = HashSet::new();
    ty.fields.retain(|f| f.name.is_empty() || seen.insert(f.name.clone()));
}

/// Replaces an alias by the shape of its target.
pub fn expand_alias(ty: &Ptr<ResolvedType>) {
    let target = {
        let t = ty.borrow();
        if t.kind != Kind::Alias || t.alias_applied {
            return;
        }
        t.underlying.clone()
    };
    let mut t = ty.borrow_mut();
    t.alias_applied = true;
    if let Some(target) = target {
        let target = target.borrow();
        t.kind = target.kind;
        t.fields = target.fields.clone();
        t.underlying = target.underlying.clone();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::leaf;

    fn field(name: &str, ty: Ptr<ResolvedType>) -> ResolvedField {
        ResolvedField {
            name: name.to_string(),
            raw_name: name.to_string(),
            comment: String::new(),
            embedded: false,
            r#type: ty,
            tag: StructTag::default(),
            raw_tag: StructTag::default(),
            omit: false,
            deprecated: false,
        }
    }

    fn embedded(ty: Ptr<ResolvedType>) -> ResolvedField {
        let name = leaf(&ty).borrow().name.clone();
        ResolvedField {
            embedded: true,
            ..field(&name, ty)
        }
    }

    fn tagged(name: &str, ty: Ptr<ResolvedType>, tag: &str) -> ResolvedField {
        ResolvedField {
            raw_tag: StructTag::parse(tag),
            ..field(name, ty)
        }
    }

    fn strukt(name: &str, fields: Vec<ResolvedField>) -> Ptr<ResolvedType> {
        let mut ty = ResolvedType::shell(name);
        ty.fields = fields;
        Ptr::new(ty)
    }

    fn names(ty: &Ptr<ResolvedType>) -> Vec<String> { ty.borrow().fields.iter().map(|f| f.name.clone()).collect() }

    fn widget() -> Ptr<ResolvedType> {
        let base = strukt("Base", vec![field("ID", ResolvedType::builtin("string"))]);
        let audit = strukt("Audit", vec![field("By", ResolvedType::builtin("string"))]);
        let stringer = ResolvedType::builtin("Stringer");
        strukt(
            "Widget",
            vec![
                embedded(base),
                embedded(ResolvedType::pointer(audit)),
                embedded(stringer),
                field("Name", ResolvedType::builtin("string")),
            ],
        )
    }

    #[test]
    fn flatten_replaces_wrappers() {
        let widget = widget();
        flatten_embedded(&widget, EmbedMode::Flatten);
        assert_eq!(names(&widget), vec!["ID", "By", "Name"]);
    }

    #[test]
    fn include_keeps_wrappers() {
        let widget = widget();
        flatten_embedded(&widget, EmbedMode::Include);
        assert_eq!(names(&widget), vec!["Base", "ID", "Audit", "By", "Stringer", "Name"]);
    }

    #[test]
    fn inlines_tagged_structs() {
        let meta = strukt("Meta", vec![field("Version", ResolvedType::builtin("int"))]);
        let widget = strukt(
            "Widget",
            vec![
                tagged("Meta", meta.clone(), "gorm:\"embedded;embeddedPrefix:meta_\""),
                tagged("Inline", meta.clone(), "json:\",inline\""),
                tagged("Squashed", ResolvedType::pointer(meta.clone()), "mapstructure:\",squash\""),
                tagged("Plain", meta.clone(), "json:\"plain\""),
                tagged("Count", ResolvedType::builtin("int"), "yaml:\",inline\""),
            ],
        );
        flatten_tag_embedded(&widget, EmbedMode::Flatten);
        assert_eq!(names(&widget), vec!["Version", "Version", "Version", "Plain", "Count"]);
        dedupe_fields(&widget);
        assert_eq!(names(&widget), vec!["Version", "Plain", "Count"]);

        let widget = strukt("Widget", vec![tagged("Meta", meta, "db:\"embedded\"")]);
        flatten_tag_embedded(&widget, EmbedMode::Include);
        assert_eq!(names(&widget), vec!["Meta", "Version"]);
    }

    #[test]
    fn suffix_is_applied_once() {
        let widget = strukt("Widget", vec![]);
        apply_suffix(&widget, "DTO");
        apply_suffix(&widget, "DTO");
        assert_eq!(widget.borrow().name, "WidgetDTO");
        assert!(widget.borrow().name_resolved);

        let dto = strukt("WidgetDTO", vec![]);
        apply_suffix(&dto, "DTO");
        assert_eq!(dto.borrow().name, "WidgetDTO");

        let bare = strukt("Widget", vec![]);
        apply_suffix(&bare, "");
        assert_eq!(bare.borrow().name, "Widget");
        assert!(!bare.borrow().name_resolved);
    }

    #[test]
    fn dedupe_keeps_first_and_unnamed() {
        let int = ResolvedType::builtin("int");
        let widget = strukt(
            "Widget",
            vec![
                field("A", int.clone()),
                field("B", int.clone()),
                field("", int.clone()),
                field("A", ResolvedType::builtin("string")),
                field("", int.clone()),
            ],
        );
        dedupe_fields(&widget);
        assert_eq!(names(&widget), vec!["A", "B", "", ""]);
        assert_eq!(widget.borrow().fields[0].r#type, int);
    }

    #[test]
    fn deprecation() {
        let opts = Options {
            exclude_deprecated: true,
            ..Options::default()
        };
        let old = strukt("Old", vec![]);
        old.borrow_mut().comment = "Old is DEPRECATED".to_string();
        run(&old, &opts);
        assert!(old.borrow().omit);

        let widget = strukt(
            "Widget",
            vec![
                ResolvedField {
                    deprecated: true,
                    ..field("Title", ResolvedType::builtin("string"))
                },
                field("Name", ResolvedType::builtin("string")),
            ],
        );
        run(&widget, &opts);
        assert!(!widget.borrow().omit);
        assert_eq!(names(&widget), vec!["Name"]);

        // nothing happens when not excluding
        let old = strukt("Old", vec![]);
        old.borrow_mut().comment = "Deprecated".to_string();
        run(&old, &Options::default());
        assert!(!old.borrow().omit);
    }

    #[test]
    fn excludes_by_name_before_suffix() {
        let opts = Options {
            suffix: "DTO".to_string(),
            exclude_types: vec!["secret".to_string()],
            ..Options::default()
        };
        let secret = strukt("Secret", vec![]);
        run(&secret, &opts);
        assert!(secret.borrow().omit);
        assert_eq!(secret.borrow().name, "Secret");

        let widget = widget();
        run(&widget, &opts);
        assert_eq!(widget.borrow().name, "WidgetDTO");
        assert_eq!(names(&widget), vec!["ID", "By", "Name"]);
    }

    #[test]
    fn expands_aliases_once() {
        let widget = widget();
        let alias = Ptr::new(ResolvedType {
            kind: Kind::Alias,
            underlying: Some(widget.clone()),
            ..ResolvedType::shell("Gadget")
        });
        expand_alias(&alias);
        assert_eq!(alias.borrow().kind, Kind::Struct);
        assert_eq!(names(&alias), names(&widget));
        assert!(alias.borrow().alias_applied);

        // a second expansion is a no-op, even if the shape changed since
        alias.borrow_mut().kind = Kind::Alias;
        expand_alias(&alias);
        assert_eq!(alias.borrow().kind, Kind::Alias);
    }
}
