//! Synthesis of patch types
//!
//! For every generated struct `X`, a patch struct `XPatch` is added whose
//! fields can each be left out of an update: every field gets one more level
//! of indirection, collections become `*PatchSlice[ElemPatch]`, and fields
//! which can't be updated keep their type.
use tracing::trace;

use super::model::{find, OutputField, OutputRef, OutputStruct};
use super::options::Options;
use super::tag::StructTag;

const DEFAULT_PATCH_SUFFIX: &str = "Patch";

/// Parts of a `gorm` tag which make a field read-only after creation
const READ_ONLY: &[&str] = &["->", "<-:create", "primaryKey"];

fn is_read_only(raw_tag: &StructTag) -> bool {
    READ_ONLY
        .iter()
        .any(|part| raw_tag.has_part("gorm", part, &[';']))
}

struct Ctx<'a> {
    opts: &'a Options,
    suffix: &'a str,
    /// Every struct generated before synthesis
    structs: &'a [OutputStruct],
}

impl<'a> Ctx<'a> {
    fn patch_name(&self, name: &str) -> String {
        if name.ends_with(self.suffix) {
            name.to_string()
        } else {
            format!("{}{}", name, self.suffix)
        }
    }

    /// Name of the patch type of a collection element
    fn element_patch_name(&self, name: &str) -> String {
        let name = name.strip_suffix(self.suffix).unwrap_or(name);
        format!("{}{}", self.opts.resolve_name(name), self.suffix)
    }

    /// Element of a collection field, directly or through a collection alias
    fn collection_element(&self, r#type: &OutputRef) -> Option<(String, bool)> {
        match r#type {
            OutputRef::Collection(elem) => match elem.as_ref() {
                OutputRef::Pointer(inner) => Some((inner.leaf_name().to_string(), true)),
                elem => Some((elem.leaf_name().to_string(), false)),
            },
            OutputRef::Leaf { name, location: None } => {
                let alias = find(self.structs, name)?;
                alias.alias.clone().map(|elem| (elem, alias.alias_ptr))
            }
            _ => None,
        }
    }

    fn field_type(&self, field: &OutputField) -> OutputRef {
        if is_read_only(&field.raw_tag) {
            return field.r#type.clone();
        }
        if field.embedded {
            let mut r#type = field.r#type.clone();
            if let OutputRef::Leaf { name, .. } = r#type.leaf_mut() {
                *name = self.patch_name(name);
            }
            return OutputRef::pointer(r#type);
        }
        match self.collection_element(&field.r#type) {
            Some((elem, pointer)) => {
                let elem = OutputRef::leaf(self.element_patch_name(&elem));
                let elem = if pointer { OutputRef::pointer(elem) } else { elem };
                OutputRef::pointer(OutputRef::patch_collection(elem))
            }
            None => OutputRef::pointer(field.r#type.clone()),
        }
    }

    fn patch(&self, base: &OutputStruct) -> OutputStruct {
        let mut patch = OutputStruct {
            name: self.patch_name(&base.name),
            comment: base.comment.clone(),
            ..OutputStruct::default()
        };
        for field in base.fields.iter() {
            let r#type = self.field_type(field);
            r#type.collect_locations(&mut patch.imports);
            patch.fields.push(OutputField {
                name: field.name.clone(),
                r#type,
                tag: field.tag.clone(),
                raw_tag: StructTag::default(),
                comment: field.comment.clone(),
                embedded: field.embedded,
            });
        }
        patch
    }
}

/// Appends a patch struct for every base struct of `structs`.
pub fn synthesize(structs: &mut Vec<OutputStruct>, opts: &Options) {
    let suffix = if opts.patch_suffix.is_empty() {
        DEFAULT_PATCH_SUFFIX
    } else {
        opts.patch_suffix.as_str()
    };

    let patches = {
        let ctx = Ctx {
            opts,
            suffix,
            structs: structs.as_slice(),
        };
        let mut patches: Vec<OutputStruct> = Vec::new();
        for base in structs.iter() {
            if base.is_alias() || base.name.ends_with(suffix) {
                continue;
            }
            let name = ctx.patch_name(&base.name);
            if find(ctx.structs, &name).is_some() || find(&patches, &name).is_some() {
                trace!(ty = %base.name, "patch type already exists");
                continue;
            }
            if base.fields.is_empty() {
                continue;
            }
            if opts.exclude_deprecated && base.comment.to_lowercase().contains("deprecated") {
                trace!(ty = %base.name, "deprecated, no patch type");
                continue;
            }
            patches.push(ctx.patch(base));
        }
        patches
    };
    structs.extend(patches);
}
