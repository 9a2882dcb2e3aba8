//! Resolution of types declared outside of the scanned package
//!
//! External structs are expanded one level deep: their fields are resolved,
//! but any external type those fields refer to is kept as an opaque leaf.
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use super::ast::{RawField, TypeExpr};
use super::builder::{Builder, Instance};
use super::model::{Ptr, ResolvedField, ResolvedType};
use super::source::Package;

/// Parameter name substituted in single-argument instantiations
const TYPE_PARAM: &str = "T";

impl<'s> Builder<'s> {
    /// Loads the package at `location`, once. The imports of a loaded package
    /// are added to the import table, without overriding existing aliases.
    pub(crate) fn package(&mut self, location: &str) -> Option<Rc<Package>> {
        if location.is_empty() {
            return None;
        }
        if let Some(cached) = self.packages.get(location) {
            return cached.clone();
        }
        let loaded = match self.source.load(location) {
            Ok(Some(pkg)) => {
                for import in pkg.imports.iter() {
                    self.imports
                        .entry(import.alias().to_string())
                        .or_insert_with(|| import.path.clone());
                }
                Some(Rc::new(pkg))
            }
            Ok(None) => {
                debug!(location, "package not found");
                None
            }
            Err(e) => {
                debug!(location, error = %e, "unable to load package");
                None
            }
        };
        self.packages.insert(location.to_string(), loaded.clone());
        loaded
    }

    pub(crate) fn has_external_struct(&mut self, location: &str, name: &str) -> bool {
        self.package(location)
            .map_or(false, |pkg| pkg.find_struct(name).is_some())
    }

    /// Resolves `name` in the package at `location` to an external struct
    pub(crate) fn resolve_external(&mut self, location: &str, name: &str) -> Ptr<ResolvedType> {
        let name = if name.is_empty() { "UNKNOWN" } else { name };
        let mut ty = ResolvedType::external(name, location);
        if self.external_depth > 0 {
            return Ptr::new(ty);
        }
        if let Some(pkg) = self.package(location) {
            if let Some(raws) = pkg.find_struct(name) {
                ty.fields = self.resolve_external_fields(&pkg, raws);
            }
        }
        Ptr::new(ty)
    }

    /// Resolves a local instantiation alias, `type Name pkg.Base[A]`, to the
    /// fields of `Base` with `T` replaced by `A`.
    pub(crate) fn resolve_instance(&mut self, name: &str, instance: &Instance) -> Ptr<ResolvedType> {
        let mut ty = ResolvedType::external(name, instance.location.as_str());
        if self.external_depth > 0 {
            return Ptr::new(ty);
        }
        let pkg = match self.package(&instance.location) {
            Some(pkg) => pkg,
            None => return Ptr::new(ty),
        };
        let raws = match pkg.find_struct(&instance.base) {
            Some(raws) => raws,
            None => {
                debug!(name, base = %instance.base, location = %instance.location, "instantiated type not found");
                return Ptr::new(ty);
            }
        };

        let raws = match instance.args.as_slice() {
            [arg] => raws
                .iter()
                .map(|raw| RawField {
                    r#type: substitute_param(&raw.r#type, TYPE_PARAM, arg),
                    ..raw.clone()
                })
                .collect::<Vec<_>>(),
            args => {
                debug!(name, args = args.len(), "instantiated without substitution");
                raws.to_vec()
            }
        };
        ty.fields = self.resolve_external_fields(&pkg, &raws);
        Ptr::new(ty)
    }

    fn resolve_external_fields(&mut self, pkg: &Package, raws: &[RawField]) -> Vec<ResolvedField> {
        self.external_depth += 1;
        let mut fields = Vec::new();
        for raw in raws {
            if self.opts.exclude_deprecated && raw.comment.to_lowercase().contains("deprecated") {
                trace!(field = %raw.name, "skipping deprecated external field");
                continue;
            }
            let raw = RawField {
                r#type: substitute_aliases(&raw.r#type, &pkg.aliases),
                ..raw.clone()
            };
            if let Some(field) = self.resolve_field(&raw) {
                fields.push(field);
            }
        }
        self.external_depth -= 1;
        fields
    }
}

/// Replaces a reference to one of the package's `type X = Y` aliases by its
/// target, for `X`, `*X` and `X[...]`.
fn substitute_aliases(expr: &TypeExpr, aliases: &HashMap<String, TypeExpr>) -> TypeExpr {
    match expr {
        TypeExpr::Ident(name) => aliases.get(name).cloned().unwrap_or_else(|| expr.clone()),
        TypeExpr::Pointer(inner) => match inner.as_ref() {
            TypeExpr::Ident(name) if aliases.contains_key(name) => TypeExpr::pointer(aliases[name].clone()),
            _ => expr.clone(),
        },
        TypeExpr::Generic(base, args) => match base.as_ref() {
            TypeExpr::Ident(name) if aliases.contains_key(name) => {
                TypeExpr::generic(aliases[name].clone(), args.clone())
            }
            _ => expr.clone(),
        },
        _ => expr.clone(),
    }
}

/// Replaces every occurrence of the identifier `param` by `arg`
fn substitute_param(expr: &TypeExpr, param: &str, arg: &TypeExpr) -> TypeExpr {
    match expr {
        TypeExpr::Ident(name) if name == param => arg.clone(),
        TypeExpr::Pointer(inner) => TypeExpr::pointer(substitute_param(inner, param, arg)),
        TypeExpr::Slice(inner) => TypeExpr::slice(substitute_param(inner, param, arg)),
        TypeExpr::Map(k, v) => TypeExpr::Map(
            Box::new(substitute_param(k, param, arg)),
            Box::new(substitute_param(v, param, arg)),
        ),
        TypeExpr::Generic(base, args) => TypeExpr::generic(
            substitute_param(base, param, arg),
            args.iter().map(|a| substitute_param(a, param, arg)).collect(),
        ),
        _ => expr.clone(),
    }
}
