//! Contains the code which builds the resolved type graph
//!
//! Building is done in two passes: a shell is created for every declaration
//! first, so that fields may refer to any declared type regardless of
//! declaration order, and only then is every shell populated.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, trace};

use super::ast::{self, Decl, TypeExpr};
use super::model::{leaf, Kind, Ptr, ResolvedField, ResolvedType};
use super::options::Options;
use super::source::{DeclarationSource, Package};
use super::tag::StructTag;
use super::{transform, Error};

const BUILTINS: &[&str] = &[
    "string",
    "bool",
    "byte",
    "rune",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "float32",
    "float64",
    "complex64",
    "complex128",
    "error",
    "any",
];

/// Tag keys which only mean something to the persistence layer
const ORM_TAGS: &[&str] = &["gorm", "db"];

/// `type Name pkg.Base[A, ...]`
#[derive(Clone, PartialEq, Debug)]
pub(crate) struct Instance {
    pub location: String,
    pub base: String,
    pub args: Vec<TypeExpr>,
}

pub struct Builder<'s> {
    pub(crate) opts: &'s Options,
    pub(crate) source: &'s mut dyn DeclarationSource,
    /// Struct and collection alias declarations of the scanned package
    decls: Vec<Decl>,
    pub(crate) instances: HashMap<String, Instance>,
    /// Import alias to import path
    pub(crate) imports: BTreeMap<String, String>,

    by_name: HashMap<String, Ptr<ResolvedType>>,
    /// Declaration order of `by_name`
    order: Vec<String>,
    resolving: HashSet<String>,
    populated: HashSet<String>,
    /// Concrete instantiations of local generic structs, by name
    instantiated: HashMap<String, Ptr<ResolvedType>>,
    /// Creation order of `instantiated`
    instantiations: Vec<Ptr<ResolvedType>>,
    /// How many generic declarations are currently being populated
    template_depth: usize,

    /// Packages loaded so far, `None` for the ones which could not be loaded
    pub(crate) packages: HashMap<String, Option<Rc<Package>>>,
    /// How many external structs are currently being expanded
    pub(crate) external_depth: usize,
}

impl<'s> Builder<'s> {
    pub fn new(opts: &'s Options, source: &'s mut dyn DeclarationSource) -> Result<Builder<'s>, Error> {
        let scan = source.scan()?;

        let mut imports = BTreeMap::new();
        for import in scan.imports.iter().filter(|i| i.name.as_deref() != Some("_")) {
            imports
                .entry(import.alias().to_string())
                .or_insert_with(|| import.path.clone());
        }

        let mut decls = Vec::new();
        let mut instances = HashMap::new();
        for decl in scan.decls {
            match decl {
                Decl::Instance {
                    name, pkg, base, args, ..
                } => match imports.get(&pkg) {
                    Some(location) => {
                        instances.insert(
                            name,
                            Instance {
                                location: location.clone(),
                                base,
                                args,
                            },
                        );
                    }
                    None => debug!(name = %name, pkg = %pkg, "instantiation from an unknown import, skipping"),
                },
                Decl::Alias { .. } => (),
                decl => decls.push(decl),
            }
        }

        Ok(Builder {
            opts,
            source,
            decls,
            instances,
            imports,
            by_name: HashMap::new(),
            order: Vec::new(),
            resolving: HashSet::new(),
            populated: HashSet::new(),
            instantiated: HashMap::new(),
            instantiations: Vec::new(),
            template_depth: 0,
            packages: HashMap::new(),
            external_depth: 0,
        })
    }

    /// Import alias to import path, including the imports of every loaded package
    pub fn imports(&self) -> &BTreeMap<String, String> { &self.imports }

    /// Builds the graph, runs the transformations over it, and returns every
    /// type which was not omitted: declarations in declaration order, then
    /// the instantiations of generic declarations.
    pub fn build_all(&mut self) -> Vec<Ptr<ResolvedType>> {
        // first pass: a shell for every declaration
        let names = self.decls.iter().map(|d| d.name().to_string()).collect::<Vec<_>>();
        for name in names.iter() {
            self.ensure(name);
        }
        // second pass: populate the shells
        for name in self.order.clone() {
            let ty = self.by_name[&name].clone();
            self.populate(&ty);
        }

        let all = self
            .order
            .iter()
            .map(|name| self.by_name[name].clone())
            .chain(self.instantiations.iter().cloned())
            .collect::<Vec<_>>();
        for ty in all.iter() {
            transform::run(ty, self.opts);
        }

        let out = all.into_iter().filter(|ty| !ty.borrow().omit).collect::<Vec<_>>();
        debug!(
            declared = self.order.len(),
            instantiated = self.instantiations.len(),
            kept = out.len(),
            packages = self.packages.len(),
            "built type graph"
        );
        out
    }

    fn find_decl(&self, name: &str) -> Option<&Decl> { self.decls.iter().find(|d| d.name() == name) }

    /// Returns the shell of a declared type, creating it if it doesn't exist yet
    fn ensure(&mut self, name: &str) -> Ptr<ResolvedType> {
        if let Some(ty) = self.by_name.get(name) {
            return ty.clone();
        }
        let mut shell = ResolvedType::shell(name);
        match self.find_decl(name) {
            Some(Decl::Struct {
                comment, type_params, ..
            }) => {
                shell.comment = comment.clone();
                shell.type_params = type_params.clone();
            }
            Some(Decl::Collection { comment, .. }) => shell.comment = comment.clone(),
            _ => (),
        }
        let ty = Ptr::new(shell);
        self.by_name.insert(name.to_string(), ty.clone());
        self.order.push(name.to_string());
        ty
    }

    /// Fills in the fields of a shell, or the target of an alias.
    ///
    /// A shell which is reached again while it is being populated is left
    /// as it is at that point, which may be empty. This depends on the order
    /// types are discovered in.
    pub(crate) fn populate(&mut self, ty: &Ptr<ResolvedType>) {
        let name = ty.borrow().name.clone();
        if self.populated.contains(&name) {
            return;
        }
        if self.resolving.contains(&name) {
            trace!(ty = %name, "re-entered while populating, skipping");
            return;
        }
        let decl = match self.find_decl(&name) {
            Some(decl) => decl.clone(),
            None => return,
        };

        self.resolving.insert(name.clone());
        match decl {
            Decl::Struct {
                fields, type_params, ..
            } => {
                let template = !type_params.is_empty();
                if template {
                    self.template_depth += 1;
                }
                let resolved = fields.iter().filter_map(|f| self.resolve_field(f)).collect::<Vec<_>>();
                if template {
                    self.template_depth -= 1;
                }
                ty.borrow_mut().fields.extend(resolved);
            }
            Decl::Collection { element, pointer, .. } => {
                let underlying = self.resolve_collection_alias(&element, pointer);
                let mut ty = ty.borrow_mut();
                ty.kind = Kind::Alias;
                ty.underlying = Some(underlying);
            }
            _ => (),
        }
        self.resolving.remove(&name);
        self.populated.insert(name);
    }

    fn is_excluded_by_tag(&self, tag: &StructTag) -> Option<&str> {
        self.opts
            .exclude_by_tags
            .iter()
            .find(|f| tag.has_part(&f.key, &f.value, &[';']))
            .map(|f| f.key.as_str())
    }

    /// Resolves a single field, or returns `None` if it is excluded by its tag
    pub(crate) fn resolve_field(&mut self, raw: &ast::RawField) -> Option<ResolvedField> {
        let raw_tag = raw.tag.as_deref().map(StructTag::parse).unwrap_or_default();
        if let Some(key) = self.is_excluded_by_tag(&raw_tag) {
            trace!(field = %raw.name, key, "excluded by tag");
            return None;
        }

        let mut tag = raw_tag.clone();
        if !self.opts.keep_orm_tags {
            for key in ORM_TAGS {
                tag.remove(key);
            }
        }

        let r#type = self.resolve_type_expr(&raw.r#type);
        let deprecated = self.opts.exclude_deprecated && raw.comment.to_lowercase().contains("deprecated");

        Some(ResolvedField {
            name: raw.name.clone(),
            raw_name: raw.name.clone(),
            comment: raw.comment.clone(),
            embedded: raw.embedded,
            r#type,
            tag,
            raw_tag,
            omit: false,
            deprecated,
        })
    }

    pub(crate) fn resolve_type_expr(&mut self, expr: &TypeExpr) -> Ptr<ResolvedType> {
        match expr {
            TypeExpr::Ident(name) => self.resolve_ident(name),
            TypeExpr::Pointer(inner) => ResolvedType::pointer(self.resolve_type_expr(inner)),
            TypeExpr::Slice(inner) => ResolvedType::collection(self.resolve_type_expr(inner)),
            TypeExpr::Generic(base, args) => {
                let base = self.resolve_type_expr(base);
                let args = args.iter().map(|a| self.resolve_type_expr(a)).collect::<Vec<_>>();
                self.instantiate(base, args)
            }
            TypeExpr::Qualified(pkg, name) => {
                let location = match self.imports.get(pkg) {
                    Some(location) => location.clone(),
                    None => {
                        debug!(pkg = %pkg, name = %name, "reference into an unknown import");
                        String::new()
                    }
                };
                self.resolve_external(&location, name)
            }
            TypeExpr::Map(..) | TypeExpr::Other(_) => ResolvedType::builtin(expr.to_string()),
        }
    }

    fn resolve_ident(&mut self, name: &str) -> Ptr<ResolvedType> {
        if BUILTINS.contains(&name) {
            return ResolvedType::builtin(name);
        }
        if self.find_decl(name).is_some() {
            return self.ensure(name);
        }
        if let Some(instance) = self.instances.get(name).cloned() {
            return self.resolve_instance(name, &instance);
        }
        // a type from a dot import, or an alias of one
        let locations = self.imports.values().cloned().collect::<Vec<_>>();
        for location in locations {
            if self.has_external_struct(&location, name) {
                return self.resolve_external(&location, name);
            }
        }
        trace!(name, "unknown identifier");
        ResolvedType::builtin(name)
    }

    /// Applies `args` to a generic type, substituting its parameters in the
    /// types of its fields. Types which can't be instantiated are returned
    /// as they are.
    ///
    /// The result is registered under a concrete name (`Page[User]` is
    /// `PageUser`) and shared by every use with the same name. Inside a
    /// generic declaration the arguments may be parameters themselves, so
    /// nothing is registered there.
    pub(crate) fn instantiate(&mut self, base: Ptr<ResolvedType>, args: Vec<Ptr<ResolvedType>>) -> Ptr<ResolvedType> {
        let base = alias_target(&base).unwrap_or(base);

        let (name, unpopulated) = {
            let b = base.borrow();
            (b.name.clone(), !b.is_external && b.kind == Kind::Struct && b.fields.is_empty())
        };
        if unpopulated && self.find_decl(&name).is_some() {
            self.populate(&base);
        }

        let b = base.borrow();
        if b.is_external || b.kind != Kind::Struct || b.fields.is_empty() {
            drop(b);
            return base;
        }

        let params = if b.type_params.len() == args.len() {
            b.type_params.clone()
        } else {
            debug!(
                ty = %b.name,
                params = b.type_params.len(),
                args = args.len(),
                "parameter count mismatch, using positional names"
            );
            (0..args.len()).map(|i| format!("T{}", i)).collect()
        };

        let register = self.template_depth == 0;
        let concrete = instance_name(&b.name, &args);
        if register {
            if let Some(existing) = self.instantiated.get(&concrete) {
                return existing.clone();
            }
        }

        let mut inst = ResolvedType::shell(if register { concrete.clone() } else { b.name.clone() });
        inst.location = b.location.clone();
        inst.comment = b.comment.clone();
        inst.is_external = b.is_external;
        inst.fields = b
            .fields
            .iter()
            .map(|f| ResolvedField {
                r#type: substitute(&f.r#type, &params, &args),
                ..f.clone()
            })
            .collect();
        drop(b);

        let inst = Ptr::new(inst);
        if register {
            trace!(ty = %concrete, "instantiated");
            self.instantiated.insert(concrete, inst.clone());
            self.instantiations.push(inst.clone());
        }
        inst
    }

    fn resolve_collection_alias(&mut self, element: &str, pointer: bool) -> Ptr<ResolvedType> {
        let elem = match self.by_name.get(element) {
            Some(ty) => ty.clone(),
            None => {
                trace!(element, "collection of an undeclared type");
                Ptr::new(ResolvedType::shell(element))
            }
        };
        if pointer {
            ResolvedType::collection(ResolvedType::pointer(elem))
        } else {
            ResolvedType::collection(elem)
        }
    }
}

/// `base` followed by the leaf name of every argument, capitalized
fn instance_name(base: &str, args: &[Ptr<ResolvedType>]) -> String {
    let mut name = base.to_string();
    for arg in args {
        let arg_leaf = leaf(arg);
        let arg_leaf = arg_leaf.borrow();
        let mut chars = arg_leaf
            .name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_');
        if let Some(first) = chars.next() {
            name.push(first.to_ascii_uppercase());
            name.extend(chars);
        }
    }
    name
}

fn alias_target(ty: &Ptr<ResolvedType>) -> Option<Ptr<ResolvedType>> {
    let t = ty.borrow();
    if t.kind == Kind::Alias {
        t.underlying.clone()
    } else {
        None
    }
}

/// Replaces every node named like one of `params` by the argument at the
/// same position, rebuilding pointers and collections around it.
fn substitute(ty: &Ptr<ResolvedType>, params: &[String], args: &[Ptr<ResolvedType>]) -> Ptr<ResolvedType> {
    let t = ty.borrow();
    if let Some(i) = params.iter().position(|p| *p == t.name) {
        return args[i].clone();
    }
    match (t.kind, &t.underlying) {
        (Kind::Pointer, Some(inner)) => ResolvedType::pointer(substitute(inner, params, args)),
        (Kind::Collection, Some(inner)) => ResolvedType::collection(substitute(inner, params, args)),
        _ => ty.clone(),
    }
}
