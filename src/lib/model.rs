//! Contains the resolved type graph, and the output model it is mapped to
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use super::tag::StructTag;

/// Shared, mutable handle to a node of the type graph.
///
/// Two handles are equal only when they point to the same node.
pub struct Ptr<T>(pub Rc<RefCell<T>>);
impl<T> Ptr<T> {
    pub fn new(value: T) -> Ptr<T> { Ptr(Rc::new(RefCell::new(value))) }
}
impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self { Ptr(self.0.clone()) }
}
impl<T> PartialEq for Ptr<T> {
    fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}
impl<T> std::ops::Deref for Ptr<T> {
    type Target = Rc<RefCell<T>>;
    fn deref(&self) -> &Self::Target { &self.0 }
}
// The graph may contain cycles, so only the address is printed
impl<T> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Ptr({:p})", Rc::as_ptr(&self.0)) }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
    Builtin,
    Struct,
    Alias,
    Pointer,
    Collection,
}

#[derive(Clone, Debug)]
pub struct ResolvedType {
    pub name: String,
    /// Import path of the package declaring the type, empty for local and builtin types
    pub location: String,
    pub kind: Kind,
    /// Target of an alias, or element of a pointer or collection
    pub underlying: Option<Ptr<ResolvedType>>,
    pub fields: Vec<ResolvedField>,
    pub comment: String,
    /// Parameter names of a generic declaration
    pub type_params: Vec<String>,

    pub is_external: bool,
    pub is_deprecated: bool,
    pub omit: bool,
    pub embedded: bool,

    /// The suffix has been applied to the name
    pub name_resolved: bool,
    pub alias_applied: bool,
    /// The transformation pipeline has run over the node
    pub transformed: bool,
}

impl ResolvedType {
    fn new<S: Into<String>>(name: S, kind: Kind) -> ResolvedType {
        ResolvedType {
            name: name.into(),
            location: String::new(),
            kind,
            underlying: None,
            fields: Vec::new(),
            comment: String::new(),
            type_params: Vec::new(),
            is_external: false,
            is_deprecated: false,
            omit: false,
            embedded: false,
            name_resolved: false,
            alias_applied: false,
            transformed: false,
        }
    }

    pub fn builtin<S: Into<String>>(name: S) -> Ptr<ResolvedType> { Ptr::new(ResolvedType::new(name, Kind::Builtin)) }

    /// A struct with no fields yet, which is filled in later
    pub fn shell<S: Into<String>>(name: S) -> ResolvedType { ResolvedType::new(name, Kind::Struct) }

    pub fn external<N: Into<String>, L: Into<String>>(name: N, location: L) -> ResolvedType {
        ResolvedType {
            location: location.into(),
            is_external: true,
            ..ResolvedType::new(name, Kind::Struct)
        }
    }

    pub fn pointer(elem: Ptr<ResolvedType>) -> Ptr<ResolvedType> {
        Ptr::new(ResolvedType {
            underlying: Some(elem),
            ..ResolvedType::new("", Kind::Pointer)
        })
    }

    pub fn collection(elem: Ptr<ResolvedType>) -> Ptr<ResolvedType> {
        Ptr::new(ResolvedType {
            underlying: Some(elem),
            ..ResolvedType::new("", Kind::Collection)
        })
    }

    pub fn is_template(&self) -> bool { !self.type_params.is_empty() }

    /// Whether the node has any fields which could be lifted into another struct
    pub fn has_fields(&self) -> bool { self.kind == Kind::Struct && !self.fields.is_empty() }
}

/// Follows pointers and collections down to the named type they wrap.
pub fn leaf(ty: &Ptr<ResolvedType>) -> Ptr<ResolvedType> {
    let next = {
        let t = ty.borrow();
        match (t.kind, &t.underlying) {
            (Kind::Pointer, Some(u)) | (Kind::Collection, Some(u)) => Some(u.clone()),
            _ => None,
        }
    };
    match next {
        Some(next) => leaf(&next),
        None => ty.clone(),
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedField {
    /// Name of the field in the generated type
    pub name: String,
    /// Name of the field as declared
    pub raw_name: String,
    pub comment: String,
    pub embedded: bool,
    pub r#type: Ptr<ResolvedType>,
    /// Tag of the generated field
    pub tag: StructTag,
    /// Tag as declared
    pub raw_tag: StructTag,
    pub omit: bool,
    pub deprecated: bool,
}

/// Shape of the type of an output field
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum OutputRef {
    Pointer(Box<OutputRef>),
    Collection(Box<OutputRef>),
    Leaf { name: String, location: Option<String> },
    /// Collection of patch types, `PatchSlice[T]`
    PatchCollection(Box<OutputRef>),
}

impl OutputRef {
    pub fn leaf<S: Into<String>>(name: S) -> OutputRef {
        OutputRef::Leaf {
            name: name.into(),
            location: None,
        }
    }

    pub fn external<N: Into<String>, L: Into<String>>(name: N, location: L) -> OutputRef {
        OutputRef::Leaf {
            name: name.into(),
            location: Some(location.into()),
        }
    }

    pub fn pointer(inner: OutputRef) -> OutputRef { OutputRef::Pointer(Box::new(inner)) }

    pub fn collection(inner: OutputRef) -> OutputRef { OutputRef::Collection(Box::new(inner)) }

    pub fn patch_collection(inner: OutputRef) -> OutputRef { OutputRef::PatchCollection(Box::new(inner)) }

    /// The innermost leaf of the reference
    pub fn leaf_mut(&mut self) -> &mut OutputRef {
        match self {
            OutputRef::Pointer(inner) | OutputRef::Collection(inner) | OutputRef::PatchCollection(inner) => {
                inner.leaf_mut()
            }
            leaf => leaf,
        }
    }

    pub fn leaf_name(&self) -> &str {
        match self {
            OutputRef::Pointer(inner) | OutputRef::Collection(inner) | OutputRef::PatchCollection(inner) => {
                inner.leaf_name()
            }
            OutputRef::Leaf { name, .. } => name,
        }
    }

    /// Adds every location the reference points into to `out`
    pub fn collect_locations(&self, out: &mut BTreeSet<String>) {
        match self {
            OutputRef::Pointer(inner) | OutputRef::Collection(inner) | OutputRef::PatchCollection(inner) => {
                inner.collect_locations(out)
            }
            OutputRef::Leaf {
                location: Some(location),
                ..
            } => {
                out.insert(location.clone());
            }
            OutputRef::Leaf { .. } => (),
        }
    }

    pub fn uses_patch_collection(&self) -> bool {
        match self {
            OutputRef::PatchCollection(_) => true,
            OutputRef::Pointer(inner) | OutputRef::Collection(inner) => inner.uses_patch_collection(),
            OutputRef::Leaf { .. } => false,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OutputField {
    pub name: String,
    pub r#type: OutputRef,
    pub tag: StructTag,
    pub raw_tag: StructTag,
    pub comment: String,
    pub embedded: bool,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct OutputStruct {
    pub name: String,
    /// Element of a collection alias, `type Name []Alias`
    pub alias: Option<String>,
    /// The alias element is a pointer, `type Name []*Alias`
    pub alias_ptr: bool,
    pub comment: String,
    pub fields: Vec<OutputField>,
    /// Locations referenced by the fields
    pub imports: BTreeSet<String>,
}

impl OutputStruct {
    pub fn is_alias(&self) -> bool { self.alias.is_some() }

    pub fn field(&self, name: &str) -> Option<&OutputField> { self.fields.iter().find(|f| f.name == name) }
}

pub fn find<'a>(structs: &'a [OutputStruct], name: &str) -> Option<&'a OutputStruct> {
    structs.iter().find(|s| s.name == name)
}
