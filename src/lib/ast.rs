//! Contains the "raw" declarations which are output by the scanner
//!
//! Raw meaning nothing has been resolved yet: type expressions are kept
//! exactly as they were written, and tags are still literals.
use std::fmt;

/// A type expression as it appears in a field or a declaration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TypeExpr {
    /// `string`, `Widget`, `T`
    Ident(String),
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `[]T` and `[N]T`
    Slice(Box<TypeExpr>),
    /// `map[K]V`
    Map(Box<TypeExpr>, Box<TypeExpr>),
    /// `Base[A]`, `Base[A, B]`
    Generic(Box<TypeExpr>, Vec<TypeExpr>),
    /// `pkg.Name`
    Qualified(String, String),
    /// Anything the scanner does not model (`chan T`, `func()`, `interface{}`, ...)
    Other(String),
}

impl TypeExpr {
    pub fn ident<S: Into<String>>(name: S) -> TypeExpr { TypeExpr::Ident(name.into()) }

    pub fn pointer(inner: TypeExpr) -> TypeExpr { TypeExpr::Pointer(Box::new(inner)) }

    pub fn slice(inner: TypeExpr) -> TypeExpr { TypeExpr::Slice(Box::new(inner)) }

    pub fn qualified<P: Into<String>, N: Into<String>>(pkg: P, name: N) -> TypeExpr {
        TypeExpr::Qualified(pkg.into(), name.into())
    }

    pub fn generic(base: TypeExpr, args: Vec<TypeExpr>) -> TypeExpr { TypeExpr::Generic(Box::new(base), args) }

    /// The name an embedded field of this type is known by (`*pkg.Model[T]` -> `Model`).
    pub fn embedded_name(&self) -> &str {
        match self {
            TypeExpr::Ident(name) => name,
            TypeExpr::Qualified(_, name) => name,
            TypeExpr::Pointer(inner) => inner.embedded_name(),
            TypeExpr::Generic(base, _) => base.embedded_name(),
            _ => "",
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Ident(name) => write!(f, "{}", name),
            TypeExpr::Pointer(inner) => write!(f, "*{}", inner),
            TypeExpr::Slice(inner) => write!(f, "[]{}", inner),
            TypeExpr::Map(k, v) => write!(f, "map[{}]{}", k, v),
            TypeExpr::Generic(base, args) => {
                write!(f, "{}[", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
            TypeExpr::Qualified(pkg, name) => write!(f, "{}.{}", pkg, name),
            TypeExpr::Other(text) => write!(f, "{}", text),
        }
    }
}

/// A single struct field. Embedded fields carry the name of their type.
#[derive(Clone, PartialEq, Debug)]
pub struct RawField {
    pub name: String,
    pub comment: String,
    pub r#type: TypeExpr,
    /// Contents of the tag literal, without the surrounding quotes
    pub tag: Option<String>,
    pub embedded: bool,
}

impl RawField {
    pub fn new<S: Into<String>>(name: S, r#type: TypeExpr) -> RawField {
        RawField {
            name: name.into(),
            comment: String::new(),
            r#type,
            tag: None,
            embedded: false,
        }
    }

    pub fn embedded(r#type: TypeExpr) -> RawField {
        RawField {
            name: r#type.embedded_name().to_string(),
            comment: String::new(),
            r#type,
            tag: None,
            embedded: true,
        }
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> RawField {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> RawField {
        self.comment = comment.into();
        self
    }
}

/// Import spec: `import name "path"`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Import {
    pub name: Option<String>,
    pub path: String,
}

impl Import {
    /// The identifier the import is referred to by inside the file.
    pub fn alias(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if name != "_" && name != "." => name,
            _ => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Decl {
    /// `type Name[T any] struct { ... }`
    Struct {
        name: String,
        comment: String,
        type_params: Vec<String>,
        fields: Vec<RawField>,
    },
    /// `type Name []Elem` or `type Name []*Elem`
    Collection {
        name: String,
        comment: String,
        element: String,
        pointer: bool,
    },
    /// `type Name = Target`
    Alias { name: String, target: TypeExpr },
    /// `type Name pkg.Base[A, ...]`
    Instance {
        name: String,
        comment: String,
        pkg: String,
        base: String,
        args: Vec<TypeExpr>,
    },
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Struct { name, .. }
            | Decl::Collection { name, .. }
            | Decl::Alias { name, .. }
            | Decl::Instance { name, .. } => name,
        }
    }
}

/// A single scanned source file
#[derive(Clone, PartialEq, Debug)]
pub struct File {
    pub package: String,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}
