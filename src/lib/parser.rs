use super::ast;

/// Anything that is not a type declaration the scanner cares about
enum Item {
    Imports(Vec<ast::Import>),
    Decls(Vec<ast::Decl>),
    Skip,
}

fn join_comments(outer: &str, inner: &str) -> String {
    match (outer.is_empty(), inner.is_empty()) {
        (true, _) => inner.to_string(),
        (_, true) => outer.to_string(),
        _ => format!("{}\n{}", outer, inner),
    }
}

fn attach_comment(decl: ast::Decl, doc: String) -> ast::Decl {
    match decl {
        ast::Decl::Struct {
            name,
            type_params,
            fields,
            ..
        } => ast::Decl::Struct {
            name,
            comment: doc,
            type_params,
            fields,
        },
        ast::Decl::Collection {
            name, element, pointer, ..
        } => ast::Decl::Collection {
            name,
            comment: doc,
            element,
            pointer,
        },
        ast::Decl::Instance {
            name, pkg, base, args, ..
        } => ast::Decl::Instance {
            name,
            comment: doc,
            pkg,
            base,
            args,
        },
        alias => alias,
    }
}

fn unescape(s: &str) -> String { s.replace("\\\"", "\"").replace("\\\\", "\\") }

peg::parser!(pub grammar go() for str {
    /// Parses horizontal whitespace and block comments
    rule hs() = quiet!{ ([' ' | '\t' | '\r'] / block_comment())* }
    /// Parses any whitespace and comments
    rule ws() = quiet!{ ([' ' | '\t' | '\r' | '\n'] / line_comment_skip() / block_comment())* }
    /// Parses the end of a line, or the end of the input
    rule eol() = "\n" / ![_]

    rule block_comment() = "/*" (!"*/" [_])* "*/"
    rule line_comment() -> String = "//" c:$([^ '\n']*) { c.trim().to_string() }
    rule line_comment_skip() = "//" [^ '\n']*

    rule blank_line() = hs() "\n"
    rule comment_line() -> String = hs() c:line_comment() hs() "\n" { c }
    /// Parses blank lines and comment groups, returning the group which
    /// directly precedes whatever comes next
    rule leading() -> String
        = parts:(blank_line() { None::<String> } / c:comment_line() { Some(c) })* {
            let mut doc = Vec::new();
            for part in parts {
                match part {
                    Some(c) => doc.push(c),
                    None => doc.clear(),
                }
            }
            doc.join("\n")
        }
    /// Parses whatever may follow a declaration on the same line
    rule trailing() -> String
        = hs() ";"? hs() c:line_comment()? (eol() / &")" / &"}") { c.unwrap_or_default() }

    rule ident_start() = ['a'..='z' | 'A'..='Z' | '_']
    rule ident_char() = ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']
    /// Parses a single identifier
    rule ident() -> String = i:quiet!{ $(ident_start() ident_char()*) } { i.to_string() }
        / expected!("identifier")

    rule raw_string() -> String = "`" s:$([^ '`']*) "`" { s.to_string() }
    rule interpreted_string() -> String = "\"" s:$(("\\" [_] / [^ '"' | '\\' | '\n'])*) "\"" { unescape(s) }
    rule rune_lit() = "'" ("\\" [_] / [^ '\'' | '\\'])* "'"
    rule string_lit() -> String = raw_string() / interpreted_string()
    rule string_skip() = "`" [^ '`']* "`" / "\"" ("\\" [_] / [^ '"' | '\\' | '\n'])* "\""

    /// Parses a bracketed group, skipping over everything inside of it
    rule balanced()
        = "(" inner()* ")"
        / "{" inner()* "}"
        / "[" inner()* "]"
    rule inner()
        = balanced()
        / line_comment_skip()
        / block_comment()
        / string_skip()
        / rune_lit()
        / [^ '(' | ')' | '{' | '}' | '[' | ']' | '"' | '`' | '\'']
    /// Parses the rest of a line, including any bracketed groups opened on it
    rule rest_of_line()
        = (balanced() / line_comment_skip() / block_comment() / string_skip() / rune_lit()
            / [^ '\n' | '(' | ')' | '{' | '}' | '[' | ']' | '"' | '`' | '\''])*

    /// Recursively parses a type expression
    pub rule type_expr() -> ast::TypeExpr
        = "*" hs() t:type_expr() { ast::TypeExpr::pointer(t) }
        / "[" hs() "]" hs() t:type_expr() { ast::TypeExpr::slice(t) }
        / "[" hs() ['0'..='9' | '.']+ hs() "]" hs() t:type_expr() { ast::TypeExpr::slice(t) }
        / "map" hs() "[" hs() k:type_expr() hs() "]" hs() v:type_expr() {
            ast::TypeExpr::Map(Box::new(k), Box::new(v))
        }
        / o:$("chan" !ident_char() hs() "<-"? hs() type_expr()) { ast::TypeExpr::Other(o.to_string()) }
        / o:$("<-" hs() "chan" !ident_char() hs() type_expr()) { ast::TypeExpr::Other(o.to_string()) }
        / o:$("func" hs() "(" inner()* ")" [^ '\n' | '`' | ';' | ',' | ']' | ')' | '}']*) {
            ast::TypeExpr::Other(o.trim().to_string())
        }
        / o:$(("interface" / "struct") hs() "{" inner()* "}") { ast::TypeExpr::Other(o.to_string()) }
        / base:named_type() "[" hs() args:(type_expr() ++ (hs() "," hs())) hs() "]" {
            ast::TypeExpr::generic(base, args)
        }
        / named_type()

    rule named_type() -> ast::TypeExpr
        = pkg:ident() "." name:ident() { ast::TypeExpr::Qualified(pkg, name) }
        / name:ident() { ast::TypeExpr::Ident(name) }

    rule tag_lit() -> String = string_lit()

    /// Parses a single line of a struct body, which may declare several fields
    rule field_line() -> Vec<ast::RawField>
        = doc:leading() hs() names:(ident() ++ (hs() "," hs())) hs() t:type_expr() hs() tag:tag_lit()? c:trailing() {
            let comment = join_comments(&doc, &c);
            names
                .into_iter()
                .map(|name| ast::RawField {
                    name,
                    comment: comment.clone(),
                    r#type: t.clone(),
                    tag: tag.clone(),
                    embedded: false,
                })
                .collect()
        }
        / doc:leading() hs() t:type_expr() hs() tag:tag_lit()? c:trailing() {
            let mut field = ast::RawField::embedded(t).with_comment(join_comments(&doc, &c));
            field.tag = tag;
            vec![field]
        }

    rule struct_body() -> Vec<ast::RawField>
        = "{" fields:field_line()* leading() hs() "}" { fields.into_iter().flatten().collect() }

    /// Parses a constraint of a type parameter, up to the next `,` or `]`
    rule constraint() = ("[" inner()* "]" / [^ ',' | ']' | '[' | '\n'])+

    rule type_param_group() -> Vec<String> = names:(ident() ++ (hs() "," hs())) hs() constraint() { names }

    rule type_params() -> Vec<String>
        = "[" hs() groups:(type_param_group() ++ (hs() "," hs())) hs() "]" {
            groups.into_iter().flatten().collect()
        }

    /// Parses a single type spec, yielding nothing for the kinds of types
    /// which have no bearing on generation
    rule type_spec() -> Option<ast::Decl>
        = name:ident() hs() "=" hs() target:type_expr() trailing() {
            Some(ast::Decl::Alias { name, target })
        }
        / name:ident() hs() type_params:type_params()? hs() "struct" hs() fields:struct_body() trailing() {
            Some(ast::Decl::Struct {
                name,
                comment: String::new(),
                type_params: type_params.unwrap_or_default(),
                fields,
            })
        }
        / name:ident() hs() "[" hs() ['0'..='9']* hs() "]" hs() pointer:"*"? hs() element:ident()
            !(hs() ("." / "[")) trailing() {
            Some(ast::Decl::Collection {
                name,
                comment: String::new(),
                element,
                pointer: pointer.is_some(),
            })
        }
        / name:ident() hs() pkg:ident() "." base:ident() "[" hs() args:(type_expr() ++ (hs() "," hs())) hs() "]" trailing() {
            Some(ast::Decl::Instance {
                name,
                comment: String::new(),
                pkg,
                base,
                args,
            })
        }
        / ident() hs() type_params()? hs() rest_of_line() eol() { None }

    rule type_decl() -> Vec<ast::Decl>
        = doc:leading() hs() "type" !ident_char() hs() "(" trailing()
            specs:(d:leading() hs() s:type_spec() { (d, s) })*
            leading() hs() ")" trailing() {
            specs
                .into_iter()
                .filter_map(|(d, s)| s.map(|s| attach_comment(s, join_comments(&doc, &d))))
                .collect()
        }
        / doc:leading() hs() "type" !ident_char() hs() s:type_spec() {
            s.map(|s| attach_comment(s, doc)).into_iter().collect()
        }

    rule import_spec() -> ast::Import
        = name:(n:$(ident_start() ident_char()* / ".") hs() { n.to_string() })? path:string_lit() {
            ast::Import { name, path }
        }

    rule import_decl() -> Vec<ast::Import>
        = leading() hs() "import" !ident_char() hs() "(" trailing()
            specs:(leading() hs() s:import_spec() trailing() { s })*
            leading() hs() ")" trailing() { specs }
        / leading() hs() "import" !ident_char() hs() s:import_spec() trailing() { vec![s] }

    rule other_item() = leading() hs() ("func" / "var" / "const") !ident_char() rest_of_line() eol()

    rule item() -> Item
        = i:import_decl() { Item::Imports(i) }
        / d:type_decl() { Item::Decls(d) }
        / other_item() { Item::Skip }

    /// Parses a Go source file
    pub rule file() -> ast::File
        = leading() hs() "package" !ident_char() hs() package:ident() trailing() items:item()* ws() ![_] {
            let mut imports = Vec::new();
            let mut decls = Vec::new();
            for item in items {
                match item {
                    Item::Imports(i) => imports.extend(i),
                    Item::Decls(d) => decls.extend(d),
                    Item::Skip => (),
                }
            }
            ast::File { package, imports, decls }
        }
});

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use ast::*;

    #[test]
    fn parses_type_expressions() {
        assert_eq!(go::type_expr("string").unwrap(), TypeExpr::ident("string"));
        assert_eq!(
            go::type_expr("*uuid.UUID").unwrap(),
            TypeExpr::pointer(TypeExpr::qualified("uuid", "UUID"))
        );
        assert_eq!(
            go::type_expr("[]*Widget").unwrap(),
            TypeExpr::slice(TypeExpr::pointer(TypeExpr::ident("Widget")))
        );
        assert_eq!(
            go::type_expr("[16]byte").unwrap(),
            TypeExpr::slice(TypeExpr::ident("byte"))
        );
        assert_eq!(
            go::type_expr("map[string]int").unwrap(),
            TypeExpr::Map(Box::new(TypeExpr::ident("string")), Box::new(TypeExpr::ident("int")))
        );
        assert_eq!(
            go::type_expr("Paginated[User, *Meta]").unwrap(),
            TypeExpr::generic(
                TypeExpr::ident("Paginated"),
                vec![TypeExpr::ident("User"), TypeExpr::pointer(TypeExpr::ident("Meta"))]
            )
        );
        assert_eq!(
            go::type_expr("interface{}").unwrap(),
            TypeExpr::Other("interface{}".to_string())
        );
    }

    #[test]
    fn parses_struct_with_tags_and_comments() {
        let src = "package model

import \"github.com/google/uuid\"

// Widget is a widget
type Widget struct {
	Base `gorm:\",embedded\"`
	// ID is the key
	ID   uuid.UUID `gorm:\"primaryKey\" json:\"id\"`
	X, Y int // coordinates
	next *Widget
}
";
        let file = go::file(src).unwrap();
        assert_eq!(file.package, "model");
        assert_eq!(
            file.imports,
            vec![Import {
                name: None,
                path: "github.com/google/uuid".to_string()
            }]
        );
        assert_eq!(
            file.decls,
            vec![Decl::Struct {
                name: "Widget".to_string(),
                comment: "Widget is a widget".to_string(),
                type_params: vec![],
                fields: vec![
                    RawField::embedded(TypeExpr::ident("Base")).with_tag("gorm:\",embedded\""),
                    RawField::new("ID", TypeExpr::qualified("uuid", "UUID"))
                        .with_tag("gorm:\"primaryKey\" json:\"id\"")
                        .with_comment("ID is the key"),
                    RawField::new("X", TypeExpr::ident("int")).with_comment("coordinates"),
                    RawField::new("Y", TypeExpr::ident("int")).with_comment("coordinates"),
                    RawField::new("next", TypeExpr::pointer(TypeExpr::ident("Widget"))),
                ],
            }]
        );
    }

    #[test]
    fn parses_alias_shapes() {
        let src = "package model

import (
	\"time\"
	m \"example.com/base/model\"
)

type Widgets []*Widget
type Wodgets []Wodget
type Time = time.Time
type MutableModel m.MutableModel[uuid.UUID]
type Status string
";
        let file = go::file(src).unwrap();
        assert_eq!(file.imports[1].alias(), "m");
        assert_eq!(file.imports[0].alias(), "time");
        assert_eq!(
            file.decls,
            vec![
                Decl::Collection {
                    name: "Widgets".to_string(),
                    comment: String::new(),
                    element: "Widget".to_string(),
                    pointer: true,
                },
                Decl::Collection {
                    name: "Wodgets".to_string(),
                    comment: String::new(),
                    element: "Wodget".to_string(),
                    pointer: false,
                },
                Decl::Alias {
                    name: "Time".to_string(),
                    target: TypeExpr::qualified("time", "Time"),
                },
                Decl::Instance {
                    name: "MutableModel".to_string(),
                    comment: String::new(),
                    pkg: "m".to_string(),
                    base: "MutableModel".to_string(),
                    args: vec![TypeExpr::qualified("uuid", "UUID")],
                },
            ]
        );
    }

    #[test]
    fn parses_generic_struct_and_skips_the_rest() {
        let src = "package model

type PrimaryKey interface {
	~string | ~[]byte |
		~[16]byte
}

type Keyed[T PrimaryKey, K, V any] struct {
	ID T
}

func (k *Keyed[T, K, V]) Key() T {
	if true { return k.ID }
	return k.ID
}

const name = \"}\"

var (
	a = 1
)

type (
	// Deprecated
	Old struct{}
	New struct{ Name string }
)
";
        let file = go::file(src).unwrap();
        assert_eq!(
            file.decls,
            vec![
                Decl::Struct {
                    name: "Keyed".to_string(),
                    comment: String::new(),
                    type_params: vec!["T".to_string(), "K".to_string(), "V".to_string()],
                    fields: vec![RawField::new("ID", TypeExpr::ident("T"))],
                },
                Decl::Struct {
                    name: "Old".to_string(),
                    comment: "Deprecated".to_string(),
                    type_params: vec![],
                    fields: vec![],
                },
                Decl::Struct {
                    name: "New".to_string(),
                    comment: String::new(),
                    type_params: vec![],
                    fields: vec![RawField::new("Name", TypeExpr::ident("string"))],
                },
            ]
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(go::file("package model\n\ntype Widget struct {\n").is_err());
    }
}
