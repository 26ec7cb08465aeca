//! The structural type-description grammar for AuxData payloads.
//!
//! ```text
//! type  := leaf | ctor
//! leaf  := bool | int8..int64 | uint8..uint64 | float | double
//!        | string | UUID | Addr | Offset
//! ctor  := sequence<type> | set<type> | mapping<type,type>
//!        | tuple<type,...> | variant<type,...>
//! ```
//!
//! Printing is canonical (no whitespace, children in declared order) and
//! `parse(print(T)) == T` for every T. The parser tolerates whitespace
//! between tokens.

use crate::error::AuxDataError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    Uuid,
    Addr,
    Offset,
    Sequence(Box<TypeExpr>),
    Set(Box<TypeExpr>),
    Mapping(Box<TypeExpr>, Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    Variant(Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn sequence(elem: TypeExpr) -> TypeExpr {
        TypeExpr::Sequence(Box::new(elem))
    }

    pub fn set(elem: TypeExpr) -> TypeExpr {
        TypeExpr::Set(Box::new(elem))
    }

    pub fn mapping(key: TypeExpr, value: TypeExpr) -> TypeExpr {
        TypeExpr::Mapping(Box::new(key), Box::new(value))
    }

    /// Parses a canonical (or whitespace-padded) type expression.
    pub fn parse(text: &str) -> Result<TypeExpr, AuxDataError> {
        let mut parser = Parser::new(text);
        let expr = parser.type_expr()?;
        parser.expect_end()?;
        Ok(expr)
    }
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExpr::Bool => write!(f, "bool"),
            TypeExpr::Int8 => write!(f, "int8"),
            TypeExpr::Int16 => write!(f, "int16"),
            TypeExpr::Int32 => write!(f, "int32"),
            TypeExpr::Int64 => write!(f, "int64"),
            TypeExpr::Uint8 => write!(f, "uint8"),
            TypeExpr::Uint16 => write!(f, "uint16"),
            TypeExpr::Uint32 => write!(f, "uint32"),
            TypeExpr::Uint64 => write!(f, "uint64"),
            TypeExpr::Float => write!(f, "float"),
            TypeExpr::Double => write!(f, "double"),
            TypeExpr::String => write!(f, "string"),
            TypeExpr::Uuid => write!(f, "UUID"),
            TypeExpr::Addr => write!(f, "Addr"),
            TypeExpr::Offset => write!(f, "Offset"),
            TypeExpr::Sequence(t) => write!(f, "sequence<{}>", t),
            TypeExpr::Set(t) => write!(f, "set<{}>", t),
            TypeExpr::Mapping(k, v) => write!(f, "mapping<{},{}>", k, v),
            TypeExpr::Tuple(ts) => write_ctor(f, "tuple", ts),
            TypeExpr::Variant(ts) => write_ctor(f, "variant", ts),
        }
    }
}

fn write_ctor(
    f: &mut std::fmt::Formatter<'_>,
    name: &str,
    children: &[TypeExpr],
) -> std::fmt::Result {
    write!(f, "{}<", name)?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ">")
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    text: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, rest: text }
    }

    fn error(&self, detail: impl Into<String>) -> AuxDataError {
        AuxDataError::BadTypeExpression {
            text: self.text.to_owned(),
            detail: detail.into(),
        }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, ch: char) -> bool {
        self.skip_ws();
        if let Some(stripped) = self.rest.strip_prefix(ch) {
            self.rest = stripped;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<&'a str, AuxDataError> {
        self.skip_ws();
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(self.error("expected a type name"));
        }
        let (name, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(name)
    }

    fn type_expr(&mut self) -> Result<TypeExpr, AuxDataError> {
        let name = self.ident()?;
        match name {
            "bool" => Ok(TypeExpr::Bool),
            "int8" => Ok(TypeExpr::Int8),
            "int16" => Ok(TypeExpr::Int16),
            "int32" => Ok(TypeExpr::Int32),
            "int64" => Ok(TypeExpr::Int64),
            "uint8" => Ok(TypeExpr::Uint8),
            "uint16" => Ok(TypeExpr::Uint16),
            "uint32" => Ok(TypeExpr::Uint32),
            "uint64" => Ok(TypeExpr::Uint64),
            "float" => Ok(TypeExpr::Float),
            "double" => Ok(TypeExpr::Double),
            "string" => Ok(TypeExpr::String),
            "UUID" => Ok(TypeExpr::Uuid),
            "Addr" => Ok(TypeExpr::Addr),
            "Offset" => Ok(TypeExpr::Offset),
            "sequence" => Ok(TypeExpr::Sequence(Box::new(self.one_child(name)?))),
            "set" => Ok(TypeExpr::Set(Box::new(self.one_child(name)?))),
            "mapping" => {
                let children = self.children(name)?;
                if children.len() != 2 {
                    return Err(self.error("mapping takes exactly two children"));
                }
                let mut it = children.into_iter();
                Ok(TypeExpr::Mapping(
                    Box::new(it.next().expect("len checked")),
                    Box::new(it.next().expect("len checked")),
                ))
            }
            "tuple" => Ok(TypeExpr::Tuple(self.children(name)?)),
            "variant" => Ok(TypeExpr::Variant(self.children(name)?)),
            other => Err(self.error(format!("unknown type name '{}'", other))),
        }
    }

    fn one_child(&mut self, ctor: &str) -> Result<TypeExpr, AuxDataError> {
        let children = self.children(ctor)?;
        if children.len() != 1 {
            return Err(self.error(format!("{} takes exactly one child", ctor)));
        }
        Ok(children.into_iter().next().expect("len checked"))
    }

    fn children(&mut self, ctor: &str) -> Result<Vec<TypeExpr>, AuxDataError> {
        if !self.eat('<') {
            return Err(self.error(format!("{} requires '<'", ctor)));
        }
        let mut out = vec![self.type_expr()?];
        while self.eat(',') {
            out.push(self.type_expr()?);
        }
        if !self.eat('>') {
            return Err(self.error(format!("unterminated {} argument list", ctor)));
        }
        Ok(out)
    }

    fn expect_end(&mut self) -> Result<(), AuxDataError> {
        self.skip_ws();
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(self.error(format!("trailing input '{}'", self.rest)))
        }
    }
}
