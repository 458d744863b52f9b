//! Type descriptors
//!
//! Parameter and return types in the program model are written as compact
//! type expressions (`string`, `Person?`, `map<json>`, `readonly & Order[]`)
//! and parsed into [`TypeDesc`] by a small recursive-descent parser.
//!
//! Grammar:
//!
//! ```text
//! type     := union
//! union    := inter ('|' inter)*
//! inter    := postfix ('&' postfix)*
//! postfix  := primary ('[' ']' | '?')*
//! primary  := '(' ')' | '(' type ')' | '[' type (',' type)* ']'
//!           | name ('<' type '>')?
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed type expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// `string`
    String,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `decimal`
    Decimal,
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `json`
    Json,
    /// `anydata`
    AnyData,
    /// `any`
    Any,
    /// `xml`
    Xml,
    /// `error`
    Error,
    /// `()`
    Nil,
    /// `readonly`
    Readonly,
    /// `T[]`
    Array(Box<TypeDesc>),
    /// `map<T>`
    Map(Box<TypeDesc>),
    /// `table<T>`
    Table(Box<TypeDesc>),
    /// `[A, B, ...]`
    Tuple(Vec<TypeDesc>),
    /// `A|B|...`
    Union(Vec<TypeDesc>),
    /// `A&B&...`
    Intersection(Vec<TypeDesc>),
    /// Reference to a named type definition
    Named(String),
}

impl TypeDesc {
    /// Build a union, flattening nested unions and dropping duplicates.
    /// A single remaining member is returned as-is.
    pub fn union(members: impl IntoIterator<Item = TypeDesc>) -> TypeDesc {
        let mut flat: Vec<TypeDesc> = Vec::new();
        for member in members {
            match member {
                TypeDesc::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            TypeDesc::Union(flat)
        }
    }

    /// `T?`
    pub fn optional(inner: TypeDesc) -> TypeDesc {
        TypeDesc::union([inner, TypeDesc::Nil])
    }

    /// Whether this is exactly `()`
    pub fn is_nil(&self) -> bool {
        matches!(self, TypeDesc::Nil)
    }

    /// Whether `()` is a member of this type
    pub fn is_nilable(&self) -> bool {
        match self {
            TypeDesc::Nil => true,
            TypeDesc::Union(members) => members.iter().any(TypeDesc::is_nilable),
            _ => false,
        }
    }

    /// Members of the type other than `()`
    pub fn non_nil_members(&self) -> Vec<&TypeDesc> {
        match self {
            TypeDesc::Union(members) => members.iter().filter(|m| !m.is_nil()).collect(),
            TypeDesc::Nil => Vec::new(),
            other => vec![other],
        }
    }

    /// The type with `()` removed; `None` when nothing else remains
    pub fn without_nil(&self) -> Option<TypeDesc> {
        let rest: Vec<TypeDesc> = self.non_nil_members().into_iter().cloned().collect();
        if rest.is_empty() {
            None
        } else {
            Some(TypeDesc::union(rest))
        }
    }

    /// Whether `error` is a member of this type
    pub fn contains_error(&self) -> bool {
        match self {
            TypeDesc::Error => true,
            TypeDesc::Union(members) => members.iter().any(TypeDesc::contains_error),
            _ => false,
        }
    }

    /// The value part of a return type: `error` and `()` removed.
    pub fn value_type(&self) -> Option<TypeDesc> {
        let rest: Vec<TypeDesc> = match self {
            TypeDesc::Union(members) => members
                .iter()
                .filter(|m| !m.is_nil() && **m != TypeDesc::Error)
                .cloned()
                .collect(),
            TypeDesc::Nil | TypeDesc::Error => Vec::new(),
            other => vec![other.clone()],
        };
        if rest.is_empty() {
            None
        } else {
            Some(TypeDesc::union(rest))
        }
    }

    /// `string`, `int`, `float`, `decimal` or `boolean`
    pub fn is_basic_scalar(&self) -> bool {
        matches!(
            self,
            TypeDesc::String | TypeDesc::Int | TypeDesc::Float | TypeDesc::Decimal | TypeDesc::Boolean
        )
    }

    /// A basic scalar or an array of basic scalars
    pub fn is_basic(&self) -> bool {
        match self {
            TypeDesc::Array(element) => element.is_basic_scalar(),
            other => other.is_basic_scalar(),
        }
    }

    /// `byte[]`
    pub fn is_byte_array(&self) -> bool {
        matches!(self, TypeDesc::Array(element) if **element == TypeDesc::Byte)
    }

    /// Reduce an intersection to its single effective member.
    ///
    /// `readonly` members are dropped; the reduction fails when more than
    /// one other member remains. Union members are reduced individually.
    pub fn effective(&self) -> std::result::Result<TypeDesc, TypeDesc> {
        match self {
            TypeDesc::Intersection(members) => {
                let rest: Vec<&TypeDesc> = members
                    .iter()
                    .filter(|m| **m != TypeDesc::Readonly)
                    .collect();
                match rest.as_slice() {
                    [single] => single.effective(),
                    _ => Err(self.clone()),
                }
            }
            TypeDesc::Union(members) => {
                let reduced = members
                    .iter()
                    .map(TypeDesc::effective)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(TypeDesc::union(reduced))
            }
            other => Ok(other.clone()),
        }
    }

    fn needs_parens_in_postfix(&self) -> bool {
        matches!(self, TypeDesc::Union(_) | TypeDesc::Intersection(_))
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::String => write!(f, "string"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Float => write!(f, "float"),
            TypeDesc::Decimal => write!(f, "decimal"),
            TypeDesc::Boolean => write!(f, "boolean"),
            TypeDesc::Byte => write!(f, "byte"),
            TypeDesc::Json => write!(f, "json"),
            TypeDesc::AnyData => write!(f, "anydata"),
            TypeDesc::Any => write!(f, "any"),
            TypeDesc::Xml => write!(f, "xml"),
            TypeDesc::Error => write!(f, "error"),
            TypeDesc::Nil => write!(f, "()"),
            TypeDesc::Readonly => write!(f, "readonly"),
            TypeDesc::Array(element) if element.needs_parens_in_postfix() => {
                write!(f, "({})[]", element)
            }
            TypeDesc::Array(element) => write!(f, "{}[]", element),
            TypeDesc::Map(value) => write!(f, "map<{}>", value),
            TypeDesc::Table(row) => write!(f, "table<{}>", row),
            TypeDesc::Tuple(members) => {
                write!(f, "[")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, "]")
            }
            TypeDesc::Union(members) => {
                let non_nil: Vec<&TypeDesc> = members.iter().filter(|m| !m.is_nil()).collect();
                if non_nil.len() == 1 && members.len() == 2 {
                    let inner = non_nil[0];
                    return if inner.needs_parens_in_postfix() {
                        write!(f, "({})?", inner)
                    } else {
                        write!(f, "{}?", inner)
                    };
                }
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
            TypeDesc::Intersection(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    if matches!(m, TypeDesc::Union(_)) {
                        write!(f, "({})", m)?;
                    } else {
                        write!(f, "{}", m)?;
                    }
                }
                Ok(())
            }
            TypeDesc::Named(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for TypeDesc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = TypeParser::new(s);
        let ty = parser.parse_union()?;
        parser.skip_ws();
        if parser.pos < parser.bytes.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }
}

impl Serialize for TypeDesc {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeDesc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

struct TypeParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::TypeSyntax {
            input: self.input.to_string(),
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c as char)))
        }
    }

    fn parse_union(&mut self) -> Result<TypeDesc> {
        let mut members = vec![self.parse_intersection()?];
        while self.eat(b'|') {
            members.push(self.parse_intersection()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeDesc::union(members)
        })
    }

    fn parse_intersection(&mut self) -> Result<TypeDesc> {
        let mut members = vec![self.parse_postfix()?];
        while self.eat(b'&') {
            members.push(self.parse_postfix()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeDesc::Intersection(members)
        })
    }

    fn parse_postfix(&mut self) -> Result<TypeDesc> {
        let mut ty = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(b'[') => {
                    self.pos += 1;
                    self.expect(b']')?;
                    ty = TypeDesc::Array(Box::new(ty));
                }
                Some(b'?') => {
                    self.pos += 1;
                    ty = TypeDesc::optional(ty);
                }
                _ => return Ok(ty),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<TypeDesc> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                if self.eat(b')') {
                    return Ok(TypeDesc::Nil);
                }
                let inner = self.parse_union()?;
                self.expect(b')')?;
                Ok(inner)
            }
            Some(b'[') => {
                self.pos += 1;
                let mut members = vec![self.parse_union()?];
                while self.eat(b',') {
                    members.push(self.parse_union()?);
                }
                self.expect(b']')?;
                Ok(TypeDesc::Tuple(members))
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                let name = self.parse_name();
                self.named_type(name)
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of type expression")),
        }
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c.is_ascii_alphanumeric() || c == b'_' || c == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn type_parameter(&mut self) -> Result<TypeDesc> {
        self.expect(b'<')?;
        let inner = self.parse_union()?;
        self.expect(b'>')?;
        Ok(inner)
    }

    fn named_type(&mut self, name: String) -> Result<TypeDesc> {
        Ok(match name.as_str() {
            "string" => TypeDesc::String,
            "int" => TypeDesc::Int,
            "float" => TypeDesc::Float,
            "decimal" => TypeDesc::Decimal,
            "boolean" => TypeDesc::Boolean,
            "byte" => TypeDesc::Byte,
            "json" => TypeDesc::Json,
            "anydata" => TypeDesc::AnyData,
            "any" => TypeDesc::Any,
            "xml" => TypeDesc::Xml,
            "error" => TypeDesc::Error,
            "readonly" => TypeDesc::Readonly,
            "map" => TypeDesc::Map(Box::new(self.type_parameter()?)),
            "table" => TypeDesc::Table(Box::new(self.type_parameter()?)),
            _ => TypeDesc::Named(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(s: &str) -> TypeDesc {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("string", TypeDesc::String)]
    #[case("byte[]", TypeDesc::Array(Box::new(TypeDesc::Byte)))]
    #[case("()", TypeDesc::Nil)]
    #[case("map<json>", TypeDesc::Map(Box::new(TypeDesc::Json)))]
    #[case("Person", TypeDesc::Named("Person".to_string()))]
    #[case("types:Person", TypeDesc::Named("types:Person".to_string()))]
    fn test_parse_primary(#[case] input: &str, #[case] expected: TypeDesc) {
        assert_eq!(parse(input), expected);
    }

    #[test]
    fn test_parse_optional_is_union_with_nil() {
        let ty = parse("string?");
        assert_eq!(ty, TypeDesc::Union(vec![TypeDesc::String, TypeDesc::Nil]));
        assert!(ty.is_nilable());
        assert_eq!(ty.without_nil(), Some(TypeDesc::String));
    }

    #[test]
    fn test_parse_union_flattens() {
        let ty = parse("int|(string|int)|()");
        assert_eq!(
            ty,
            TypeDesc::Union(vec![TypeDesc::Int, TypeDesc::String, TypeDesc::Nil])
        );
    }

    #[test]
    fn test_parse_intersection_and_reduce() {
        let ty = parse("readonly & Person");
        assert!(matches!(ty, TypeDesc::Intersection(_)));
        assert_eq!(ty.effective().unwrap(), TypeDesc::Named("Person".into()));
    }

    #[test]
    fn test_irreducible_intersection() {
        let ty = parse("Person & Employee");
        assert!(ty.effective().is_err());
    }

    #[test]
    fn test_parse_tuple_and_table() {
        assert_eq!(
            parse("[int, string]"),
            TypeDesc::Tuple(vec![TypeDesc::Int, TypeDesc::String])
        );
        assert_eq!(
            parse("table<Person>"),
            TypeDesc::Table(Box::new(TypeDesc::Named("Person".into())))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<TypeDesc>().is_err());
        assert!("map<int".parse::<TypeDesc>().is_err());
        assert!("int]".parse::<TypeDesc>().is_err());
        assert!("[int,".parse::<TypeDesc>().is_err());
    }

    #[rstest]
    #[case("string?")]
    #[case("int[]")]
    #[case("(int|string)[]")]
    #[case("map<json>")]
    #[case("Person|error|()")]
    #[case("readonly & Person")]
    fn test_display_is_parseable(#[case] input: &str) {
        let ty = parse(input);
        assert_eq!(parse(&ty.to_string()), ty);
    }

    #[test]
    fn test_value_type_strips_error_and_nil() {
        assert_eq!(parse("string|error").value_type(), Some(TypeDesc::String));
        assert_eq!(parse("error?").value_type(), None);
        assert_eq!(parse("()").value_type(), None);
    }

    #[test]
    fn test_basic_classification() {
        assert!(parse("decimal").is_basic());
        assert!(parse("boolean[]").is_basic());
        assert!(!parse("byte[]").is_basic());
        assert!(parse("byte[]").is_byte_array());
        assert!(!parse("json").is_basic());
    }
}
