//! The structural type universe the checker works in.
//!
//! Provider schemas and inferred expression types both live in
//! [`SchemaType`]. Optionality is a wrapper that every judgement unwraps
//! first; anonymous object literals get a token with a reserved prefix so
//! their display falls back to the structural `{name: type, ...}` form.

use std::fmt;

/// Token prefix for object types synthesized from object literals. Types with
/// this prefix display structurally instead of by token.
pub const ANONYMOUS_OBJECT_TOKEN: &str = "tessell:adhoc:";

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub ty: SchemaType,
    pub secret: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: SchemaType) -> Self {
        Self {
            name: name.into(),
            ty,
            secret: false,
        }
    }

    pub fn optional(name: impl Into<String>, ty: SchemaType) -> Self {
        Self::new(name, SchemaType::Optional(Box::new(ty)))
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn is_required(&self) -> bool {
        !matches!(self.ty, SchemaType::Optional(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub token: String,
    pub properties: Vec<Property>,
}

impl ObjectType {
    pub fn anonymous(properties: Vec<Property>) -> Self {
        let names: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
        Self {
            token: format!("{}{}", ANONYMOUS_OBJECT_TOKEN, names.join("\u{2022}")),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Schema description of a resource: its token, input properties, and output
/// properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceType {
    pub token: String,
    pub inputs: Vec<Property>,
    pub outputs: Vec<Property>,
    pub is_component: bool,
    pub aliases: Vec<String>,
}

impl ResourceType {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            is_component: false,
            aliases: Vec::new(),
        }
    }

    pub fn output(&self, name: &str) -> Option<&Property> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Schema description of a provider function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub token: String,
    pub inputs: Option<ObjectType>,
    pub outputs: Option<ObjectType>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumValue {
    String(String),
    Number(f64),
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumValue::String(s) => write!(f, "{:?}", s),
            EnumValue::Number(n) => write!(f, "{}", format_number(*n)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumCase {
    pub name: Option<String>,
    pub value: EnumValue,
}

impl fmt::Display for EnumCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub token: String,
    pub element: Box<SchemaType>,
    pub cases: Vec<EnumCase>,
}

/// An opaque named type with an optional underlying type.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenType {
    pub token: String,
    pub underlying: Option<Box<SchemaType>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Any,
    Asset,
    Archive,
    Optional(Box<SchemaType>),
    Array(Box<SchemaType>),
    Map(Box<SchemaType>),
    Object(ObjectType),
    Union(Vec<SchemaType>),
    Resource(ResourceType),
    Enum(EnumType),
    Token(TokenType),
    Invalid,
}

impl SchemaType {
    pub fn array(element: SchemaType) -> Self {
        SchemaType::Array(Box::new(element))
    }

    pub fn map(element: SchemaType) -> Self {
        SchemaType::Map(Box::new(element))
    }

    pub fn optional(element: SchemaType) -> Self {
        SchemaType::Optional(Box::new(element))
    }

    /// Peels `Optional` wrappers; every assignability and access judgement
    /// starts here.
    pub fn unwrap(&self) -> &SchemaType {
        let mut ty = self;
        while let SchemaType::Optional(inner) = ty {
            ty = inner;
        }
        ty
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            SchemaType::String
                | SchemaType::Integer
                | SchemaType::Number
                | SchemaType::Boolean
                | SchemaType::Any
                | SchemaType::Asset
                | SchemaType::Archive
        )
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.unwrap(), SchemaType::Invalid)
    }

    /// The user-facing rendering of a type, matching what diagnostics print.
    pub fn display_type(&self) -> String {
        match self.unwrap() {
            SchemaType::String => "string".to_string(),
            SchemaType::Integer => "integer".to_string(),
            SchemaType::Number => "number".to_string(),
            SchemaType::Boolean => "boolean".to_string(),
            SchemaType::Any => "any".to_string(),
            SchemaType::Asset => "asset".to_string(),
            SchemaType::Archive => "archive".to_string(),
            SchemaType::Array(element) => format!("List<{}>", element.display_type()),
            SchemaType::Map(element) => format!("Map<{}>", element.display_type()),
            SchemaType::Object(object) => {
                if !object.token.starts_with(ANONYMOUS_OBJECT_TOKEN) && !object.token.is_empty() {
                    return object.token.clone();
                }
                let props: Vec<String> = object
                    .properties
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.ty.display_type()))
                    .collect();
                format!("{{{}}}", props.join(", "))
            }
            SchemaType::Union(elements) => {
                let inner: Vec<String> = elements.iter().map(|t| t.display_type()).collect();
                format!("Union<{}>", inner.join(", "))
            }
            SchemaType::Resource(resource) => resource.token.clone(),
            SchemaType::Enum(e) => e.token.clone(),
            SchemaType::Token(t) => {
                let underlying = t
                    .underlying
                    .as_ref()
                    .map(|u| u.display_type())
                    .unwrap_or_else(|| "any".to_string());
                format!("{}<type = {}>", t.token, underlying)
            }
            SchemaType::Invalid => "Invalid".to_string(),
            SchemaType::Optional(_) => unreachable!("unwrap peels optionals"),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_covers_composites() {
        assert_eq!(
            SchemaType::array(SchemaType::String).display_type(),
            "List<string>"
        );
        assert_eq!(
            SchemaType::map(SchemaType::Number).display_type(),
            "Map<number>"
        );
        assert_eq!(
            SchemaType::Union(vec![SchemaType::String, SchemaType::Number]).display_type(),
            "Union<string, number>"
        );
    }

    #[test]
    fn anonymous_objects_display_structurally() {
        let obj = SchemaType::Object(ObjectType::anonymous(vec![
            Property::new("foo", SchemaType::String),
            Property::new("bar", SchemaType::Any),
        ]));
        assert_eq!(obj.display_type(), "{foo: string, bar: any}");
    }

    #[test]
    fn named_objects_display_by_token() {
        let obj = SchemaType::Object(ObjectType {
            token: "pkg:mod:Thing".into(),
            properties: vec![],
        });
        assert_eq!(obj.display_type(), "pkg:mod:Thing");
    }

    #[test]
    fn token_type_display_defaults_underlying_to_any() {
        let t = SchemaType::Token(TokenType {
            token: "foo".into(),
            underlying: None,
        });
        assert_eq!(t.display_type(), "foo<type = any>");
    }

    #[test]
    fn optional_unwraps_transparently() {
        let t = SchemaType::optional(SchemaType::optional(SchemaType::Integer));
        assert_eq!(t.unwrap(), &SchemaType::Integer);
        assert_eq!(t.display_type(), "integer");
    }

    #[test]
    fn enum_cases_render_names_and_values() {
        let named = EnumCase {
            name: Some("fizz".into()),
            value: EnumValue::String("foo".into()),
        };
        assert_eq!(named.to_string(), "fizz (\"foo\")");
        let bare = EnumCase {
            name: None,
            value: EnumValue::Number(0.5),
        };
        assert_eq!(bare.to_string(), "0.5");
    }
}
