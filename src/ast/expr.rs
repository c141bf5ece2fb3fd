//! Expression AST.
//!
//! Expressions are produced by the decl parser from scalar and object nodes.
//! Every expression carries its source range and a program-unique id; the
//! type checker keys its cache by that id.

use std::fmt;

use crate::syntax::SourceRange;

/// Program-unique expression identifier. Id 0 is reserved for types the
/// checker seeds before the walk (the built-in context variable).
pub type ExprId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub range: SourceRange,
    pub kind: ExprKind,
}

impl Expr {
    /// Indefinite-article description of the expression shape, used by
    /// "must be a ..." diagnostics.
    pub fn kind_description(&self) -> &'static str {
        match &self.kind {
            ExprKind::Null => "null",
            ExprKind::Boolean(_) => "a boolean value",
            ExprKind::Number(_) => "a number",
            ExprKind::String(_) => "a string",
            ExprKind::Interpolate(_) => "an interpolated string",
            ExprKind::Symbol(_) => "a symbol",
            ExprKind::List(_) => "a list",
            ExprKind::Object(_) => "an object",
            ExprKind::Builtin(_) => "a builtin function call",
        }
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    /// Alternating literal text and property-access segments.
    Interpolate(Vec<InterpolationPart>),
    /// A bare `${a.b[0]}` covering the whole scalar.
    Symbol(PropertyAccess),
    List(Vec<Expr>),
    Object(Vec<ObjectProperty>),
    Builtin(Box<BuiltinExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationPart {
    /// Literal text preceding the access; `$${` escapes collapse here.
    pub text: String,
    pub access: Option<PropertyAccess>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub key: Expr,
    pub value: Expr,
}

/// The closed set of `fn::` built-ins.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinExpr {
    Join {
        delimiter: Expr,
        values: Expr,
    },
    Split {
        delimiter: Expr,
        source: Expr,
    },
    Select {
        index: Expr,
        values: Expr,
    },
    ToJson {
        value: Expr,
    },
    ToBase64 {
        value: Expr,
    },
    FromBase64 {
        value: Expr,
    },
    Secret {
        value: Expr,
    },
    ReadFile {
        path: Expr,
    },
    Invoke {
        token: Expr,
        args: Option<Expr>,
        ret: Option<Expr>,
        options: InvokeOptionsDecl,
    },
    StringAsset {
        text: Expr,
    },
    FileAsset {
        path: Expr,
    },
    RemoteAsset {
        uri: Expr,
    },
    AssetArchive {
        entries: Expr,
    },
    FileArchive {
        path: Expr,
    },
    RemoteArchive {
        uri: Expr,
    },
}

impl BuiltinExpr {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinExpr::Join { .. } => "fn::join",
            BuiltinExpr::Split { .. } => "fn::split",
            BuiltinExpr::Select { .. } => "fn::select",
            BuiltinExpr::ToJson { .. } => "fn::toJSON",
            BuiltinExpr::ToBase64 { .. } => "fn::toBase64",
            BuiltinExpr::FromBase64 { .. } => "fn::fromBase64",
            BuiltinExpr::Secret { .. } => "fn::secret",
            BuiltinExpr::ReadFile { .. } => "fn::readFile",
            BuiltinExpr::Invoke { .. } => "fn::invoke",
            BuiltinExpr::StringAsset { .. } => "fn::stringAsset",
            BuiltinExpr::FileAsset { .. } => "fn::fileAsset",
            BuiltinExpr::RemoteAsset { .. } => "fn::remoteAsset",
            BuiltinExpr::AssetArchive { .. } => "fn::assetArchive",
            BuiltinExpr::FileArchive { .. } => "fn::fileArchive",
            BuiltinExpr::RemoteArchive { .. } => "fn::remoteArchive",
        }
    }

    /// Child expressions, for the generic walkers.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            BuiltinExpr::Join { delimiter, values } => vec![delimiter, values],
            BuiltinExpr::Split { delimiter, source } => vec![delimiter, source],
            BuiltinExpr::Select { index, values } => vec![index, values],
            BuiltinExpr::ToJson { value }
            | BuiltinExpr::ToBase64 { value }
            | BuiltinExpr::FromBase64 { value }
            | BuiltinExpr::Secret { value } => vec![value],
            BuiltinExpr::ReadFile { path } => vec![path],
            BuiltinExpr::Invoke {
                token,
                args,
                ret,
                options,
            } => {
                let mut children = vec![token];
                children.extend(args.iter());
                children.extend(ret.iter());
                children.extend(options.depends_on.iter());
                children.extend(options.parent.iter());
                children.extend(options.provider.iter());
                children
            }
            BuiltinExpr::StringAsset { text } => vec![text],
            BuiltinExpr::FileAsset { path } | BuiltinExpr::FileArchive { path } => vec![path],
            BuiltinExpr::RemoteAsset { uri } | BuiltinExpr::RemoteArchive { uri } => vec![uri],
            BuiltinExpr::AssetArchive { entries } => vec![entries],
        }
    }
}

/// Options accepted on `fn::invoke`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeOptionsDecl {
    pub depends_on: Option<Expr>,
    pub parent: Option<Expr>,
    pub provider: Option<Expr>,
    pub version: Option<StringExpr>,
    pub plugin_download_url: Option<StringExpr>,
}

/// A string literal with its range; used for decl fields that must be plain
/// strings (names, type tokens, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct StringExpr {
    pub value: String,
    pub range: SourceRange,
}

/// A boolean literal with its range.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolExpr {
    pub value: bool,
    pub range: SourceRange,
}

/// One step of a property access: `.name`, `["key"]`, or `[index]`.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyAccessor {
    Name(String),
    StringSubscript(String),
    IntSubscript(i64),
}

/// A root name followed by a sequence of accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccess {
    pub accessors: Vec<PropertyAccessor>,
}

impl PropertyAccess {
    /// The root name: the leading name accessor or quoted subscript.
    pub fn root_name(&self) -> Option<&str> {
        match self.accessors.first()? {
            PropertyAccessor::Name(name) | PropertyAccessor::StringSubscript(name) => Some(name),
            PropertyAccessor::IntSubscript(_) => None,
        }
    }
}

impl fmt::Display for PropertyAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, accessor) in self.accessors.iter().enumerate() {
            match accessor {
                PropertyAccessor::Name(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", name)?;
                }
                PropertyAccessor::StringSubscript(key) => write!(f, "[{:?}]", key)?,
                PropertyAccessor::IntSubscript(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_access_displays_like_source() {
        let access = PropertyAccess {
            accessors: vec![
                PropertyAccessor::Name("resA".into()),
                PropertyAccessor::Name("outList".into()),
                PropertyAccessor::IntSubscript(0),
                PropertyAccessor::Name("value".into()),
            ],
        };
        assert_eq!(access.to_string(), "resA.outList[0].value");
        assert_eq!(access.root_name(), Some("resA"));
    }

    #[test]
    fn quoted_root_is_still_a_root() {
        let access = PropertyAccess {
            accessors: vec![
                PropertyAccessor::StringSubscript("odd name".into()),
                PropertyAccessor::Name("test".into()),
            ],
        };
        assert_eq!(access.root_name(), Some("odd name"));
        assert_eq!(access.to_string(), "[\"odd name\"].test");
    }
}
