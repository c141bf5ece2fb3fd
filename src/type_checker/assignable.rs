//! Assignability between schema types.
//!
//! [`is_assignable`] returns `Ok(())` when the assignment is legal;
//! otherwise a [`NotAssignable`] tree explaining the failure, rendered
//! depth-first with indentation. Mismatches caused by unrecognized schema
//! shapes are flagged internal so the checker reports them as warnings.

use std::fmt;

use crate::schema::{EnumValue, SchemaType};

/// The reason chain for an illegal assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotAssignable {
    pub reason: String,
    pub because: Vec<NotAssignable>,
    pub internal: bool,
    pub property: Option<String>,
}

impl NotAssignable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Default::default()
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            internal: true,
            ..Default::default()
        }
    }

    pub fn because(mut self, reasons: Vec<NotAssignable>) -> Self {
        self.because = reasons;
        self
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.property = Some(name.into());
        self
    }

    /// True when any node in the chain is an internal mismatch.
    pub fn is_internal(&self) -> bool {
        self.internal || self.because.iter().any(NotAssignable::is_internal)
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for _ in 0..indent {
            write!(f, "  ")?;
        }
        if let Some(property) = &self.property {
            write!(f, "{}: ", property)?;
        }
        write!(f, "{}", self.reason)?;
        if !self.because.is_empty() {
            write!(f, ":")?;
        }
        for child in &self.because {
            writeln!(f)?;
            child.write(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for NotAssignable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}

/// Determines whether `from` may be assigned where `to` is expected.
///
/// `literal` optionally carries the source literal being assigned, so enum
/// membership can be checked when the value is known statically.
pub fn is_assignable(from: &SchemaType, to: &SchemaType) -> Result<(), NotAssignable> {
    is_assignable_literal(from, to, None)
}

/// Literal values the enum rule can compare against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'a> {
    String(&'a str),
    Number(f64),
}

pub fn is_assignable_literal(
    from: &SchemaType,
    to: &SchemaType,
    literal: Option<Literal<'_>>,
) -> Result<(), NotAssignable> {
    let from = from.unwrap();
    let to = to.unwrap();

    // Invalid types already produced a diagnostic; adding another would only
    // repeat it.
    if from.is_invalid() || to.is_invalid() {
        return Ok(());
    }

    let fail = || {
        NotAssignable::new(format!(
            "Cannot assign '{}' to '{}'",
            from.display_type(),
            to.display_type()
        ))
    };
    let fail_primitive = || {
        NotAssignable::new(format!(
            "Cannot assign type '{}' to type '{}'",
            from.display_type(),
            to.display_type()
        ))
    };
    // The primitive wording reads better when both sides are simple names.
    let plain_fail = || {
        if from.is_primitive() && to.is_primitive() {
            fail_primitive()
        } else {
            fail()
        }
    };
    let ok_if = |cond: bool| if cond { Ok(()) } else { Err(plain_fail()) };

    // A union source assigns only if every alternative does.
    if let SchemaType::Union(alternatives) = from {
        let mut reasons = Vec::new();
        for alternative in alternatives {
            if let Err(reason) = is_assignable_literal(alternative, to, literal) {
                reasons.push(reason);
            }
        }
        if reasons.is_empty() {
            return Ok(());
        }
        return Err(fail().because(reasons));
    }

    // A token source behaves like its underlying type (or any, without one).
    if let SchemaType::Token(token) = from {
        if matches!(to, SchemaType::Token(_)) {
            // fall through to the target token rule below
        } else {
            return match &token.underlying {
                Some(underlying) => is_assignable_literal(underlying, to, literal)
                    .map_err(|reason| plain_fail().because(vec![reason])),
                None => ok_if(matches!(to, SchemaType::Any)),
            };
        }
    }

    if to.is_primitive() {
        return match to {
            SchemaType::Any => Ok(()),
            SchemaType::Number => ok_if(matches!(
                from,
                SchemaType::Number | SchemaType::Integer
            )),
            SchemaType::Integer => ok_if(matches!(from, SchemaType::Integer)),
            SchemaType::String => {
                // Resources coerce into strings via their URN; numbers and
                // booleans stringify.
                let allowed = matches!(
                    from,
                    SchemaType::String
                        | SchemaType::Number
                        | SchemaType::Integer
                        | SchemaType::Boolean
                        | SchemaType::Resource(_)
                );
                ok_if(allowed)
            }
            SchemaType::Asset => {
                // Some schema fields typed Asset accept either assets or
                // archives. Accept both rather than reject valid inputs.
                ok_if(matches!(from, SchemaType::Asset | SchemaType::Archive))
            }
            _ => ok_if(from == to),
        };
    }

    match to {
        SchemaType::Union(alternatives) => {
            let mut reasons = Vec::new();
            for alternative in alternatives {
                match is_assignable_literal(from, alternative, literal) {
                    Ok(()) => return Ok(()),
                    Err(reason) => reasons.push(reason),
                }
            }
            Err(fail().because(reasons))
        }
        SchemaType::Array(to_element) => {
            let SchemaType::Array(from_element) = from else {
                return Err(fail());
            };
            is_assignable_literal(from_element, to_element, None)
                .map_err(|reason| fail().because(vec![reason]))
        }
        SchemaType::Map(to_element) => match from {
            SchemaType::Map(from_element) => {
                is_assignable_literal(from_element, to_element, None)
                    .map_err(|reason| fail().because(vec![reason]))
            }
            SchemaType::Object(object) => {
                // The document syntax does not distinguish maps from
                // objects; allow the implicit conversion property-by-property.
                for property in &object.properties {
                    if let Err(reason) = is_assignable_literal(&property.ty, to_element, None) {
                        return Err(fail().because(vec![reason.property(property.name.clone())]));
                    }
                }
                Ok(())
            }
            _ => Err(fail()),
        },
        SchemaType::Resource(to_resource) => {
            let SchemaType::Resource(from_resource) = from else {
                return Err(fail());
            };
            // An empty target token is the any-resource type.
            ok_if(to_resource.token.is_empty() || to_resource.token == from_resource.token)
        }
        SchemaType::Enum(to_enum) => {
            let enum_fail = || {
                NotAssignable::new(format!(
                    "Cannot assign type '{}' to type '{}'",
                    from.display_type(),
                    to_enum.token
                ))
            };
            if is_assignable_literal(from, &to_enum.element, None).is_err() {
                return Err(enum_fail());
            }
            if let Some(literal) = literal {
                let matches_case = to_enum.cases.iter().any(|case| match (&case.value, literal) {
                    (EnumValue::String(s), Literal::String(l)) => s == l,
                    (EnumValue::Number(n), Literal::Number(l)) => *n == l,
                    _ => false,
                });
                if !matches_case {
                    let allowed: Vec<String> =
                        to_enum.cases.iter().map(|c| c.to_string()).collect();
                    return Err(enum_fail().because(vec![NotAssignable::new(format!(
                        "Allowed values are {}",
                        allowed.join(", ")
                    ))]));
                }
            }
            Ok(())
        }
        SchemaType::Object(to_object) => {
            // Structural typing: every required target property must be
            // satisfied; extra source properties are ignored.
            let SchemaType::Object(from_object) = from else {
                return Err(fail());
            };
            let mut failures = Vec::new();
            for property in &to_object.properties {
                match from_object.property(&property.name) {
                    None if property.is_required() => {
                        failures.push(
                            NotAssignable::new(format!(
                                "Missing required property '{}'",
                                property.name
                            ))
                            .property(property.name.clone()),
                        );
                    }
                    None => {}
                    Some(from_property) => {
                        if let Err(reason) =
                            is_assignable_literal(&from_property.ty, &property.ty, None)
                        {
                            failures.push(reason.property(property.name.clone()));
                        }
                    }
                }
            }
            if failures.is_empty() {
                Ok(())
            } else {
                Err(fail().because(failures))
            }
        }
        SchemaType::Token(to_token) => match &to_token.underlying {
            Some(underlying) => is_assignable_literal(from, underlying, literal),
            None => Err(NotAssignable::internal(format!(
                "Unknown opaque type: {}",
                to_token.token
            ))),
        },
        other => Err(NotAssignable::internal(format!(
            "Unknown type: {}",
            other.display_type()
        ))),
    }
}
