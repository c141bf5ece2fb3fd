//! Scanner for `${...}` interpolation and property-access expressions.
//!
//! Grammar: `${ PropertyAccess }` with `$${...}` as the literal-dollar
//! escape. `PropertyAccess := Root (.Name | [Index])*` where a name is a
//! Unicode identifier (letters, digits, `_`, `-`) and an index is a signed
//! integer or a double-quoted string with `\uXXXX` escapes. The root may also
//! be a quoted subscript: `${["odd name"].field}`.

use crate::ast::expr::{PropertyAccess, PropertyAccessor};

/// A scanned segment: literal text, optionally followed by one access.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPart {
    pub text: String,
    pub access: Option<PropertyAccess>,
}

/// A scan failure, with the character offset it occurred at.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolateError {
    pub message: String,
    pub offset: usize,
}

impl InterpolateError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Scans a scalar string into interpolation parts.
pub fn parse_parts(source: &str) -> Result<Vec<RawPart>, InterpolateError> {
    let chars: Vec<char> = source.chars().collect();
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '$' if i + 1 < chars.len() && chars[i + 1] == '$' => {
                text.push('$');
                i += 2;
            }
            '$' if i + 1 < chars.len() && chars[i + 1] == '{' => {
                let (access, next) = parse_access(&chars, i + 2)?;
                parts.push(RawPart {
                    text: std::mem::take(&mut text),
                    access: Some(access),
                });
                i = next;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }

    if !text.is_empty() || parts.is_empty() {
        parts.push(RawPart { text, access: None });
    }
    Ok(parts)
}

/// Scans a full property access starting after `${`; returns the access and
/// the index just past the closing `}`.
fn parse_access(
    chars: &[char],
    start: usize,
) -> Result<(PropertyAccess, usize), InterpolateError> {
    let mut i = skip_spaces(chars, start);
    if i >= chars.len() {
        return Err(InterpolateError::new(
            "missing closing brace in property access",
            start,
        ));
    }
    if chars[i] == '}' {
        return Err(InterpolateError::new(
            "Property access expressions cannot be empty",
            start,
        ));
    }

    let mut accessors = Vec::new();
    // Root: bare name or quoted subscript.
    if chars[i] == '[' {
        let (accessor, next) = parse_subscript(chars, i)?;
        accessors.push(accessor);
        i = next;
    } else {
        let (name, next) = parse_name(chars, i)?;
        accessors.push(PropertyAccessor::Name(name));
        i = next;
    }

    loop {
        i = skip_spaces(chars, i);
        match chars.get(i) {
            Some('}') => return Ok((PropertyAccess { accessors }, i + 1)),
            Some('.') => {
                let (name, next) = parse_name(chars, i + 1)?;
                accessors.push(PropertyAccessor::Name(name));
                i = next;
            }
            Some('[') => {
                let (accessor, next) = parse_subscript(chars, i)?;
                accessors.push(accessor);
                i = next;
            }
            Some(c) => {
                return Err(InterpolateError::new(
                    format!("unexpected character '{}' in property access", c),
                    i,
                ))
            }
            None => {
                return Err(InterpolateError::new(
                    "missing closing brace in property access",
                    i,
                ))
            }
        }
    }
}

fn parse_name(chars: &[char], start: usize) -> Result<(String, usize), InterpolateError> {
    let mut name = String::new();
    let mut i = start;
    while let Some(&c) = chars.get(i) {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            name.push(c);
            i += 1;
        } else {
            break;
        }
    }
    if name.is_empty() {
        return Err(InterpolateError::new(
            "expected a property name",
            start,
        ));
    }
    Ok((name, i))
}

fn parse_subscript(
    chars: &[char],
    open: usize,
) -> Result<(PropertyAccessor, usize), InterpolateError> {
    let mut i = skip_spaces(chars, open + 1);
    let accessor = match chars.get(i) {
        Some('"') => {
            let (key, next) = parse_quoted(chars, i)?;
            i = next;
            PropertyAccessor::StringSubscript(key)
        }
        Some(&c) if c.is_ascii_digit() || c == '-' || c == '+' => {
            let mut literal = String::new();
            if c == '-' || c == '+' {
                literal.push(c);
                i += 1;
            }
            while let Some(&d) = chars.get(i) {
                if d.is_ascii_digit() {
                    literal.push(d);
                    i += 1;
                } else {
                    break;
                }
            }
            let index: i64 = literal
                .parse()
                .map_err(|_| InterpolateError::new("invalid list index", open + 1))?;
            PropertyAccessor::IntSubscript(index)
        }
        _ => {
            return Err(InterpolateError::new(
                "expected a quoted name or an integer index",
                i,
            ))
        }
    };
    i = skip_spaces(chars, i);
    match chars.get(i) {
        Some(']') => Ok((accessor, i + 1)),
        _ => Err(InterpolateError::new("missing closing bracket", i)),
    }
}

fn parse_quoted(chars: &[char], open: usize) -> Result<(String, usize), InterpolateError> {
    let mut key = String::new();
    let mut i = open + 1;
    while let Some(&c) = chars.get(i) {
        match c {
            '"' => return Ok((key, i + 1)),
            '\\' => {
                i += 1;
                match chars.get(i) {
                    Some('"') => key.push('"'),
                    Some('\\') => key.push('\\'),
                    Some('n') => key.push('\n'),
                    Some('t') => key.push('\t'),
                    Some('u') => {
                        let hex: String = chars.get(i + 1..i + 5).unwrap_or(&[]).iter().collect();
                        let code = u32::from_str_radix(&hex, 16).map_err(|_| {
                            InterpolateError::new("invalid unicode escape", i)
                        })?;
                        let c = char::from_u32(code).ok_or_else(|| {
                            InterpolateError::new("invalid unicode escape", i)
                        })?;
                        key.push(c);
                        i += 4;
                    }
                    _ => return Err(InterpolateError::new("invalid escape sequence", i)),
                }
                i += 1;
            }
            c => {
                key.push(c);
                i += 1;
            }
        }
    }
    Err(InterpolateError::new("unterminated quoted name", open))
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while matches!(chars.get(i), Some(' ') | Some('\t')) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access_of(s: &str) -> PropertyAccess {
        let parts = parse_parts(s).unwrap();
        assert_eq!(parts.len(), 1);
        parts[0].access.clone().unwrap()
    }

    #[test]
    fn plain_text_is_one_part() {
        let parts = parse_parts("hello").unwrap();
        assert_eq!(
            parts,
            vec![RawPart {
                text: "hello".into(),
                access: None
            }]
        );
    }

    #[test]
    fn dotted_and_indexed_access() {
        let access = access_of("${resA.outList[0].value}");
        assert_eq!(
            access.accessors,
            vec![
                PropertyAccessor::Name("resA".into()),
                PropertyAccessor::Name("outList".into()),
                PropertyAccessor::IntSubscript(0),
                PropertyAccessor::Name("value".into()),
            ]
        );
    }

    #[test]
    fn quoted_subscripts() {
        let access = access_of(r#"${bucket.tags["isRight"]}"#);
        assert_eq!(
            access.accessors[2],
            PropertyAccessor::StringSubscript("isRight".into())
        );

        let access = access_of(r#"${["bB-Beta_beta.💜⁉"].test}"#);
        assert_eq!(access.root_name(), Some("bB-Beta_beta.💜⁉"));
    }

    #[test]
    fn mixed_text_and_access() {
        let parts = parse_parts("Hello ${foo}!").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text, "Hello ");
        assert!(parts[0].access.is_some());
        assert_eq!(parts[1].text, "!");
        assert!(parts[1].access.is_none());
    }

    #[test]
    fn double_dollar_escapes() {
        let parts = parse_parts("hello $${world}!").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text, "hello ${world}!");
        assert!(parts[0].access.is_none());
    }

    #[test]
    fn empty_access_is_an_error() {
        let err = parse_parts("${}").unwrap_err();
        assert_eq!(err.message, "Property access expressions cannot be empty");
    }

    #[test]
    fn unterminated_access_is_an_error() {
        let err = parse_parts("${foo").unwrap_err();
        assert!(err.message.contains("missing closing brace"));
    }

    #[test]
    fn negative_indices_parse() {
        let access = access_of("${xs[-1]}");
        assert_eq!(access.accessors[1], PropertyAccessor::IntSubscript(-1));
    }

    #[test]
    fn escapes_in_quoted_names() {
        let access = access_of(r#"${["A\"b"]}"#);
        assert_eq!(access.root_name(), Some("A\"b"));

        let access = access_of(r#"${["\u0041"]}"#);
        assert_eq!(access.root_name(), Some("A"));
    }
}
