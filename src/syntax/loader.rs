//! Loads YAML 1.2 (and therefore JSON) into the source-ranged document tree.
//!
//! The loader drives `yaml-rust2`'s marked event parser directly instead of
//! going through a serde model: the decl parser downstream needs a source
//! range on every node, and it needs duplicate object keys preserved.

use std::collections::HashMap;

use tracing::debug;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::diags::{Diagnostic, Diagnostics};
use crate::syntax::{Node, NodeValue, ObjectEntry, SourcePos, SourceRange};

/// Parses a single YAML or JSON document into a [`Node`] tree.
///
/// Scan failures are reported as diagnostics with the scanner's position. A
/// document that parses but is empty yields `None` with no diagnostics.
pub fn load_document(filename: &str, source: &str) -> (Option<Node>, Diagnostics) {
    let mut builder = TreeBuilder::new(filename);
    let mut parser = Parser::new_from_str(source);
    let mut diags = Diagnostics::new();

    if let Err(err) = parser.load(&mut builder, false) {
        let marker = err.marker();
        let range = SourceRange::new(
            filename,
            SourcePos::new(marker.line(), marker.col() + 1),
            SourcePos::new(marker.line(), marker.col() + 1),
        );
        diags.push(Diagnostic::error(Some(range), err.to_string(), ""));
        return (None, diags);
    }

    diags.extend(builder.diags);
    let root = builder.docs.into_iter().next();
    debug!(file = filename, ok = root.is_some(), "loaded document");
    (root, diags)
}

enum Frame {
    List {
        start: SourcePos,
        items: Vec<Node>,
        anchor: usize,
    },
    Object {
        start: SourcePos,
        // Keys and values interleave; they are paired at MappingEnd.
        items: Vec<Node>,
        anchor: usize,
    },
}

struct TreeBuilder<'a> {
    filename: &'a str,
    stack: Vec<Frame>,
    docs: Vec<Node>,
    anchors: HashMap<usize, Node>,
    diags: Diagnostics,
}

impl<'a> TreeBuilder<'a> {
    fn new(filename: &'a str) -> Self {
        Self {
            filename,
            stack: Vec::new(),
            docs: Vec::new(),
            anchors: HashMap::new(),
            diags: Diagnostics::new(),
        }
    }

    fn pos(marker: &Marker) -> SourcePos {
        SourcePos::new(marker.line(), marker.col() + 1)
    }

    fn insert(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Frame::List { items, .. }) | Some(Frame::Object { items, .. }) => {
                items.push(node)
            }
            None => self.docs.push(node),
        }
    }

    fn pair_entries(&mut self, items: Vec<Node>) -> Vec<ObjectEntry> {
        let mut entries = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            let key = match key.value {
                NodeValue::String(_) => key,
                // YAML permits unquoted scalar keys of any type; fold them to
                // their textual form so decl matching stays uniform.
                NodeValue::Bool(b) => Node::new(key.range, NodeValue::String(b.to_string())),
                NodeValue::Number(n) => {
                    Node::new(key.range, NodeValue::String(format_scalar_number(n)))
                }
                NodeValue::Null => Node::new(key.range, NodeValue::String(String::new())),
                NodeValue::List(_) | NodeValue::Object(_) => {
                    self.diags.push(Diagnostic::error(
                        Some(key.range.clone()),
                        "mapping keys must be scalars",
                        format!("found {}", key.type_description()),
                    ));
                    continue;
                }
            };
            entries.push(ObjectEntry { key, value });
        }
        entries
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, marker: Marker) {
        match event {
            Event::Scalar(text, style, anchor, tag) => {
                let end_col = Self::pos(&marker).col + text.chars().count();
                let range = SourceRange::new(
                    self.filename,
                    Self::pos(&marker),
                    SourcePos::new(marker.line(), end_col),
                );
                let node = Node::new(range, resolve_scalar(&text, style, tag.as_ref()));
                if anchor != 0 {
                    self.anchors.insert(anchor, node.clone());
                }
                self.insert(node);
            }
            Event::SequenceStart(anchor, _tag) => {
                self.stack.push(Frame::List {
                    start: Self::pos(&marker),
                    items: Vec::new(),
                    anchor,
                });
            }
            Event::SequenceEnd => {
                if let Some(Frame::List {
                    start,
                    items,
                    anchor,
                }) = self.stack.pop()
                {
                    let range = SourceRange::new(self.filename, start, Self::pos(&marker));
                    let node = Node::new(range, NodeValue::List(items));
                    if anchor != 0 {
                        self.anchors.insert(anchor, node.clone());
                    }
                    self.insert(node);
                }
            }
            Event::MappingStart(anchor, _tag) => {
                self.stack.push(Frame::Object {
                    start: Self::pos(&marker),
                    items: Vec::new(),
                    anchor,
                });
            }
            Event::MappingEnd => {
                if let Some(Frame::Object {
                    start,
                    items,
                    anchor,
                }) = self.stack.pop()
                {
                    let entries = self.pair_entries(items);
                    let range = SourceRange::new(self.filename, start, Self::pos(&marker));
                    let node = Node::new(range, NodeValue::Object(entries));
                    if anchor != 0 {
                        self.anchors.insert(anchor, node.clone());
                    }
                    self.insert(node);
                }
            }
            Event::Alias(anchor) => {
                match self.anchors.get(&anchor) {
                    Some(node) => {
                        let node = node.clone();
                        self.insert(node);
                    }
                    None => {
                        let pos = Self::pos(&marker);
                        self.diags.push(Diagnostic::error(
                            Some(SourceRange::new(self.filename, pos, pos)),
                            "unresolved alias",
                            "",
                        ));
                    }
                }
            }
            Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd
            | Event::Nothing => {}
        }
    }
}

/// Resolves a scalar per the YAML 1.2 core schema. Quoted and block scalars
/// are always strings; tags override plain resolution.
fn resolve_scalar(text: &str, style: TScalarStyle, tag: Option<&Tag>) -> NodeValue {
    if style != TScalarStyle::Plain {
        return NodeValue::String(text.to_string());
    }
    if let Some(tag) = tag {
        return match tag.suffix.as_str() {
            "str" => NodeValue::String(text.to_string()),
            "null" => NodeValue::Null,
            "bool" => NodeValue::Bool(matches!(text, "true" | "True" | "TRUE")),
            "int" | "float" => text
                .parse::<f64>()
                .map(NodeValue::Number)
                .unwrap_or_else(|_| NodeValue::String(text.to_string())),
            _ => NodeValue::String(text.to_string()),
        };
    }
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return NodeValue::Null,
        "true" | "True" | "TRUE" => return NodeValue::Bool(true),
        "false" | "False" | "FALSE" => return NodeValue::Bool(false),
        _ => {}
    }
    if let Some(number) = parse_plain_number(text) {
        return NodeValue::Number(number);
    }
    NodeValue::String(text.to_string())
}

fn parse_plain_number(text: &str) -> Option<f64> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if let Some(hex) = unsigned.strip_prefix("0x") {
        let value = i64::from_str_radix(hex, 16).ok()? as f64;
        return Some(if text.starts_with('-') { -value } else { value });
    }
    if let Some(oct) = unsigned.strip_prefix("0o") {
        let value = i64::from_str_radix(oct, 8).ok()? as f64;
        return Some(if text.starts_with('-') { -value } else { value });
    }
    // Reject YAML-legal-but-surprising float forms the core schema excludes.
    if unsigned.is_empty() || !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    text.parse::<f64>().ok()
}

fn format_scalar_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Node {
        let (node, diags) = load_document("<stdin>", text);
        assert!(!diags.has_errors(), "unexpected diagnostics: {}", diags);
        node.expect("expected a document")
    }

    #[test]
    fn scalars_resolve_by_core_schema() {
        let doc = load("a: 42\nb: 4.5\nc: true\nd: ~\ne: 'true'\nf: hello");
        let entries = doc.as_object().unwrap();
        assert_eq!(entries[0].value.value, NodeValue::Number(42.0));
        assert_eq!(entries[1].value.value, NodeValue::Number(4.5));
        assert_eq!(entries[2].value.value, NodeValue::Bool(true));
        assert_eq!(entries[3].value.value, NodeValue::Null);
        assert_eq!(entries[4].value.value, NodeValue::String("true".into()));
        assert_eq!(entries[5].value.value, NodeValue::String("hello".into()));
    }

    #[test]
    fn json_documents_load() {
        let doc = load(r#"{"name": "t", "resources": {"r": {"type": "test:resource:type"}}}"#);
        let entries = doc.as_object().unwrap();
        assert_eq!(entries[0].key.as_str(), Some("name"));
        assert!(entries[1].value.as_object().is_some());
    }

    #[test]
    fn duplicate_keys_are_preserved() {
        let doc = load("foo: 1\nfoo: 2");
        let entries = doc.as_object().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.as_str(), Some("foo"));
        assert_eq!(entries[1].key.as_str(), Some("foo"));
    }

    #[test]
    fn nodes_carry_source_ranges() {
        let doc = load("config:\n  foo:\n    type: string\n");
        let entries = doc.as_object().unwrap();
        let foo = &entries[0].value.as_object().unwrap()[0];
        assert_eq!(foo.key.range.start, SourcePos::new(2, 3));
        let ty = &foo.value.as_object().unwrap()[0];
        assert_eq!(ty.key.range.start, SourcePos::new(3, 5));
    }

    #[test]
    fn set_like_mapping_entry_gets_null_value() {
        let doc = load("resources: {badResource}");
        let resources = doc.as_object().unwrap()[0].value.as_object().unwrap();
        assert_eq!(resources.len(), 1);
        assert!(resources[0].value.is_null());
    }

    #[test]
    fn scan_errors_become_diagnostics() {
        let (node, diags) = load_document("<stdin>", "not: [valid: yaml: {{");
        assert!(node.is_none());
        assert!(diags.has_errors());
    }

    #[test]
    fn version_like_strings_stay_strings() {
        let doc = load("v: 1.2.3");
        assert_eq!(
            doc.as_object().unwrap()[0].value.value,
            NodeValue::String("1.2.3".into())
        );
    }
}
