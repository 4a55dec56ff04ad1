//! Document tree used by queries
//!
//! Built from parser events rather than `serde_yaml::Value` so every scalar
//! keeps the text it was written with: `1.10` stays `1.10` and `0o755`
//! stays `0o755` when printed back. The resolved value is kept alongside
//! for comparisons.

use std::collections::HashMap;

use serde_yaml::Value;
use yaml_rust2::parser::{Event, EventReceiver, Parser, Tag};
use yaml_rust2::scanner::TScalarStyle;

use crate::format::DecodeError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Scalar {
    /// Text as written, without quotes
    pub text: String,
    /// Whether the source used quotes or a block style
    pub quoted: bool,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>),
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar {
            text: "null".to_string(),
            quoted: false,
            value: Value::Null,
        })
    }

    /// Builds a node from a resolved value, as for query literals and
    /// computed results
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => plain(b.to_string(), value.clone()),
            Value::Number(n) => plain(n.to_string(), value.clone()),
            Value::String(s) => Node::Scalar(Scalar {
                text: s.clone(),
                quoted: true,
                value: value.clone(),
            }),
            Value::Sequence(items) => Node::Sequence(items.iter().map(Node::from_value).collect()),
            Value::Mapping(map) => Node::Mapping(
                map.iter()
                    .map(|(k, v)| (Node::from_value(k), Node::from_value(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Node::from_value(&tagged.value),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Node::Scalar(scalar) => scalar.value.clone(),
            Node::Sequence(items) => Value::Sequence(items.iter().map(Node::to_value).collect()),
            Node::Mapping(entries) => Value::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_value(), v.to_value()))
                    .collect(),
            ),
        }
    }

    /// Looks up a mapping entry by the text of its key
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, Node::Scalar(s) if s.text == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Scalar(scalar) => Some(&scalar.value),
            _ => None,
        }
    }
}

fn plain(text: String, value: Value) -> Node {
    Node::Scalar(Scalar {
        text,
        quoted: false,
        value,
    })
}

/// Parses every document of a YAML stream. Blank input has no documents.
pub(crate) fn load(data: &[u8]) -> Result<Vec<Node>, DecodeError> {
    let text = std::str::from_utf8(data)?;

    let mut builder = Builder::default();
    Parser::new_from_str(text).load(&mut builder, true)?;
    Ok(builder.documents)
}

enum Frame {
    Sequence {
        anchor: usize,
        items: Vec<Node>,
    },
    Mapping {
        anchor: usize,
        entries: Vec<(Node, Node)>,
        key: Option<Node>,
    },
}

#[derive(Default)]
struct Builder {
    documents: Vec<Node>,
    stack: Vec<Frame>,
    anchors: HashMap<usize, Node>,
}

impl Builder {
    fn finish(&mut self, anchor: usize, node: Node) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }

        match self.stack.last_mut() {
            None => self.documents.push(node),
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { entries, key, .. }) => match key.take() {
                None => *key = Some(node),
                Some(k) => entries.push((k, node)),
            },
        }
    }
}

impl EventReceiver for Builder {
    fn on_event(&mut self, event: Event) {
        match event {
            Event::Scalar(text, style, anchor, tag) => {
                let quoted = !matches!(style, TScalarStyle::Plain);
                let value = resolve(&text, quoted, tag.as_ref());
                self.finish(anchor, Node::Scalar(Scalar { text, quoted, value }));
            }
            Event::Alias(id) => {
                let node = self.anchors.get(&id).cloned().unwrap_or_else(Node::null);
                self.finish(0, node);
            }
            Event::SequenceStart(anchor, _) => self.stack.push(Frame::Sequence {
                anchor,
                items: Vec::new(),
            }),
            Event::MappingStart(anchor, _) => self.stack.push(Frame::Mapping {
                anchor,
                entries: Vec::new(),
                key: None,
            }),
            Event::SequenceEnd { .. } | Event::MappingEnd { .. } => match self.stack.pop() {
                Some(Frame::Sequence { anchor, items }) => self.finish(anchor, Node::Sequence(items)),
                Some(Frame::Mapping { anchor, entries, .. }) => {
                    self.finish(anchor, Node::Mapping(entries))
                }
                None => {}
            },
            _ => {}
        }
    }
}

/// Resolves a scalar the way the config codec would read it
fn resolve(text: &str, quoted: bool, tag: Option<&Tag>) -> Value {
    let core_tag = tag
        .filter(|t| t.handle == "!!" || t.handle.starts_with("tag:yaml.org,2002:"))
        .map(|t| t.suffix.as_str());

    if core_tag == Some("str") {
        return Value::String(text.to_string());
    }
    if core_tag.is_none() && quoted {
        return Value::String(text.to_string());
    }
    if text.is_empty() {
        return Value::Null;
    }

    match serde_yaml::from_str::<Value>(text) {
        Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(text.to_string()),
    }
}
