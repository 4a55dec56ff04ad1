//! Rendering of query results back to text

use serde_yaml::Value;

use super::node::{Node, Scalar};
use crate::format::EncodeError;

const INDENT: &str = "  ";

/// Renders query results, each tagged with the index of the document it
/// came from.
///
/// Scalars are printed bare, exactly as written in the source. Collections
/// are printed as block YAML with two-space indentation, including
/// sequences nested under a key. Results from different documents are
/// separated by `---`. Trailing whitespace is trimmed.
pub(crate) fn render(results: &[(usize, Node)]) -> Result<String, EncodeError> {
    let mut out = String::new();
    let mut last_document = None;

    for (document, node) in results {
        if last_document.is_some_and(|last| last != *document) {
            out.push_str("---\n");
        }
        last_document = Some(*document);

        let text = match node {
            Node::Scalar(scalar) if scalar.text.is_empty() && !scalar.quoted => "null".to_string(),
            Node::Scalar(scalar) => scalar.text.clone(),
            collection => block(collection)?,
        };
        out.push_str(&text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
    }

    out.truncate(out.trim_end().len());
    Ok(out)
}

/// Emits a node as block YAML starting at column zero
fn block(node: &Node) -> Result<String, EncodeError> {
    let mut out = String::new();

    match node {
        Node::Scalar(scalar) => out.push_str(&inline_scalar(scalar)?),
        Node::Sequence(items) if items.is_empty() => out.push_str("[]"),
        Node::Mapping(entries) if entries.is_empty() => out.push_str("{}"),
        Node::Sequence(items) => {
            for item in items {
                nest(&mut out, "- ", INDENT, &block(item)?);
            }
        }
        Node::Mapping(entries) => {
            for (key, value) in entries {
                out.push_str(&key_text(key)?);
                out.push(':');
                match value {
                    Node::Sequence(items) if !items.is_empty() => {
                        out.push('\n');
                        nest(&mut out, INDENT, INDENT, &block(value)?);
                    }
                    Node::Mapping(entries) if !entries.is_empty() => {
                        out.push('\n');
                        nest(&mut out, INDENT, INDENT, &block(value)?);
                    }
                    Node::Scalar(scalar) if scalar.text.is_empty() && !scalar.quoted => {
                        out.push('\n');
                    }
                    _ => nest(&mut out, " ", INDENT, &block(value)?),
                }
            }
        }
    }

    Ok(out)
}

/// Appends `text`, prefixing its first line with `first` and the rest with
/// `rest`
fn nest(out: &mut String, first: &str, rest: &str, text: &str) {
    for (i, line) in text.lines().enumerate() {
        if i == 0 {
            out.push_str(first);
        } else if !line.is_empty() {
            out.push_str(rest);
        }
        out.push_str(line);
        out.push('\n');
    }
}

fn key_text(key: &Node) -> Result<String, EncodeError> {
    match key {
        Node::Scalar(scalar) => inline_scalar(scalar),
        other => Ok(format!("? {}", flow(other)?)),
    }
}

/// A scalar as it appears inside a collection. Plain scalars keep their
/// source text; quoted ones are re-quoted only when needed.
fn inline_scalar(scalar: &Scalar) -> Result<String, EncodeError> {
    if !scalar.quoted {
        return Ok(scalar.text.clone());
    }
    let quoted = serde_yaml::to_string(&Value::String(scalar.text.clone()))?;
    Ok(quoted.trim_end_matches('\n').to_string())
}

fn flow(node: &Node) -> Result<String, EncodeError> {
    Ok(match node {
        Node::Scalar(scalar) => inline_scalar(scalar)?,
        Node::Sequence(items) => {
            let items: Result<Vec<_>, _> = items.iter().map(flow).collect();
            format!("[{}]", items?.join(", "))
        }
        Node::Mapping(entries) => {
            let entries: Result<Vec<_>, EncodeError> = entries
                .iter()
                .map(|(k, v)| Ok(format!("{}: {}", flow(k)?, flow(v)?)))
                .collect();
            format!("{{{}}}", entries?.join(", "))
        }
    })
}
