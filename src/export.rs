//! Export — render a file back to DSL text, or snapshot its resolved
//! values as JSON.
//!
//! ```text
//! PropertyGraph → write_file() → def v = 1
//!                                ext {
//!                                  prop1 = 'value'
//!                                }
//! PropertyGraph → snapshot()   → {"ext.prop1": "value", ...}
//! ```

use std::io::Write;

use serde_json::json;

use crate::extract::has_interpolation;
use crate::graph::PropertyGraph;
use crate::model::*;
use crate::resolve::is_identifier;
use crate::Result;

const INDENT: &str = "  ";

/// Canonical DSL text of a node's declared value, containers included.
pub(crate) fn value_text(graph: &PropertyGraph, id: NodeId) -> String {
    let Some(node) = graph.node(id) else { return String::new() };
    if node.projection.is_some() {
        return match graph.raw_view(id) {
            Value::String(s) => quote(&s),
            _ => "null".to_string(),
        };
    }
    match &node.raw {
        RawValue::None => "null".to_string(),
        RawValue::String(s) => quote(s),
        RawValue::Integer(i) => i.to_string(),
        RawValue::Boolean(b) => b.to_string(),
        RawValue::BigDecimal(d) => d.to_string(),
        RawValue::Reference(r) => r.text.clone(),
        RawValue::Unknown(text) => text.clone(),
        RawValue::List => {
            let items: Vec<String> = node.children.iter().map(|&c| value_text(graph, c)).collect();
            format!("[{}]", items.join(", "))
        }
        RawValue::Map => {
            if node.children.is_empty() {
                return "[:]".to_string();
            }
            let entries: Vec<String> = node
                .children
                .iter()
                .filter_map(|&c| {
                    let key = &graph.node(c)?.name;
                    Some(format!("{}: {}", map_key(key), value_text(graph, c)))
                })
                .collect();
            format!("[{}]", entries.join(", "))
        }
    }
}

/// Single quotes for plain text, double quotes when the string
/// interpolates.
fn quote(s: &str) -> String {
    if has_interpolation(s) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        format!("'{}'", s.replace('\'', "\\'"))
    }
}

fn map_key(key: &str) -> String {
    if is_identifier(key) { key.to_string() } else { quote(key) }
}

/// Write a file's declarations as DSL text, in serialized order.
///
/// Placeholders and deleted declarations are skipped, and so are blocks
/// left with nothing to write. Properties files come out as `key=value`
/// lines.
pub fn write_file(graph: &PropertyGraph, file: FileId, writer: &mut dyn Write) -> Result<()> {
    let Some(scope) = graph.file(file) else { return Ok(()) };
    match scope.kind {
        FileKind::Properties => write_properties(graph, scope.root, writer),
        FileKind::Build => write_block(graph, scope.root, 0, writer),
    }
}

fn write_properties(graph: &PropertyGraph, root: BlockId, writer: &mut dyn Write) -> Result<()> {
    let Some(block) = graph.block(root) else { return Ok(()) };
    for &member in &block.members {
        let Member::Node(id) = member else { continue };
        let Some(node) = graph.node(id).filter(|n| n.declared) else { continue };
        let value = match &node.raw {
            RawValue::String(s) => s.replace('\\', "\\\\").replace('\n', "\\n"),
            _ => value_text(graph, id),
        };
        writeln!(writer, "{}={}", node.name.replace('=', "\\="), value)?;
    }
    Ok(())
}

fn write_block(graph: &PropertyGraph, block: BlockId, depth: usize, writer: &mut dyn Write) -> Result<()> {
    let Some(blk) = graph.block(block) else { return Ok(()) };
    let pad = INDENT.repeat(depth);
    for &member in &blk.members {
        match member {
            Member::Node(id) => {
                let Some(node) = graph.node(id).filter(|n| n.declared) else { continue };
                let keyword = if node.property_type == PropertyType::Variable { "def " } else { "" };
                writeln!(writer, "{pad}{keyword}{} = {}", node.name, value_text(graph, id))?;
            }
            Member::Block(child) => {
                if !has_content(graph, child) {
                    continue;
                }
                let name = graph.block(child).map(|b| b.name.as_str()).unwrap_or_default();
                writeln!(writer, "{pad}{name} {{")?;
                write_block(graph, child, depth + 1, writer)?;
                writeln!(writer, "{pad}}}")?;
            }
        }
    }
    Ok(())
}

/// True when a block holds a declaration somewhere below it.
fn has_content(graph: &PropertyGraph, block: BlockId) -> bool {
    graph.block(block).is_some_and(|b| {
        b.members.iter().any(|&m| match m {
            Member::Node(id) => graph.node(id).is_some_and(|n| n.declared),
            Member::Block(child) => has_content(graph, child),
        })
    })
}

/// Render a file to a `String`.
pub fn file_text(graph: &PropertyGraph, file: FileId) -> Result<String> {
    let mut buf = Vec::new();
    write_file(graph, file, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Resolved values of every top-level declaration of a file, keyed by
/// qualified name.
pub fn snapshot(graph: &PropertyGraph, file: FileId) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    for id in graph.preorder(file) {
        let Some(node) = graph.node(id) else { continue };
        if !node.declared || !matches!(node.owner, Owner::Block(_)) {
            continue;
        }
        properties.insert(graph.qualified_name(id), to_json(&graph.resolve(id)));
    }
    let name = graph.file(file).map(|f| f.name.clone()).unwrap_or_default();
    json!({ "file": name, "properties": properties })
}

/// Plain JSON for a value. Decimals stay strings to keep their scale.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::None => serde_json::Value::Null,
        Value::String(s) | Value::Unknown(s) => json!(s),
        Value::Integer(i) => json!(i),
        Value::Boolean(b) => json!(b),
        Value::BigDecimal(d) => json!(d.to_string()),
        Value::Reference(r) => json!(r.text),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                map.entry(k.clone()).or_insert_with(|| to_json(v));
            }
            serde_json::Value::Object(map)
        }
    }
}
