//! # Value Resolution
//!
//! Follows edges to compute a node's value. Each top-level call keeps a
//! stack of the nodes being evaluated; an edge back onto that stack is not
//! followed and the reference text stands in for its value. This makes
//! evaluation terminate on any graph, cyclic or not.
//!
//! | Raw value | Resolved value |
//! |-----------|----------------|
//! | `REFERENCE` | target's resolved value, else the reference text |
//! | `STRING` | literals with each reference's value spliced in |
//! | `LIST` / `MAP` | container of resolved children |
//! | `UNKNOWN` | the text, unchanged |

use tracing::trace;

use crate::extract::{parse_template, TemplatePart};
use crate::graph::PropertyGraph;
use crate::model::*;

impl PropertyGraph {
    /// The resolved value of a node. Cached until the next mutation.
    pub fn resolve(&self, id: NodeId) -> Value {
        if let Some(value) = self.cache.lock().get(&id) {
            return value.clone();
        }
        let mut stack = Vec::new();
        let value = self.evaluate(id, &mut stack);
        self.cache.lock().insert(id, value.clone());
        value
    }

    fn evaluate(&self, id: NodeId, stack: &mut Vec<NodeId>) -> Value {
        let Some(node) = self.nodes.get(&id) else { return Value::None };
        if !node.declared {
            return Value::None;
        }
        if let Some(projection) = node.projection {
            return self.projected(node, projection, stack);
        }

        stack.push(id);
        let value = match &node.raw {
            RawValue::None => Value::None,
            RawValue::String(s) => self.interpolate(node, s, stack),
            RawValue::Integer(i) => Value::Integer(*i),
            RawValue::Boolean(b) => Value::Boolean(*b),
            RawValue::BigDecimal(d) => Value::BigDecimal(*d),
            RawValue::Reference(r) => match self.edge_target(node, 0) {
                Some(target) if !stack.contains(&target) => self.evaluate(target, stack),
                Some(target) => {
                    trace!(node = %id, target = %target, "reference cycle cut");
                    Value::String(r.text.clone())
                }
                None => Value::String(r.text.clone()),
            },
            RawValue::Unknown(text) => Value::Unknown(text.clone()),
            RawValue::List => Value::List(node.children.iter().map(|&c| self.evaluate(c, stack)).collect()),
            RawValue::Map => Value::Map(
                node.children
                    .iter()
                    .filter_map(|&c| {
                        let name = self.nodes.get(&c)?.name.clone();
                        Some((name, self.evaluate(c, stack)))
                    })
                    .collect(),
            ),
        };
        stack.pop();
        value
    }

    fn interpolate(&self, node: &PropertyNode, template: &str, stack: &mut Vec<NodeId>) -> Value {
        let mut out = String::new();
        let mut nth = 0;
        for part in parse_template(template) {
            match part {
                TemplatePart::Literal(text) => out.push_str(&text),
                TemplatePart::Reference { text, .. } => {
                    match self.edge_target(node, nth) {
                        Some(target) if !stack.contains(&target) => {
                            out.push_str(&self.evaluate(target, stack).to_interpolated_string());
                        }
                        _ => out.push_str(&text),
                    }
                    nth += 1;
                }
            }
        }
        Value::String(out)
    }

    fn projected(&self, node: &PropertyNode, projection: Projection, stack: &mut Vec<NodeId>) -> Value {
        let Owner::Node(parent) = node.owner else { return Value::None };
        if stack.contains(&parent) {
            return Value::None;
        }
        match self.evaluate(parent, stack) {
            Value::String(s) => s
                .split(projection.separator)
                .nth(projection.index)
                .map(|seg| Value::String(seg.to_string()))
                .unwrap_or(Value::None),
            _ => Value::None,
        }
    }

    /// Target of the `nth` outgoing edge of `node`, if bound.
    fn edge_target(&self, node: &PropertyNode, nth: usize) -> Option<NodeId> {
        node.dependencies.get(nth).and_then(|e| self.edges.get(e)).and_then(|e| e.target)
    }

    /// The declared value without following references. References read
    /// as [`Value::Reference`], strings keep their `${...}` text.
    pub fn raw_view(&self, id: NodeId) -> Value {
        let Some(node) = self.nodes.get(&id) else { return Value::None };
        if !node.declared {
            return Value::None;
        }
        if let (Some(projection), Owner::Node(parent)) = (node.projection, node.owner) {
            return match self.nodes.get(&parent).map(|p| &p.raw) {
                Some(RawValue::String(s)) => s
                    .split(projection.separator)
                    .nth(projection.index)
                    .map(|seg| Value::String(seg.to_string()))
                    .unwrap_or(Value::None),
                _ => Value::None,
            };
        }
        match &node.raw {
            RawValue::None => Value::None,
            RawValue::String(s) => Value::String(s.clone()),
            RawValue::Integer(i) => Value::Integer(*i),
            RawValue::Boolean(b) => Value::Boolean(*b),
            RawValue::BigDecimal(d) => Value::BigDecimal(*d),
            RawValue::Reference(r) => Value::Reference(r.clone()),
            RawValue::Unknown(text) => Value::Unknown(text.clone()),
            RawValue::List => Value::List(node.children.iter().map(|&c| self.raw_view(c)).collect()),
            RawValue::Map => Value::Map(
                node.children
                    .iter()
                    .filter_map(|&c| Some((self.nodes.get(&c)?.name.clone(), self.raw_view(c))))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::tree::{properties::parse_properties, Declaration, ElementValue, FileTree};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn load(trees: Vec<FileTree>) -> PropertyGraph {
        PropertyGraph::load(trees, ModelConfig::default()).unwrap()
    }

    fn ext(decls: Vec<Declaration>) -> PropertyGraph {
        load(vec![FileTree::build("build.gradle", vec![Declaration::block("ext", decls)])])
    }

    fn value_of(g: &PropertyGraph, qualified: &str) -> Value {
        let id = g.nodes.keys().copied().find(|&id| g.qualified_name(id) == qualified).unwrap();
        g.resolve(id)
    }

    #[test]
    fn test_interpolation() {
        let g = ext(vec![
            Declaration::property("prop1", "value"),
            Declaration::property("prop2", "${prop1} world!"),
            Declaration::property("prop3", "$prop1 + ${prop1}"),
        ]);
        assert_eq!(value_of(&g, "ext.prop2"), Value::String("value world!".into()));
        assert_eq!(value_of(&g, "ext.prop3"), Value::String("value + value".into()));
    }

    #[test]
    fn test_nested_interpolation() {
        let g = ext(vec![
            Declaration::property("prop1", "abc"),
            Declaration::property("prop2", "${prop1}Value"),
            Declaration::property("prop3", "${prop2} + ${prop2}"),
        ]);
        assert_eq!(value_of(&g, "ext.prop3"), Value::String("abcValue + abcValue".into()));
    }

    #[test]
    fn test_cycles_fall_back_to_text() {
        let g = ext(vec![
            Declaration::property("prop1", ElementValue::expr("prop1")),
            Declaration::property("prop2", "${prop2}"),
            Declaration::property("a", "x${b}"),
            Declaration::property("b", "y${a}"),
        ]);
        assert_eq!(value_of(&g, "ext.prop1"), Value::String("prop1".into()));
        assert_eq!(value_of(&g, "ext.prop2"), Value::String("${prop2}".into()));
        assert_eq!(value_of(&g, "ext.a"), Value::String("xy${a}".into()));
        assert_eq!(value_of(&g, "ext.b"), Value::String("yx${b}".into()));
    }

    #[test]
    fn test_containers_resolve_elements() {
        let g = ext(vec![
            Declaration::property("prop1", ElementValue::list([1, 2, 3])),
            Declaration::property("prop2", ElementValue::expr("prop1[1]")),
            Declaration::property("prop3", ElementValue::map([
                ("key1", ElementValue::expr("prop2")),
                ("key2", ElementValue::from("${prop1}")),
            ])),
        ]);
        assert_eq!(value_of(&g, "ext.prop2"), Value::Integer(2));
        assert_eq!(value_of(&g, "ext.prop3"), Value::Map(vec![
            ("key1".into(), Value::Integer(2)),
            ("key2".into(), Value::String("[1, 2, 3]".into())),
        ]));
    }

    #[test]
    fn test_unknown_and_unresolved() {
        let g = ext(vec![
            Declaration::property("u", ElementValue::expr("1 + 2")),
            Declaration::property("r", ElementValue::expr("nowhere")),
            Declaration::property("s", "${nowhere} else"),
            Declaration::property("d", ElementValue::decimal("2.5")),
        ]);
        assert_eq!(value_of(&g, "ext.u"), Value::Unknown("1 + 2".into()));
        assert_eq!(value_of(&g, "ext.r"), Value::String("nowhere".into()));
        assert_eq!(value_of(&g, "ext.s"), Value::String("${nowhere} else".into()));
        assert_eq!(value_of(&g, "ext.d"), Value::BigDecimal(Decimal::new(25, 1)));
    }

    #[test]
    fn test_cross_file_resolution() {
        let g = load(vec![
            FileTree::build("build.gradle", vec![Declaration::property("greeting", "hello ${animal}")])
                .with_properties("gradle.properties"),
            parse_properties("gradle.properties", "animal = lion"),
        ]);
        assert_eq!(value_of(&g, "greeting"), Value::String("hello lion".into()));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let g = ext(vec![
            Declaration::property("a", ElementValue::list(["${b}", "x"])),
            Declaration::property("b", "${a}"),
        ]);
        let first = value_of(&g, "ext.a");
        let second = value_of(&g, "ext.a");
        assert_eq!(first, second);
        // `b` sees `a` on the stack, so it contributes its own text.
        assert_eq!(first, Value::List(vec![Value::String("${a}".into()), Value::String("x".into())]));
    }

    #[test]
    fn test_raw_view_is_shallow() {
        let g = ext(vec![
            Declaration::property("prop1", "value"),
            Declaration::property("prop2", ElementValue::expr("prop1")),
            Declaration::property("prop3", ElementValue::list([ElementValue::expr("prop1")])),
        ]);
        let id = |q: &str| g.nodes.keys().copied().find(|&id| g.qualified_name(id) == q).unwrap();
        assert_eq!(g.raw_view(id("ext.prop2")), Value::Reference(ReferenceTo::new("prop1")));
        assert_eq!(g.raw_view(id("ext.prop3")), Value::List(vec![Value::Reference(ReferenceTo::new("prop1"))]));
    }
}
