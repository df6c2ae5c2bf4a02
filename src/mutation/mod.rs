//! # Mutation Engine
//!
//! Every write goes through here. After each one the engine rebinds
//! dangling edges that a new declaration can satisfy, renumbers the file,
//! reorders declarations (when enabled) and clears the value cache.
//! Dependents are never rewritten and pick up new values lazily. The one
//! exception is an edge whose path ran through a reference that changed
//! (`alias.k` after `alias` is set): it is unbound and resolved again.

pub mod order;

use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::export;
use crate::extract::{normalize_decimal, reference_path};
use crate::graph::PropertyGraph;
use crate::model::*;
use crate::resolve::{is_identifier, parse_path};
use crate::tree::ElementValue;
use crate::{Error, Result};

// ============================================================================
// Input values
// ============================================================================

/// Values accepted by setters. Conversion fails for values the model
/// cannot represent.
pub trait IntoElementValue {
    fn into_element_value(self) -> Result<ElementValue>;
}

impl IntoElementValue for ElementValue {
    fn into_element_value(self) -> Result<ElementValue> { Ok(self) }
}

impl IntoElementValue for &str {
    fn into_element_value(self) -> Result<ElementValue> { Ok(ElementValue::String(self.to_owned())) }
}

impl IntoElementValue for String {
    fn into_element_value(self) -> Result<ElementValue> { Ok(ElementValue::String(self)) }
}

impl IntoElementValue for i32 {
    fn into_element_value(self) -> Result<ElementValue> { Ok(ElementValue::Integer(self as i64)) }
}

impl IntoElementValue for i64 {
    fn into_element_value(self) -> Result<ElementValue> { Ok(ElementValue::Integer(self)) }
}

impl IntoElementValue for bool {
    fn into_element_value(self) -> Result<ElementValue> { Ok(ElementValue::Boolean(self)) }
}

impl IntoElementValue for Decimal {
    fn into_element_value(self) -> Result<ElementValue> {
        Ok(match normalize_decimal(self) {
            RawValue::Integer(i) => ElementValue::Integer(i),
            _ => ElementValue::Decimal(self.to_string()),
        })
    }
}

impl IntoElementValue for f64 {
    fn into_element_value(self) -> Result<ElementValue> {
        if !self.is_finite() {
            return Err(Error::IllegalArgument(format!("{self} cannot be stored as a number")));
        }
        Decimal::try_from(self)
            .map_err(|e| Error::IllegalArgument(format!("{self}: {e}")))?
            .into_element_value()
    }
}

impl IntoElementValue for ReferenceTo {
    fn into_element_value(self) -> Result<ElementValue> {
        match reference_path(&self.text) {
            Some(_) => Ok(ElementValue::Expression(self.text)),
            None => Err(Error::IllegalArgument(format!("'{}' is not a reference path", self.text))),
        }
    }
}

impl<T: IntoElementValue> IntoElementValue for Vec<T> {
    fn into_element_value(self) -> Result<ElementValue> {
        Ok(ElementValue::List(self.into_iter().map(IntoElementValue::into_element_value).collect::<Result<_>>()?))
    }
}

// ============================================================================
// Mutations
// ============================================================================

impl PropertyGraph {
    fn writable(&self, id: NodeId) -> Result<&PropertyNode> {
        let node = self.nodes.get(&id).ok_or_else(|| Error::NotFound(format!("property {id}")))?;
        if node.property_type == PropertyType::PropertiesFile {
            return Err(Error::IllegalState(format!("'{}' is a properties file entry and is read-only", node.name)));
        }
        Ok(node)
    }

    fn after_mutation(&mut self, file: FileId) {
        self.relink_until_stable(false);
        self.renumber(file);
        if self.config.auto_reorder {
            order::reorder_file(self, file);
        }
        self.invalidate();
    }

    /// Replace a node's value. Placeholders become declarations; a deleted
    /// map entry is put back at the end of its map.
    pub fn set_value(&mut self, id: NodeId, value: ElementValue) -> Result<()> {
        let node = self.writable(id)?;
        let (file, owner, declared, positional) = (node.file, node.owner, node.declared, node.positional);
        if node.projection.is_some() {
            return self.set_projection(id, value);
        }
        if positional && !declared {
            return Err(Error::IllegalState(format!("list element {} was deleted", self.qualified_name(id))));
        }
        if let (Owner::Node(parent), false) = (owner, declared) {
            self.reattach_entry(id, parent)?;
        }

        debug!(node = %id, name = %self.qualified_name(id), "set value");
        self.remove_edges_from(id);
        self.detach_passing(id);
        self.drop_children(id, false);
        self.assign_value(id, &value);
        self.link_subtree(id);
        self.refresh_projections(id);
        self.after_mutation(file);
        Ok(())
    }

    fn reattach_entry(&mut self, id: NodeId, parent: NodeId) -> Result<()> {
        let parent_node = self.nodes.get_mut(&parent).ok_or_else(|| Error::NotFound(format!("property {parent}")))?;
        if !parent_node.declared || parent_node.raw != RawValue::Map {
            return Err(Error::IllegalState(format!("'{}' is no longer a map", parent_node.name)));
        }
        if !parent_node.children.contains(&id) {
            parent_node.children.push(id);
        }
        Ok(())
    }

    /// Rename a declaration or map key. References to it keep pointing at
    /// it; their text is not rewritten.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<()> {
        let node = self.writable(id)?;
        if node.positional {
            return Err(Error::UnsupportedOperation(format!("cannot rename list element {}", self.qualified_name(id))));
        }
        if node.projection.is_some() {
            return Err(Error::UnsupportedOperation("cannot rename a projection".into()));
        }
        if node.name == new_name {
            return Ok(());
        }
        let taken = match node.owner {
            Owner::Block(block) => {
                if !is_identifier(new_name) {
                    return Err(Error::IllegalArgument(format!("'{new_name}' is not a valid name")));
                }
                self.find_member(block, new_name, 0, false).is_some()
            }
            Owner::Node(parent) => {
                if new_name.is_empty() {
                    return Err(Error::IllegalArgument("map keys cannot be empty".into()));
                }
                self.nodes.get(&parent).is_some_and(|p| {
                    p.children.iter().any(|c| self.nodes.get(c).is_some_and(|n| n.declared && n.name == new_name))
                })
            }
        };
        if taken {
            return Err(Error::IllegalState(format!("'{new_name}' is already declared here")));
        }

        let file = node.file;
        debug!(node = %id, from = %node.name, to = %new_name, "rename");
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name = new_name.to_string();
        }
        self.after_mutation(file);
        Ok(())
    }

    /// Remove a declaration. Its outgoing edges go away; incoming edges
    /// dangle and rebind by name where something else now matches. Edges
    /// that addressed a deleted list element by index stay unbound until
    /// [`apply_changes`](Self::apply_changes).
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        let node = self.writable(id)?;
        let (file, owner, declared, positional) = (node.file, node.owner, node.declared, node.positional);
        if !declared {
            return Ok(());
        }
        if node.projection.is_some() {
            return self.delete_projection(id);
        }

        debug!(node = %id, name = %self.qualified_name(id), "delete");
        self.remove_edges_from(id);
        self.drop_children(id, positional);
        self.detach_incoming(id, positional);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.declared = false;
            node.raw = RawValue::None;
        }
        if let Owner::Node(parent) = owner {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|&c| c != id);
            }
            self.reindex_children(parent);
        }
        self.refresh_projections(id);
        self.after_mutation(file);
        Ok(())
    }

    /// Move a block member to `index` among its siblings. Reordering may
    /// still move it again if the new position breaks a dependency.
    pub fn move_to(&mut self, id: NodeId, index: usize) -> Result<()> {
        let node = self.writable(id)?;
        let Owner::Block(block) = node.owner else {
            return Err(Error::UnsupportedOperation(format!("{} is not a declaration", self.qualified_name(id))));
        };
        let file = node.file;
        let members = &mut self.blocks.get_mut(&block).ok_or_else(|| Error::NotFound(format!("block {}", block.0)))?.members;
        let len = members.len();
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        if let Some(pos) = members.iter().position(|&m| m == Member::Node(id)) {
            let member = members.remove(pos);
            members.insert(index, member);
        }
        debug!(node = %id, index, "move");
        self.after_mutation(file);
        Ok(())
    }

    // ========================================================================
    // Lists and maps
    // ========================================================================

    /// Make sure a node is a list (or map), converting it when empty.
    fn ensure_container(&mut self, id: NodeId, list: bool) -> Result<()> {
        let node = self.writable(id)?;
        let wanted = if list { RawValue::List } else { RawValue::Map };
        if node.declared && node.raw == wanted {
            return Ok(());
        }
        if node.declared && !node.raw.is_none() {
            let kind = if list { "list" } else { "map" };
            return Err(Error::IllegalState(format!(
                "{} holds a {} value, not a {kind}",
                self.qualified_name(id),
                node.value_type()
            )));
        }
        self.set_value(id, if list { ElementValue::List(Vec::new()) } else { ElementValue::Map(Vec::new()) })
    }

    pub fn convert_to_empty_list(&mut self, id: NodeId) -> Result<()> {
        self.set_value(id, ElementValue::List(Vec::new()))
    }

    pub fn convert_to_empty_map(&mut self, id: NodeId) -> Result<()> {
        self.set_value(id, ElementValue::Map(Vec::new()))
    }

    /// Append a list element. An empty node becomes a list first.
    pub fn add_list_value(&mut self, id: NodeId, value: ElementValue) -> Result<NodeId> {
        self.ensure_container(id, true)?;
        let len = self.nodes.get(&id).map_or(0, |n| n.children.len());
        self.add_list_value_at(id, len, value)
    }

    /// Insert a list element at `index`, shifting later elements.
    pub fn add_list_value_at(&mut self, id: NodeId, index: usize, value: ElementValue) -> Result<NodeId> {
        self.ensure_container(id, true)?;
        let (file, len) = match self.nodes.get(&id) {
            Some(node) => (node.file, node.children.len()),
            None => return Err(Error::NotFound(format!("property {id}"))),
        };
        if index > len {
            return Err(Error::IndexOutOfBounds { index, len });
        }

        let child = self.alloc_node(&index.to_string(), PropertyType::Derived, file, Owner::Node(id));
        if let Some(c) = self.nodes.get_mut(&child) {
            c.positional = true;
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children.insert(index, child);
        }
        self.reindex_children(id);
        self.assign_value(child, &value);
        self.link_subtree(child);
        debug!(node = %id, index, "add list value");
        self.after_mutation(file);
        Ok(child)
    }

    /// The entry of a map under `key`. A missing entry comes back as an
    /// undeclared placeholder that setting a value adds to the map.
    pub fn map_value(&mut self, id: NodeId, key: &str) -> Result<NodeId> {
        self.ensure_container(id, false)?;
        let Some(node) = self.nodes.get(&id) else {
            return Err(Error::NotFound(format!("property {id}")));
        };
        let declared = node
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == key));
        if let Some(found) = declared {
            return Ok(found);
        }
        let mut placeholders: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.owner == Owner::Node(id) && !n.declared && !n.positional && n.projection.is_none() && n.name == key)
            .map(|n| n.id)
            .collect();
        placeholders.sort();
        if let Some(&found) = placeholders.first() {
            return Ok(found);
        }
        let file = node.file;
        Ok(self.alloc_node(key, PropertyType::Derived, file, Owner::Node(id)))
    }

    /// The list element whose raw value reads as `text`.
    pub fn list_value(&self, id: NodeId, text: &str) -> Option<NodeId> {
        let node = self.nodes.get(&id).filter(|n| n.raw == RawValue::List)?;
        node.children.iter().copied().find(|&c| match self.raw_view(c) {
            Value::List(_) | Value::Map(_) | Value::None => false,
            scalar => scalar.to_interpolated_string() == text,
        })
    }

    // ========================================================================
    // Lookup by path
    // ========================================================================

    /// The node `path` names inside `block`, declared or not. Missing
    /// blocks, declarations and map entries along the way come into
    /// existence as placeholders, so the result can be set later.
    /// Properties files are keyed by the whole dotted text.
    pub fn find_property(&mut self, block: BlockId, path: &str) -> Result<NodeId> {
        let file = self.blocks.get(&block).map(|b| b.file).ok_or_else(|| Error::NotFound(format!("block {}", block.0)))?;
        let kind = self.file(file).map(|f| f.kind).ok_or_else(|| Error::NotFound(format!("file {}", file.0)))?;

        if kind == FileKind::Properties {
            if let Some(Member::Node(id)) = self.find_member(block, path, 0, true) {
                return Ok(id);
            }
            return Ok(self.declare_placeholder(block, path, PropertyType::PropertiesFile));
        }

        let expression = parse_path(path)?;
        if let Some(id) = self.lookup_in_block(block, &expression.segments, true) {
            return Ok(id);
        }

        let segments = &expression.segments;
        let Some((last, init)) = segments.split_last() else {
            return Err(Error::IllegalArgument("empty path".into()));
        };
        let mut current = block;
        for (i, seg) in init.iter().enumerate() {
            let Segment::Name { name, ordinal } = seg else {
                return Err(Error::IllegalArgument(format!("'{path}' indexes into a block")));
            };
            match self.find_member(current, name, ordinal.unwrap_or(0), true) {
                Some(Member::Block(b)) => current = b,
                Some(Member::Node(id)) => return self.find_entry(id, &segments[i + 1..]),
                None if ordinal.unwrap_or(0) > 0 => {
                    return Err(Error::NotFound(format!("{name}({}) in '{path}'", ordinal.unwrap_or(0))));
                }
                None => {
                    let child = self.alloc_block(name, file, Some(current));
                    if let Some(b) = self.blocks.get_mut(&current) {
                        b.members.push(Member::Block(child));
                    }
                    current = child;
                }
            }
        }

        match last {
            Segment::Name { name, ordinal: None | Some(0) } => {
                let id = self.declare_placeholder(current, name, PropertyType::Regular);
                trace!(node = %id, path, "placeholder");
                Ok(id)
            }
            Segment::Name { name, ordinal: Some(n) } => Err(Error::NotFound(format!("{name}({n}) in '{path}'"))),
            _ => Err(Error::IllegalArgument(format!("'{path}' indexes into a block"))),
        }
    }

    /// The block at dotted `path` below `from`, created when missing.
    pub fn find_block(&mut self, from: BlockId, path: &str) -> Result<BlockId> {
        let file = self.blocks.get(&from).map(|b| b.file).ok_or_else(|| Error::NotFound(format!("block {}", from.0)))?;
        let mut current = from;
        for name in path.split('.').filter(|s| !s.is_empty()) {
            if !is_identifier(name) {
                return Err(Error::IllegalArgument(format!("'{name}' is not a valid block name")));
            }
            current = match self.find_member(current, name, 0, true) {
                Some(Member::Block(b)) => b,
                Some(Member::Node(_)) => {
                    return Err(Error::IllegalState(format!("'{name}' is a property, not a block")));
                }
                None => {
                    let child = self.alloc_block(name, file, Some(current));
                    if let Some(b) = self.blocks.get_mut(&current) {
                        b.members.push(Member::Block(child));
                    }
                    child
                }
            };
        }
        Ok(current)
    }

    fn declare_placeholder(&mut self, block: BlockId, name: &str, property_type: PropertyType) -> NodeId {
        let file = self.blocks.get(&block).map_or(FileId(0), |b| b.file);
        let id = self.alloc_node(name, property_type, file, Owner::Block(block));
        if let Some(b) = self.blocks.get_mut(&block) {
            b.members.push(Member::Node(id));
        }
        self.renumber(file);
        id
    }

    /// Walk list indices and map keys below a declared node.
    fn find_entry(&mut self, id: NodeId, segments: &[Segment]) -> Result<NodeId> {
        let mut current = id;
        for seg in segments {
            current = match seg {
                Segment::Index(index) => {
                    let node = self.nodes.get(&current).ok_or_else(|| Error::NotFound(format!("property {current}")))?;
                    if node.raw != RawValue::List {
                        return Err(Error::IllegalState(format!("{} is not a list", self.qualified_name(current))));
                    }
                    let len = node.children.len();
                    *node.children.get(*index).ok_or(Error::IndexOutOfBounds { index: *index, len })?
                }
                other => {
                    let key = other.as_key().ok_or_else(|| Error::IllegalArgument(format!("bad segment {other:?}")))?;
                    let key = key.to_string();
                    self.map_value(current, &key)?
                }
            };
        }
        Ok(current)
    }

    // ========================================================================
    // Projections
    // ========================================================================

    /// A synthetic node for segment `index` of the `separator`-split string
    /// value of `id`, e.g. the version of `group:name:version`.
    pub fn projection(&mut self, id: NodeId, name: &str, separator: char, index: usize) -> Result<NodeId> {
        let node = self.nodes.get(&id).ok_or_else(|| Error::NotFound(format!("property {id}")))?;
        if node.projection.is_some() {
            return Err(Error::UnsupportedOperation("projections cannot be nested".into()));
        }
        let existing = node.projections.iter().copied().find(|f| self.nodes.get(f).is_some_and(|n| n.name == name));
        if let Some(found) = existing {
            return Ok(found);
        }
        let file = node.file;
        let fake = self.alloc_node(name, PropertyType::Fake, file, Owner::Node(id));
        if let Some(f) = self.nodes.get_mut(&fake) {
            f.projection = Some(Projection { separator, index });
        }
        if let Some(n) = self.nodes.get_mut(&id) {
            n.projections.push(fake);
        }
        self.refresh_projections(id);
        let baseline = self.current_state(fake);
        if let Some(f) = self.nodes.get_mut(&fake) {
            f.baseline = baseline;
        }
        self.renumber(file);
        Ok(fake)
    }

    fn segments_of(&self, id: NodeId) -> Result<(Vec<String>, Projection, NodeId)> {
        let node = self.nodes.get(&id).ok_or_else(|| Error::NotFound(format!("property {id}")))?;
        let (Some(projection), Owner::Node(parent)) = (node.projection, node.owner) else {
            return Err(Error::IllegalState(format!("{id} is not a projection")));
        };
        let parts = match self.nodes.get(&parent) {
            Some(p) if !p.declared => Vec::new(),
            Some(p) => match &p.raw {
                RawValue::String(s) => s.split(projection.separator).map(str::to_owned).collect(),
                RawValue::None => Vec::new(),
                other => {
                    return Err(Error::IllegalState(format!(
                        "cannot project into a {} value",
                        other.value_type()
                    )))
                }
            },
            None => return Err(Error::NotFound(format!("property {parent}"))),
        };
        Ok((parts, projection, parent))
    }

    fn set_projection(&mut self, id: NodeId, value: ElementValue) -> Result<()> {
        let text = match value {
            ElementValue::String(s) | ElementValue::Decimal(s) | ElementValue::Expression(s) => s,
            ElementValue::Integer(i) => i.to_string(),
            ElementValue::Boolean(b) => b.to_string(),
            ElementValue::None | ElementValue::List(_) | ElementValue::Map(_) => {
                return Err(Error::IllegalArgument("a projection holds a single segment of text".into()));
            }
        };
        let declared = self.nodes.get(&id).is_some_and(|n| n.declared);
        let (mut parts, projection, parent) = self.segments_of(id)?;
        let len = parts.len();
        if declared && projection.index < len {
            parts[projection.index] = text;
        } else if projection.index <= len {
            parts.insert(projection.index, text);
        } else {
            return Err(Error::IndexOutOfBounds { index: projection.index, len });
        }
        let joined = parts.join(&projection.separator.to_string());
        self.set_value(parent, ElementValue::String(joined))
    }

    fn delete_projection(&mut self, id: NodeId) -> Result<()> {
        let (mut parts, projection, parent) = self.segments_of(id)?;
        if projection.index >= parts.len() {
            return Ok(());
        }
        parts.remove(projection.index);
        let joined = parts.join(&projection.separator.to_string());
        self.set_value(parent, ElementValue::String(joined))
    }

    /// A projection exists while its segment does.
    fn refresh_projections(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else { return };
        let text = match (&node.raw, node.declared) {
            (RawValue::String(s), true) => Some(s.clone()),
            _ => None,
        };
        for fake in node.projections.clone() {
            if let Some(f) = self.nodes.get_mut(&fake) {
                f.declared = match (&text, f.projection) {
                    (Some(s), Some(p)) => s.split(p.separator).count() > p.index,
                    _ => false,
                };
            }
        }
    }

    // ========================================================================
    // Modified state
    // ========================================================================

    pub(crate) fn current_state(&self, id: NodeId) -> Baseline {
        match self.nodes.get(&id) {
            Some(node) => Baseline {
                name: node.name.clone(),
                declared: node.declared,
                text: if node.declared { export::value_text(self, id) } else { String::new() },
            },
            None => Baseline { name: String::new(), declared: false, text: String::new() },
        }
    }

    /// True when name, presence or declared text differ from the last
    /// load or apply. A change in a referenced value does not count.
    pub fn is_modified(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.baseline != self.current_state(id))
    }

    pub(crate) fn capture_baselines(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            let baseline = self.current_state(id);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.baseline = baseline;
            }
        }
    }

    /// The apply boundary: rebind every dangling edge, orphaned ones
    /// included, and make the current state the new baseline.
    pub fn apply_changes(&mut self) {
        self.relink_until_stable(true);
        let files: Vec<FileId> = self.files.iter().map(|f| f.id).collect();
        for file in files {
            self.renumber(file);
        }
        self.capture_baselines();
        self.invalidate();
        debug!(nodes = self.nodes.len(), edges = self.edges.len(), "changes applied");
    }
}
