//! # Dependency Graph
//!
//! A flat arena of property nodes, blocks, files and edges, all keyed by
//! stable ids. Every edge id sits in its origin's `dependencies` list and,
//! while resolved, in its target's `dependents` set. Nothing holds a
//! pointer to anything else, so cycles between properties are just ids.
//!
//! ## Limitations
//!
//! - **Resolved edges are sticky**: an edge that resolved keeps its target
//!   until that target is deleted, or until a reference its path went
//!   through changes. A newer declaration that would shadow it is not
//!   picked up.
//! - **Whole-cache invalidation**: any mutation clears every cached value.

pub mod load;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::config::ModelConfig;
use crate::extract;
use crate::model::*;
use crate::resolve::is_identifier;
use crate::tree::ElementValue;

/// The shared arena behind every handle of a project.
pub struct PropertyGraph {
    pub(crate) config: ModelConfig,
    pub(crate) files: Vec<FileScope>,
    pub(crate) blocks: HashMap<BlockId, Block>,
    pub(crate) nodes: HashMap<NodeId, PropertyNode>,
    pub(crate) edges: HashMap<EdgeId, DependencyEdge>,
    /// Resolved values of nodes queried directly. Cleared on every mutation.
    pub(crate) cache: Mutex<HashMap<NodeId, Value>>,
    next_node_id: u64,
    next_block_id: u64,
    next_edge_id: u64,
}

impl PropertyGraph {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            blocks: HashMap::new(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
            next_node_id: 1,
            next_block_id: 1,
            next_edge_id: 1,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn node(&self, id: NodeId) -> Option<&PropertyNode> {
        self.nodes.get(&id)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&DependencyEdge> {
        self.edges.get(&id)
    }

    pub fn file(&self, id: FileId) -> Option<&FileScope> {
        self.files.get(id.0 as usize)
    }

    pub fn file_by_name(&self, name: &str) -> Option<FileId> {
        self.files.iter().find(|f| f.name == name).map(|f| f.id)
    }

    pub fn files(&self) -> &[FileScope] {
        &self.files
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn member_name(&self, member: Member) -> Option<&str> {
        match member {
            Member::Node(id) => self.nodes.get(&id).map(|n| n.name.as_str()),
            Member::Block(id) => self.blocks.get(&id).map(|b| b.name.as_str()),
        }
    }

    /// Members that take part in lookup: blocks and declared nodes.
    pub(crate) fn member_visible(&self, member: Member) -> bool {
        match member {
            Member::Node(id) => self.nodes.get(&id).is_some_and(|n| n.declared),
            Member::Block(id) => self.blocks.contains_key(&id),
        }
    }

    /// Named child block of `block`, e.g. its `ext`.
    pub(crate) fn child_block(&self, block: BlockId, name: &str) -> Option<BlockId> {
        self.blocks.get(&block)?.members.iter().find_map(|m| match *m {
            Member::Block(b) if self.blocks.get(&b).is_some_and(|blk| blk.name == name) => Some(b),
            _ => None,
        })
    }

    /// The block a node's declaration lives in, walking up from derived
    /// and fake nodes.
    pub(crate) fn scope_block(&self, id: NodeId) -> Option<BlockId> {
        self.top_member(id).map(|(block, _)| block)
    }

    /// The block member a node belongs to, plus its block.
    pub(crate) fn top_member(&self, id: NodeId) -> Option<(BlockId, NodeId)> {
        let mut current = id;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(&current)?.owner {
                Owner::Block(b) => return Some((b, current)),
                Owner::Node(parent) => current = parent,
            }
        }
        None
    }

    /// True when `ancestor` contains `id` as list element, map entry or
    /// projection, at any depth.
    pub(crate) fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = id;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(&current).map(|n| n.owner) {
                Some(Owner::Node(parent)) if parent == ancestor => return true,
                Some(Owner::Node(parent)) => current = parent,
                _ => return false,
            }
        }
        false
    }

    /// A node followed by all its descendants, in preorder.
    pub(crate) fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_subtree(id, &mut out);
        out
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get(&id) else { return };
        out.push(id);
        for &child in &node.children {
            self.collect_subtree(child, out);
        }
    }

    /// Every node of a file in preorder: block members in order, each node
    /// followed by its children and then its projections.
    pub fn preorder(&self, file: FileId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(scope) = self.file(file) {
            let mut counter = 0;
            self.walk_block(scope.root, &mut counter, &mut out);
        }
        out.into_iter().map(|(id, _)| id).collect()
    }

    fn walk_block(&self, block: BlockId, counter: &mut usize, out: &mut Vec<(NodeId, usize)>) {
        let Some(blk) = self.blocks.get(&block) else { return };
        for &member in &blk.members {
            match member {
                Member::Node(id) => self.walk_node(id, counter, out),
                Member::Block(b) => {
                    *counter += 1;
                    self.walk_block(b, counter, out);
                }
            }
        }
    }

    fn walk_node(&self, id: NodeId, counter: &mut usize, out: &mut Vec<(NodeId, usize)>) {
        let Some(node) = self.nodes.get(&id) else { return };
        out.push((id, *counter));
        *counter += 1;
        for &child in &node.children {
            self.walk_node(child, counter, out);
        }
        for &fake in &node.projections {
            self.walk_node(fake, counter, out);
        }
    }

    /// Reassign `source_order_index` over a file after structural changes.
    pub(crate) fn renumber(&mut self, file: FileId) {
        let Some(root) = self.file(file).map(|f| f.root) else { return };
        let mut counter = 0;
        let mut order = Vec::new();
        self.walk_block(root, &mut counter, &mut order);
        for (id, index) in order {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.source_order_index = index;
            }
        }
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    pub(crate) fn add_file(&mut self, name: impl Into<String>, kind: FileKind) -> FileId {
        let id = FileId(self.files.len() as u32);
        let root = self.alloc_block("", id, None);
        self.files.push(FileScope {
            id,
            name: name.into(),
            kind,
            root,
            applied: Vec::new(),
            parent: None,
            properties: None,
            notifications: Vec::new(),
        });
        id
    }

    /// New block. The caller appends it to the parent's members.
    pub(crate) fn alloc_block(&mut self, name: &str, file: FileId, parent: Option<BlockId>) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.insert(id, Block { id, name: name.to_string(), file, parent, members: Vec::new() });
        id
    }

    /// New undeclared node. The caller links it into its owner.
    pub(crate) fn alloc_node(&mut self, name: &str, property_type: PropertyType, file: FileId, owner: Owner) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.insert(id, PropertyNode::new(id, name, property_type, file, owner));
        id
    }

    /// Store a declared value on `id`, creating derived children for list
    /// elements and map entries. Does not touch edges.
    pub(crate) fn assign_value(&mut self, id: NodeId, value: &ElementValue) {
        let raw = extract::classify(value);
        let Some(node) = self.nodes.get_mut(&id) else { return };
        node.raw = raw;
        node.declared = true;
        let file = node.file;

        let entries: Vec<(String, bool, &ElementValue)> = match value {
            ElementValue::List(items) => items.iter().enumerate().map(|(i, v)| (i.to_string(), true, v)).collect(),
            ElementValue::Map(entries) => entries.iter().map(|(k, v)| (k.clone(), false, v)).collect(),
            _ => return,
        };
        for (name, positional, item) in entries {
            let child = self.alloc_node(&name, PropertyType::Derived, file, Owner::Node(id));
            if let Some(c) = self.nodes.get_mut(&child) {
                c.positional = positional;
            }
            if let Some(n) = self.nodes.get_mut(&id) {
                n.children.push(child);
            }
            self.assign_value(child, item);
        }
    }

    /// Drop every descendant of `id` from the arena. Edges into them dangle.
    pub(crate) fn drop_children(&mut self, id: NodeId, orphan: bool) {
        let children = match self.nodes.get_mut(&id) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            self.drop_children(child, orphan);
            self.remove_edges_from(child);
            self.detach_incoming(child, orphan);
            self.nodes.remove(&child);
        }
    }

    /// Give positional children their index as name again.
    pub(crate) fn reindex_children(&mut self, id: NodeId) {
        let children = match self.nodes.get(&id) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for (i, child) in children.into_iter().enumerate() {
            if let Some(c) = self.nodes.get_mut(&child) {
                if c.positional {
                    c.name = i.to_string();
                }
            }
        }
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Create an edge from `origin` for `expression` and try to bind it.
    pub(crate) fn add_edge(&mut self, origin: NodeId, expression: PathExpression, text: String) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        let mut edge = DependencyEdge::new(id, origin, expression, text);
        if let Some((target, via)) = self.resolve_from_node(origin, &edge.expression) {
            edge.target = Some(target);
            edge.via = via;
        }
        self.register_back_edges(&edge);
        trace!(edge = %id, origin = %origin, target = ?edge.target, path = %edge.expression, "add edge");
        if let Some(o) = self.nodes.get_mut(&origin) {
            o.dependencies.push(id);
        }
        self.edges.insert(id, edge);
        id
    }

    /// Remove all outgoing edges of `origin`, with their back-edges.
    pub(crate) fn remove_edges_from(&mut self, origin: NodeId) {
        let edge_ids = match self.nodes.get_mut(&origin) {
            Some(node) => std::mem::take(&mut node.dependencies),
            None => return,
        };
        for eid in edge_ids {
            if let Some(edge) = self.edges.remove(&eid) {
                for n in edge.bound_nodes() {
                    if let Some(node) = self.nodes.get_mut(&n) {
                        node.dependents.remove(&eid);
                    }
                }
            }
        }
    }

    fn register_back_edges(&mut self, edge: &DependencyEdge) {
        for n in edge.bound_nodes() {
            if let Some(node) = self.nodes.get_mut(&n) {
                node.dependents.insert(edge.id);
            }
        }
    }

    /// Clear an edge's target and via list, with their back-edges.
    fn unbind(&mut self, eid: EdgeId, orphan: bool) {
        let Some(edge) = self.edges.get_mut(&eid) else { return };
        let bound: Vec<NodeId> = edge.bound_nodes().collect();
        edge.target = None;
        edge.via.clear();
        edge.orphaned = orphan && edge.expression.segments.iter().any(|s| matches!(s, Segment::Index(_)));
        for n in bound {
            if let Some(node) = self.nodes.get_mut(&n) {
                node.dependents.remove(&eid);
            }
        }
    }

    /// Unbind every edge pointing at `id` or passing through it. With
    /// `orphan`, edges whose path goes through a list index stay unbound
    /// until the next apply.
    pub(crate) fn detach_incoming(&mut self, id: NodeId, orphan: bool) {
        let incoming = match self.nodes.get_mut(&id) {
            Some(node) => std::mem::take(&mut node.dependents),
            None => return,
        };
        for eid in incoming {
            self.unbind(eid, orphan);
        }
    }

    /// Unbind the edges whose path went through reference `id`, leaving
    /// edges that target it alone. Called when `id` gets a new value.
    pub(crate) fn detach_passing(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else { return };
        let passing: Vec<EdgeId> = node
            .dependents
            .iter()
            .copied()
            .filter(|eid| self.edges.get(eid).is_some_and(|e| e.via.contains(&id)))
            .collect();
        for eid in passing {
            self.unbind(eid, false);
        }
    }

    /// Create the edges for the references in a node's own raw value.
    pub(crate) fn link_references(&mut self, id: NodeId) {
        let refs = match self.nodes.get(&id) {
            Some(node) if node.declared && !matches!(node.property_type, PropertyType::PropertiesFile | PropertyType::Fake) => {
                extract::raw_references(&node.raw)
            }
            _ => return,
        };
        for (expression, text) in refs {
            self.add_edge(id, expression, text);
        }
    }

    pub(crate) fn link_subtree(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            self.link_references(node);
        }
    }

    /// Try to bind unresolved edges, oldest first. Orphaned edges are only
    /// considered when `include_orphaned` is set, which also clears their
    /// flag. Returns how many edges were bound.
    pub(crate) fn relink_dangling(&mut self, include_orphaned: bool) -> usize {
        let mut dangling: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.target.is_none() && (include_orphaned || !e.orphaned))
            .map(|e| e.id)
            .collect();
        dangling.sort();

        let mut bound = 0;
        for eid in dangling {
            let Some(edge) = self.edges.get(&eid) else { continue };
            let found = self.resolve_from_node(edge.origin, &edge.expression);
            let Some(edge) = self.edges.get_mut(&eid) else { continue };
            if include_orphaned {
                edge.orphaned = false;
            }
            let Some((target, via)) = found else { continue };
            edge.target = Some(target);
            edge.via = via;
            let edge = edge.clone();
            self.register_back_edges(&edge);
            bound += 1;
        }
        if bound > 0 {
            trace!(bound, "relinked dangling edges");
        }
        bound
    }

    /// Relink until nothing more binds. A path through a reference only
    /// binds once that reference's own edge did.
    pub(crate) fn relink_until_stable(&mut self, include_orphaned: bool) {
        let mut include = include_orphaned;
        for _ in 0..=self.config.max_reference_depth {
            if self.relink_dangling(include) == 0 {
                break;
            }
            include = false;
        }
    }

    /// Outgoing edges over a node's subtree that count as dependencies:
    /// resolved, and not pointing back at the origin or one of its
    /// containers. Duplicates are kept.
    pub fn effective_dependencies(&self, id: NodeId) -> Vec<EdgeId> {
        self.subtree(id)
            .into_iter()
            .filter_map(|n| self.nodes.get(&n))
            .flat_map(|n| n.dependencies.iter().copied())
            .filter(|eid| {
                self.edges.get(eid).is_some_and(|e| match e.target {
                    Some(t) => t != e.origin && !self.is_ancestor(t, e.origin),
                    None => false,
                })
            })
            .collect()
    }

    /// Incoming edges from outside the node itself, oldest first.
    pub fn effective_dependents(&self, id: NodeId) -> Vec<EdgeId> {
        let Some(node) = self.nodes.get(&id) else { return Vec::new() };
        let mut out: Vec<EdgeId> = node
            .dependents
            .iter()
            .copied()
            .filter(|eid| {
                self.edges.get(eid).is_some_and(|e| e.origin != id && !self.is_ancestor(id, e.origin))
            })
            .collect();
        out.sort();
        out
    }

    // ========================================================================
    // Names
    // ========================================================================

    /// Member name with a `(k)` suffix when `k` earlier siblings share it.
    pub(crate) fn display_name(&self, block: BlockId, member: Member) -> String {
        let Some(name) = self.member_name(member) else { return String::new() };
        let rank = self
            .blocks
            .get(&block)
            .map(|b| {
                b.members
                    .iter()
                    .take_while(|&&m| m != member)
                    .filter(|&&m| self.member_visible(m) && self.member_name(m) == Some(name))
                    .count()
            })
            .unwrap_or(0);
        if rank > 0 { format!("{name}({rank})") } else { name.to_string() }
    }

    /// Dotted path of a block from its file root. Empty for the root.
    pub fn block_path(&self, block: BlockId) -> String {
        let mut parts = Vec::new();
        let mut current = block;
        while let Some(b) = self.blocks.get(&current) {
            let Some(parent) = b.parent else { break };
            parts.push(self.display_name(parent, Member::Block(current)));
            current = parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// `ext.prop1`, `ext.list[0]`, `ext.map.key`, `ext.map["odd key"]`.
    /// Properties-file entries are named by their bare key.
    pub fn qualified_name(&self, id: NodeId) -> String {
        let Some(node) = self.nodes.get(&id) else { return String::new() };
        if node.property_type == PropertyType::PropertiesFile {
            return node.name.clone();
        }
        match node.owner {
            Owner::Block(block) => {
                let local = self.display_name(block, Member::Node(id));
                let prefix = self.block_path(block);
                if prefix.is_empty() { local } else { format!("{prefix}.{local}") }
            }
            Owner::Node(parent) => {
                let base = self.qualified_name(parent);
                if node.positional {
                    format!("{base}[{}]", node.name)
                } else if node.property_type == PropertyType::Fake || is_identifier(&node.name) {
                    format!("{base}.{}", node.name)
                } else {
                    format!("{base}[\"{}\"]", node.name.replace('"', "\\\""))
                }
            }
        }
    }

    /// Clear cached values. Called by every mutation.
    pub(crate) fn invalidate(&mut self) {
        self.cache.get_mut().clear();
    }
}
