//! Scope chain lookup.
//!
//! A path is looked up from the block it is written in, highest priority
//! first:
//!
//! 1. the enclosing blocks up to the file root, each one also searching its
//!    extra-properties child block;
//! 2. applied files, in application order, recursively;
//! 3. the parent file chain (submodules), with their applied files;
//! 4. the file's own properties file;
//! 5. the parent files' properties files.
//!
//! First match wins. Undeclared placeholders never match. `project.` and
//! `rootProject.` prefixes restart the lookup at the own file's root or
//! the topmost parent file's root.
//!
//! A path may pass through references (`alias.k` where `alias = other`).
//! Those references are collected into a [`Via`] list, pushed only once the
//! rest of the path resolved, so a failed branch leaves nothing behind.

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::graph::PropertyGraph;
use crate::model::*;

/// References a resolved path went through.
pub(crate) type Via = SmallVec<[NodeId; 2]>;

impl PropertyGraph {
    /// Resolve a path as written in `origin`'s value, with the references
    /// it passed through.
    pub(crate) fn resolve_from_node(&self, origin: NodeId, path: &PathExpression) -> Option<(NodeId, Via)> {
        let node = self.nodes.get(&origin)?;
        if matches!(node.property_type, PropertyType::PropertiesFile | PropertyType::Fake) {
            return None;
        }
        let block = self.scope_block(origin)?;
        let mut via = Via::new();
        let target = self.resolve_path_via(path, block, &mut via)?;
        Some((target, via))
    }

    /// Resolve a path written inside `from`.
    pub fn resolve_path(&self, path: &PathExpression, from: BlockId) -> Option<NodeId> {
        self.resolve_path_via(path, from, &mut Via::new())
    }

    fn resolve_path_via(&self, path: &PathExpression, from: BlockId, via: &mut Via) -> Option<NodeId> {
        let file = self.blocks.get(&from)?.file;

        if let Some(rest) = strip_prefix(path, &self.config.project_alias) {
            let root = self.file(file)?.root;
            return self.resolve_in_chain(&rest, file, root, via);
        }
        if let Some(rest) = strip_prefix(path, &self.config.root_project_alias) {
            let top = self.topmost_file(file);
            let root = self.file(top)?.root;
            return self.resolve_in_chain(&rest, top, root, via);
        }
        self.resolve_in_chain(path, file, from, via)
    }

    fn resolve_in_chain(&self, path: &PathExpression, file: FileId, from: BlockId, via: &mut Via) -> Option<NodeId> {
        let segments = path.segments.as_slice();

        let mut block = Some(from);
        while let Some(b) = block {
            if let Some(found) = self.lookup_members(b, segments, false, via) {
                return Some(found);
            }
            block = self.blocks.get(&b).and_then(|blk| blk.parent);
        }

        let mut visited = HashSet::new();
        visited.insert(file);
        for &applied in &self.file(file)?.applied {
            if let Some(found) = self.lookup_applied(applied, segments, &mut visited, via) {
                return Some(found);
            }
        }

        let ancestors = self.parent_chain(file);
        for &parent in &ancestors {
            let Some(scope) = self.file(parent) else { continue };
            if scope.kind == FileKind::Properties {
                continue;
            }
            if let Some(found) = self.lookup_members(scope.root, segments, false, via) {
                return Some(found);
            }
            for &applied in &scope.applied {
                if let Some(found) = self.lookup_applied(applied, segments, &mut visited, via) {
                    return Some(found);
                }
            }
        }

        std::iter::once(file)
            .chain(ancestors)
            .filter_map(|f| self.file(f)?.properties)
            .find_map(|props| self.lookup_properties(props, segments))
    }

    fn lookup_applied(
        &self,
        file: FileId,
        segments: &[Segment],
        visited: &mut HashSet<FileId>,
        via: &mut Via,
    ) -> Option<NodeId> {
        if !visited.insert(file) {
            return None;
        }
        let scope = self.file(file)?;
        let found = match scope.kind {
            FileKind::Properties => self.lookup_properties(file, segments),
            FileKind::Build => self.lookup_members(scope.root, segments, false, via),
        };
        if found.is_some() {
            return found;
        }
        scope.applied.iter().find_map(|&a| self.lookup_applied(a, segments, visited, via))
    }

    /// Properties keys may contain dots, so the whole path text is the key.
    fn lookup_properties(&self, file: FileId, segments: &[Segment]) -> Option<NodeId> {
        let mut key = String::new();
        for (i, seg) in segments.iter().enumerate() {
            match seg {
                Segment::Name { name, ordinal: None } => {
                    if i > 0 {
                        key.push('.');
                    }
                    key.push_str(name);
                }
                _ => return None,
            }
        }
        let root = self.file(file)?.root;
        self.blocks.get(&root)?.members.iter().find_map(|&m| match m {
            Member::Node(id) => self.nodes.get(&id).filter(|n| n.declared && n.name == key).map(|n| n.id),
            Member::Block(_) => None,
        })
    }

    /// Parent files, nearest first. Stops at a repeated file.
    pub(crate) fn parent_chain(&self, file: FileId) -> Vec<FileId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(file);
        let mut current = self.file(file).and_then(|f| f.parent);
        while let Some(p) = current {
            if !seen.insert(p) {
                break;
            }
            chain.push(p);
            current = self.file(p).and_then(|f| f.parent);
        }
        chain
    }

    pub(crate) fn topmost_file(&self, file: FileId) -> FileId {
        self.parent_chain(file).last().copied().unwrap_or(file)
    }

    /// Look a path up inside one block: its own members first, then its
    /// extra-properties block.
    pub(crate) fn lookup_in_block(&self, block: BlockId, segments: &[Segment], placeholders: bool) -> Option<NodeId> {
        self.lookup_members(block, segments, placeholders, &mut Via::new())
    }

    fn lookup_members(&self, block: BlockId, segments: &[Segment], placeholders: bool, via: &mut Via) -> Option<NodeId> {
        let (Segment::Name { name, ordinal }, rest) = segments.split_first()? else {
            return None;
        };

        let direct = self
            .find_member(block, name, ordinal.unwrap_or(0), placeholders)
            .and_then(|member| match member {
                Member::Node(id) => self.descend(id, rest, placeholders, 0, via),
                Member::Block(b) if !rest.is_empty() => self.lookup_members(b, rest, placeholders, via),
                Member::Block(_) => None,
            });
        if direct.is_some() {
            return direct;
        }

        if name == &self.config.extra_block {
            return None;
        }
        let extra = self.child_block(block, &self.config.extra_block)?;
        self.lookup_members(extra, segments, placeholders, via)
    }

    /// The `nth` member of `block` named `name`.
    pub(crate) fn find_member(&self, block: BlockId, name: &str, nth: usize, placeholders: bool) -> Option<Member> {
        self.blocks
            .get(&block)?
            .members
            .iter()
            .copied()
            .filter(|&m| self.member_name(m) == Some(name))
            .filter(|&m| placeholders || self.member_visible(m))
            .nth(nth)
    }

    /// Walk the remaining segments below a node: list indices, map keys,
    /// projections, and through references to what they point at.
    fn descend(&self, id: NodeId, segments: &[Segment], placeholders: bool, depth: usize, via: &mut Via) -> Option<NodeId> {
        let Some((seg, rest)) = segments.split_first() else {
            return Some(id);
        };
        let node = self.nodes.get(&id)?;

        if let Segment::Name { name, ordinal: None } = seg {
            let fake = node
                .projections
                .iter()
                .copied()
                .find(|f| self.nodes.get(f).is_some_and(|n| &n.name == name));
            if let Some(fake) = fake.filter(|_| rest.is_empty()) {
                return Some(fake);
            }
        }

        match &node.raw {
            RawValue::List => match seg {
                Segment::Index(i) => self.descend(*node.children.get(*i)?, rest, placeholders, depth, via),
                _ => None,
            },
            RawValue::Map => {
                let key = seg.as_key()?;
                let child = node
                    .children
                    .iter()
                    .copied()
                    .find(|c| self.nodes.get(c).is_some_and(|n| n.declared && n.name == key))?;
                self.descend(child, rest, placeholders, depth, via)
            }
            RawValue::Reference(_) => {
                if depth >= self.config.max_reference_depth {
                    return None;
                }
                let target = node
                    .dependencies
                    .first()
                    .and_then(|e| self.edges.get(e))
                    .and_then(|e| e.target)
                    .filter(|&t| t != id)?;
                let found = self.descend(target, segments, placeholders, depth + 1, via)?;
                via.push(id);
                Some(found)
            }
            _ => None,
        }
    }

    /// Every property visible from `block`, by name. Shadowed names are
    /// reported once, for the declaration that wins.
    pub fn in_scope_properties(&self, block: BlockId) -> Vec<(String, NodeId)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let Some(file) = self.blocks.get(&block).map(|b| b.file) else { return out };

        let mut current = Some(block);
        while let Some(b) = current {
            self.collect_block(b, &mut seen, &mut out);
            current = self.blocks.get(&b).and_then(|blk| blk.parent);
        }

        let mut visited = HashSet::new();
        visited.insert(file);
        let applied = self.file(file).map(|f| f.applied.clone()).unwrap_or_default();
        for a in applied {
            self.collect_applied(a, &mut visited, &mut seen, &mut out);
        }

        let ancestors = self.parent_chain(file);
        for &parent in &ancestors {
            let Some(scope) = self.file(parent) else { continue };
            if scope.kind == FileKind::Build {
                self.collect_block(scope.root, &mut seen, &mut out);
                for &a in &scope.applied {
                    self.collect_applied(a, &mut visited, &mut seen, &mut out);
                }
            }
        }

        for props in std::iter::once(file).chain(ancestors).filter_map(|f| self.file(f)?.properties) {
            if let Some(root) = self.file(props).map(|f| f.root) {
                self.collect_block(root, &mut seen, &mut out);
            }
        }
        out
    }

    fn collect_applied(&self, file: FileId, visited: &mut HashSet<FileId>, seen: &mut HashSet<String>, out: &mut Vec<(String, NodeId)>) {
        if !visited.insert(file) {
            return;
        }
        let Some(scope) = self.file(file) else { return };
        self.collect_block(scope.root, seen, out);
        for &a in &scope.applied {
            self.collect_applied(a, visited, seen, out);
        }
    }

    fn collect_block(&self, block: BlockId, seen: &mut HashSet<String>, out: &mut Vec<(String, NodeId)>) {
        let Some(blk) = self.blocks.get(&block) else { return };
        let mut push_members = |members: &[Member], seen: &mut HashSet<String>| {
            for &m in members {
                if let Member::Node(id) = m {
                    if let Some(node) = self.nodes.get(&id).filter(|n| n.declared) {
                        if seen.insert(node.name.clone()) {
                            out.push((node.name.clone(), id));
                        }
                    }
                }
            }
        };
        push_members(&blk.members, seen);
        if let Some(extra) = self.child_block(block, &self.config.extra_block).and_then(|b| self.blocks.get(&b)) {
            push_members(&extra.members, seen);
        }
    }
}

fn strip_prefix(path: &PathExpression, alias: &str) -> Option<PathExpression> {
    match path.segments.first() {
        Some(Segment::Name { name, ordinal: None }) if name == alias => path.skip(1),
        _ => None,
    }
}
