//! Building a graph from parsed file trees.

use tracing::{debug, warn};

use super::PropertyGraph;
use crate::config::ModelConfig;
use crate::model::*;
use crate::tree::{Declaration, DeclarationKind, FileTree};
use crate::{Error, Result};

impl PropertyGraph {
    /// Load a set of linked documents.
    ///
    /// Files link to each other by name. A link to a file that is not in
    /// `trees` becomes a [`Notification::MissingLinkedFile`] on the linking
    /// file; an application that would close a cycle is dropped with a
    /// [`Notification::CircularApplication`].
    pub fn load(trees: Vec<FileTree>, config: ModelConfig) -> Result<Self> {
        let mut graph = PropertyGraph::new(config);

        for tree in &trees {
            if graph.file_by_name(&tree.name).is_some() {
                return Err(Error::IllegalArgument(format!("duplicate file '{}'", tree.name)));
            }
            let file = graph.add_file(tree.name.clone(), tree.kind);
            if tree.unparsed_elements > 0 {
                warn!(file = %tree.name, count = tree.unparsed_elements, "incomplete parse");
                graph.notify(file, Notification::IncompleteParse { count: tree.unparsed_elements });
            }
            let property_type = match tree.kind {
                FileKind::Build => PropertyType::Regular,
                FileKind::Properties => PropertyType::PropertiesFile,
            };
            if let Some(root) = graph.file(file).map(|f| f.root) {
                graph.build_block(root, file, &tree.declarations, property_type);
            }
        }

        for (idx, tree) in trees.iter().enumerate() {
            graph.link_file(FileId(idx as u32), tree);
        }

        for idx in 0..graph.files.len() {
            graph.renumber(FileId(idx as u32));
        }

        let mut ids: Vec<NodeId> = graph.nodes.keys().copied().collect();
        ids.sort();
        for id in ids {
            graph.link_references(id);
        }
        graph.relink_until_stable(false);
        graph.capture_baselines();

        debug!(
            files = graph.files.len(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "graph loaded"
        );
        Ok(graph)
    }

    fn build_block(&mut self, block: BlockId, file: FileId, declarations: &[Declaration], property_type: PropertyType) {
        let mut sorted: Vec<&Declaration> = declarations.iter().collect();
        sorted.sort_by_key(|d| d.source_order_index);

        for decl in sorted {
            let member = match &decl.kind {
                DeclarationKind::Property(value) | DeclarationKind::Variable(value) => {
                    let kind = match decl.kind {
                        DeclarationKind::Variable(_) if property_type == PropertyType::Regular => PropertyType::Variable,
                        _ => property_type,
                    };
                    let id = self.alloc_node(&decl.name, kind, file, Owner::Block(block));
                    self.assign_value(id, value);
                    Member::Node(id)
                }
                DeclarationKind::Block(children) => {
                    let child = self.alloc_block(&decl.name, file, Some(block));
                    self.build_block(child, file, children, property_type);
                    Member::Block(child)
                }
            };
            if let Some(b) = self.blocks.get_mut(&block) {
                b.members.push(member);
            }
        }
    }

    fn link_file(&mut self, file: FileId, tree: &FileTree) {
        for name in &tree.applied {
            let Some(target) = self.linked(file, name) else { continue };
            if target == file || self.applies_transitively(target, file) {
                warn!(file = %tree.name, applied = %name, "circular file application dropped");
                self.notify(file, Notification::CircularApplication { applied: name.clone() });
                continue;
            }
            if let Some(scope) = self.files.get_mut(file.0 as usize) {
                scope.applied.push(target);
            }
        }

        if let Some(name) = &tree.parent {
            if let Some(parent) = self.linked(file, name) {
                if parent == file || self.parent_chain(parent).contains(&file) {
                    warn!(file = %tree.name, parent = %name, "parent link would form a cycle, dropped");
                } else if let Some(scope) = self.files.get_mut(file.0 as usize) {
                    scope.parent = Some(parent);
                }
            }
        }

        if let Some(name) = &tree.properties {
            if let Some(props) = self.linked(file, name) {
                if let Some(scope) = self.files.get_mut(file.0 as usize) {
                    scope.properties = Some(props);
                }
            }
        }
    }

    /// Look up a linked file by name, noting it on `file` when missing.
    fn linked(&mut self, file: FileId, name: &str) -> Option<FileId> {
        let found = self.file_by_name(name);
        if found.is_none() {
            warn!(linked = %name, "linked file not supplied");
            self.notify(file, Notification::MissingLinkedFile { name: name.to_string() });
        }
        found
    }

    /// True when `from` applies `to`, directly or through other files.
    fn applies_transitively(&self, from: FileId, to: FileId) -> bool {
        let mut stack = vec![from];
        let mut seen = hashbrown::HashSet::new();
        while let Some(f) = stack.pop() {
            if !seen.insert(f) {
                continue;
            }
            let Some(scope) = self.file(f) else { continue };
            if scope.applied.contains(&to) {
                return true;
            }
            stack.extend(scope.applied.iter().copied());
        }
        false
    }

    pub(crate) fn notify(&mut self, file: FileId, notification: Notification) {
        if let Some(scope) = self.files.get_mut(file.0 as usize) {
            scope.notifications.push(notification);
        }
    }
}
