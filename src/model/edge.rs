//! Dependency edge: "origin's value mentions this path".

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{NodeId, PathExpression};

/// Opaque edge identifier. Allocation order equals creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge from a referencing node to the node its path names.
///
/// `target == None` means the path did not resolve (yet, or any more).
/// That is different from having no edge at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub id: EdgeId,
    pub origin: NodeId,
    pub target: Option<NodeId>,
    pub expression: PathExpression,
    /// Reference text as written, e.g. `${prop1}` or `prop1[0]`.
    pub expression_text: String,
    /// Set when the target was deleted and the path addresses a list
    /// element by position. Such edges stay dangling until the next
    /// apply boundary instead of silently shifting to a neighbour.
    pub orphaned: bool,
    /// References the path went through to reach `target`, innermost
    /// first: in `alias.k` with `alias = other`, that is `alias`. The edge
    /// sits in their `dependents` too.
    #[serde(default)]
    pub via: SmallVec<[NodeId; 2]>,
}

impl DependencyEdge {
    pub fn new(id: EdgeId, origin: NodeId, expression: PathExpression, expression_text: impl Into<String>) -> Self {
        Self {
            id,
            origin,
            target: None,
            expression,
            expression_text: expression_text.into(),
            orphaned: false,
            via: SmallVec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_self_loop(&self) -> bool {
        self.target == Some(self.origin)
    }

    /// The target followed by every reference passed on the way.
    pub fn bound_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.target.into_iter().chain(self.via.iter().copied())
    }
}
