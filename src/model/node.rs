//! Property node in the dependency graph.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{BlockId, EdgeId, FileId, RawValue, ValueType};

/// Opaque node identifier. Stable for the lifetime of the graph, including
/// across delete and re-declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a property came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    /// Declared property, e.g. inside `ext { }`.
    Regular,
    /// Local variable declaration (`def x = ...`).
    Variable,
    /// Element of a list or entry of a map.
    Derived,
    /// Synthetic projection of part of another value.
    Fake,
    /// Entry of a `key=value` properties file. Read-only.
    PropertiesFile,
}

/// Where a node hangs in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    /// Declaration directly inside a block.
    Block(BlockId),
    /// List element, map entry or fake projection of another node.
    Node(NodeId),
}

/// Separator-delimited segment of the owner's string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub separator: char,
    pub index: usize,
}

/// State captured at a load/save boundary, diffed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub name: String,
    pub declared: bool,
    /// Canonical text of the declared value, children included.
    pub text: String,
}

/// A property, variable, list element, map entry or projection.
#[derive(Debug, Clone)]
pub struct PropertyNode {
    pub id: NodeId,
    /// Local name. For list elements this is the positional index text and
    /// is recomputed whenever the list changes.
    pub name: String,
    pub property_type: PropertyType,
    pub raw: RawValue,
    pub file: FileId,
    pub owner: Owner,
    /// List elements or map entries, in order.
    pub children: Vec<NodeId>,
    /// Fake projections hanging off this node.
    pub projections: Vec<NodeId>,
    pub projection: Option<Projection>,
    /// Set on list elements, which are addressed by position only.
    pub positional: bool,
    /// False for placeholders and deleted declarations.
    pub declared: bool,
    /// Preorder position within the owning file.
    pub source_order_index: usize,
    pub baseline: Baseline,
    /// Outgoing edges, left-to-right as the references appear.
    pub dependencies: SmallVec<[EdgeId; 4]>,
    /// Incoming edges: those targeting this node and those whose path
    /// passes through it. One entry per edge, never per origin.
    pub dependents: HashSet<EdgeId>,
}

impl PropertyNode {
    pub fn new(id: NodeId, name: impl Into<String>, property_type: PropertyType, file: FileId, owner: Owner) -> Self {
        let name = name.into();
        Self {
            id,
            baseline: Baseline { name: name.clone(), declared: false, text: String::new() },
            name,
            property_type,
            raw: RawValue::None,
            file,
            owner,
            children: Vec::new(),
            projections: Vec::new(),
            projection: None,
            positional: false,
            declared: false,
            source_order_index: 0,
            dependencies: SmallVec::new(),
            dependents: HashSet::new(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.raw.value_type()
    }

    pub fn is_placeholder(&self) -> bool {
        !self.declared
    }
}
