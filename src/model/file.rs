//! Files, blocks and the per-file resolution chain.

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Index of a file in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// Opaque block identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// Build script: blocks, properties, variables.
    Build,
    /// Flat `key=value` properties file.
    Properties,
}

/// A declaration slot inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Member {
    Node(NodeId),
    Block(BlockId),
}

/// A named scope holding declarations in source order.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    /// Empty for a file's root block.
    pub name: String,
    pub file: FileId,
    pub parent: Option<BlockId>,
    pub members: Vec<Member>,
}

/// Non-fatal problems attached to the document they were found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// The tree collaborator could not parse some elements.
    IncompleteParse { count: usize },
    /// Applying `applied` from this file would close an application cycle.
    /// The link is dropped.
    CircularApplication { applied: String },
    /// A linked file name that was not supplied.
    MissingLinkedFile { name: String },
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::IncompleteParse { count } => write!(f, "incomplete parse of {count} elements"),
            Notification::CircularApplication { applied } => write!(f, "circular file application of '{applied}'"),
            Notification::MissingLinkedFile { name } => write!(f, "linked file '{name}' not found"),
        }
    }
}

/// One document and its links, in resolution order.
#[derive(Debug, Clone)]
pub struct FileScope {
    pub id: FileId,
    pub name: String,
    pub kind: FileKind,
    pub root: BlockId,
    /// Applied files, in application order.
    pub applied: Vec<FileId>,
    /// Parent build file, for submodules.
    pub parent: Option<FileId>,
    pub properties: Option<FileId>,
    pub notifications: Vec<Notification>,
}
