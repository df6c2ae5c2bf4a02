//! # propgraph — property dependency engine for build-configuration files
//!
//! Tracks the properties and variables declared across a set of linked
//! build documents, resolves the references between them and keeps a live
//! two-way dependency graph that survives edits.
//!
//! ## Design Principles
//!
//! 1. **Flat arena**: nodes, blocks and edges live in one graph keyed by
//!    stable ids, so reference cycles are just ids pointing at each other
//! 2. **Trees in, graph out**: concrete syntax is parsed elsewhere; the
//!    engine starts from [`FileTree`]s
//! 3. **Never diverge**: resolution keeps a per-call stack and falls back
//!    to the reference text instead of looping
//! 4. **Degrade, don't fail**: expressions the engine cannot interpret are
//!    `UNKNOWN`, unresolved references read as their text
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use propgraph::{Declaration, ElementValue, FileTree, Project, ReferenceTo};
//! use propgraph::tree::properties::parse_properties;
//!
//! # fn example() -> propgraph::Result<()> {
//! let project = Project::load(vec![
//!     FileTree::build("build.gradle", vec![Declaration::block("ext", vec![
//!         Declaration::property("greeting", "hello ${animal}"),
//!         Declaration::property("copy", ElementValue::expr("greeting")),
//!     ])])
//!     .with_properties("gradle.properties"),
//!     parse_properties("gradle.properties", "animal = lion"),
//! ])?;
//!
//! let model = project.build_model("build.gradle")?;
//! let copy = model.find_property("ext.copy")?;
//! assert_eq!(copy.value::<String>().as_deref(), Some("hello lion"));
//!
//! model.find_property("ext.animal")?.set_value("tiger")?;
//! copy.set_value(ReferenceTo::new("ext.animal"))?;
//! println!("{}", model.text()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`tree`] | Parsed input documents |
//! | [`resolve`] | Path syntax and scope-chain lookup |
//! | [`extract`] | Value classification and reference extraction |
//! | [`graph`] | Node/edge arena and loading |
//! | [`eval`] | Cycle-safe value resolution |
//! | [`mutation`] | Edits, modified state and declaration ordering |
//! | [`facade`] | Handle-based public model |
//! | [`export`] | DSL text and JSON snapshots |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod tree;
pub mod config;
pub mod resolve;
pub mod extract;
pub mod graph;
pub mod eval;
pub mod mutation;
pub mod facade;
pub mod export;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    FromValue, Notification, NodeId, PropertyType, ReferenceTo, Value, ValueType,
};

// ============================================================================
// Re-exports: Input trees and configuration
// ============================================================================

pub use tree::{Declaration, DeclarationKind, ElementValue, FileTree};
pub use config::ModelConfig;

// ============================================================================
// Re-exports: Graph and facade
// ============================================================================

pub use graph::PropertyGraph;
pub use mutation::IntoElementValue;
pub use facade::{BlockModel, BuildModel, Project, PropertyHandle};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Path syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
