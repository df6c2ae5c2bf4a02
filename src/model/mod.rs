//! # Property Model
//!
//! Plain data shared by every layer: nodes, edges, values, paths and files.
//! No resolution logic and no I/O lives here.

pub mod node;
pub mod edge;
pub mod path;
pub mod value;
pub mod file;

pub use node::{NodeId, PropertyNode, PropertyType, Owner, Projection, Baseline};
pub use edge::{DependencyEdge, EdgeId};
pub use path::{PathExpression, Segment};
pub use value::{FromValue, RawValue, ReferenceTo, Value, ValueType};
pub use file::{Block, BlockId, FileId, FileKind, FileScope, Member, Notification};
