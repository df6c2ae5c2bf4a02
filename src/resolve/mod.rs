//! # Name Resolution
//!
//! Reference paths are tokenized ([`lexer`]), parsed into a
//! [`PathExpression`](crate::model::PathExpression) ([`parser`]) and looked
//! up along a file's scope chain ([`scope`]).

pub mod lexer;
pub mod parser;
pub mod scope;

pub use parser::{is_identifier, parse_path};
