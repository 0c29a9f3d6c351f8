//! Input model.
//!
//! An import document is an ordered forest of work items. Each item names its
//! backend type and carries its children inline, so the document order is the
//! creation order.

mod parser;
mod schema;

pub use parser::{
    parse_forest, parse_forest_str, validate_forest, DocumentFormat, InputError, InputResult,
};
pub use schema::{node_at, node_count, NodePath, WorkItemSpec};
