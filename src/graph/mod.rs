//! Property graph of log events, packages, products and CVEs.

mod builder;
mod model;
pub mod row;

pub use builder::{BuildReport, GraphModelBuilder, RowOutcome};
pub use model::{AttrValue, Edge, Graph, Node, NodeId, NodeKind, Relation};
pub use row::{Row, local_name, rows_from_json};
