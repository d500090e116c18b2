//! Blakod Registry
//!
//! Symbol storage shared by every compiler pass.
//!
//! - [`symbols`]: scoped identifier tables with forward-reference placeholders
//! - [`class_graph`]: superclass graph used for ordering and dependency walks

pub mod class_graph;
pub mod symbols;

pub use class_graph::ClassGraph;
pub use symbols::{Definition, IdRef, Identifier, IdentifierTable, Scope};
