//! netconfd tree
//!
//! Read-only accessor surface over the path-addressed configuration tree,
//! plus an in-memory implementation used by the CLI and by tests.

pub mod accessor;
pub mod tree;

pub use accessor::{ConfigAccessor, Scoped};
pub use tree::ConfigTree;
