//! Tree reconstruction from ordered row streams

pub mod builder;

pub use builder::{build_tree, BuildScope, BuildStep, TreeBuilder, TreeIndex};

use serde::Serialize;
use std::sync::Arc;

/// One node of a reconstructed tree.
///
/// Nodes are immutable once a build pass freezes them. The same node is
/// shared between the id index and its parent's child list, so a warm
/// lookup hands out a subtree without copying it.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Node {
    /// Node identifier
    pub id: u64,

    /// Display name
    pub name: String,

    /// Child nodes in stream order
    pub children: Vec<Arc<Node>>,
}
