//! Single-pass tree construction
//!
//! One algorithm serves both build modes: a full pass that indexes an
//! entire source to populate a cache, and a scoped pass that
//! reconstructs only the subtree under one id to answer a request on a
//! cold or stale cache.
//!
//! The stream contract: record ids are strictly increasing, and a
//! record's parent appears at or before it (or the parent field is
//! empty, marking a root). Increasing ids are validated and violations
//! fail the pass. A declared parent that was never indexed leaves the
//! record reachable only through the id index; that dangling node is
//! the defined consequence of the ordering assumption, not something to
//! repair by buffering the whole file.

use crate::error::{CanopyError, CanopyResult};
use crate::rows::{Record, RowStream};
use crate::tree::Node;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Which portion of the stream a pass reconstructs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildScope {
    /// Index every record
    Full,

    /// Only the subtree under the given id
    Subtree(u64),
}

/// Whether a pass needs more records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Continue,

    /// No further record can contribute; the caller may stop streaming
    Complete,
}

/// Ordering precondition violation: ids must be strictly increasing
/// in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderViolation {
    pub id: u64,
    pub prev: u64,
}

/// Frozen id → node index produced by a finished pass.
#[derive(Debug, Default)]
pub struct TreeIndex {
    nodes: HashMap<u64, Arc<Node>>,
}

impl TreeIndex {
    /// Look up a node (and thereby its whole subtree) by id.
    ///
    /// `None` is the normal negative result, not an error.
    pub fn get(&self, id: u64) -> Option<Arc<Node>> {
        self.nodes.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Node under construction; children hold arena indices until the
/// freeze pass.
struct ArenaNode {
    id: u64,
    name: String,
    children: Vec<usize>,
}

/// Incremental single-pass builder over an ordered record stream.
pub struct TreeBuilder {
    scope: BuildScope,
    arena: Vec<ArenaNode>,
    by_id: HashMap<u64, usize>,
    last_id: Option<u64>,
    root_seen: bool,
}

impl TreeBuilder {
    pub fn new(scope: BuildScope) -> Self {
        Self {
            scope,
            arena: Vec::new(),
            by_id: HashMap::new(),
            last_id: None,
            root_seen: false,
        }
    }

    /// Consume one record.
    ///
    /// Returns `BuildStep::Complete` when a scoped pass has proven that
    /// no later record can matter: ids increase, so once a record above
    /// the requested root arrives before the root itself was seen, the
    /// root cannot appear anymore. This bounds a cold-cache miss to the
    /// scan prefix instead of the whole file.
    pub fn push(&mut self, record: Record) -> Result<BuildStep, OrderViolation> {
        if let Some(prev) = self.last_id {
            if record.id <= prev {
                return Err(OrderViolation {
                    id: record.id,
                    prev,
                });
            }
        }
        self.last_id = Some(record.id);

        match self.scope {
            BuildScope::Full => {
                self.insert(record);
            }
            BuildScope::Subtree(root) => {
                if record.id == root {
                    self.root_seen = true;
                    self.insert(record);
                } else if record.id > root {
                    if !self.root_seen {
                        return Ok(BuildStep::Complete);
                    }
                    // Descendants of the root always carry a parent id
                    // at or above it.
                    if record.parent.is_some_and(|p| p >= root) {
                        self.insert(record);
                    }
                }
                // Records below the root id are the scan prefix; skip.
            }
        }

        Ok(BuildStep::Continue)
    }

    fn insert(&mut self, record: Record) {
        let idx = self.arena.len();

        if let Some(parent) = record.parent {
            if let Some(&p) = self.by_id.get(&parent) {
                self.arena[p].children.push(idx);
            }
        }

        self.by_id.insert(record.id, idx);
        self.arena.push(ArenaNode {
            id: record.id,
            name: record.name,
            children: Vec::new(),
        });
    }

    /// Freeze the arena into an immutable index.
    ///
    /// Children always sit at higher arena indices than their parent,
    /// so freezing back-to-front has every child ready before its
    /// parent is built.
    pub fn finish(self) -> TreeIndex {
        let len = self.arena.len();
        let mut frozen: Vec<Arc<Node>> = Vec::with_capacity(len);

        for node in self.arena.into_iter().rev() {
            let children = node
                .children
                .iter()
                .map(|&c| Arc::clone(&frozen[len - 1 - c]))
                .collect();
            frozen.push(Arc::new(Node {
                id: node.id,
                name: node.name,
                children,
            }));
        }

        let nodes = self
            .by_id
            .into_iter()
            .map(|(id, idx)| (id, Arc::clone(&frozen[len - 1 - idx])))
            .collect();

        TreeIndex { nodes }
    }
}

/// Drive a row stream through a builder in one pass.
pub async fn build_tree(path: &Path, scope: BuildScope) -> CanopyResult<TreeIndex> {
    let mut stream = RowStream::open(path).await?;
    let mut builder = TreeBuilder::new(scope);

    while let Some(record) = stream.next_record().await? {
        match builder.push(record) {
            Ok(BuildStep::Continue) => {}
            Ok(BuildStep::Complete) => break,
            Err(violation) => {
                return Err(CanopyError::Unordered {
                    path: path.to_path_buf(),
                    line: stream.line(),
                    id: violation.id,
                    prev: violation.prev,
                });
            }
        }
    }

    Ok(builder.finish())
}
