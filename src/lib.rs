//! Canopy - subtree lookup server over flat row files
//!
//! Serves hierarchical records stored as flat rows in delimited files,
//! answering subtree lookups from per-source in-memory caches that are
//! rebuilt in the background when the backing file changes.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod refresh;
pub mod rows;
pub mod server;
pub mod service;
pub mod tree;

pub use error::{CanopyError, CanopyResult};
