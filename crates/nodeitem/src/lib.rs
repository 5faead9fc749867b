//! The queryable data model for Metapath: documents made of assemblies,
//! fields and flags.
//!
//! # Key Types
//!
//! - [`NodeItemTree`]: an immutable arena of nodes, safe to share across threads
//! - [`NodeItem`]: a `Copy` handle into a tree, the node half of an item
//! - [`TreeBuilder`]: assembles trees and fixes positions and document order
//! - [`PathFormatter`]: renders node paths for diagnostics and `path()`

pub mod builder;
pub mod error;
pub mod path;
pub mod tree;

pub use builder::TreeBuilder;
pub use error::TreeError;
pub use path::{IndexedPathFormatter, MetapathPathFormatter, PathFormatter};
pub use tree::{NodeId, NodeItem, NodeItemTree, NodeKind, QName};
