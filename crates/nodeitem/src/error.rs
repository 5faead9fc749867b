use thiserror::Error;

use crate::tree::{NodeId, NodeKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node {0:?} does not belong to this tree")]
    UnknownNode(NodeId),

    #[error("A {child:?} named '{name}' cannot be added under a {parent:?}")]
    InvalidParent {
        parent: NodeKind,
        child: NodeKind,
        name: String,
    },

    #[error("Flag '{name}' is already defined on this node")]
    DuplicateFlag { name: String },
}
