use beacon_types::{Checkpoint, Hash256};

#[derive(Clone, PartialEq, Debug)]
pub enum Error {
    /// The parent of a to-be-inserted block is not in the store. The caller should buffer the
    /// block until the parent arrives; nothing was mutated.
    UnknownParent {
        block_root: Hash256,
        parent_root: Hash256,
    },
    NodeUnknown(Hash256),
    FinalizedNodeUnknown(Hash256),
    JustifiedNodeUnknown(Hash256),
    /// Removing the tree root (the finalized anchor) would empty the store; the execution layer
    /// declaring a finalized block invalid is an unrecoverable consensus failure.
    InvalidatingFinalizedRoot(Hash256),
    InvalidNodeIndex(usize),
    InvalidJustifiedIndex(usize),
    InvalidBestDescendant(usize),
    InvalidParentDelta(usize),
    InvalidNodeDelta(usize),
    DeltaOverflow(usize),
    ProposerBoostOverflow(usize),
    IndexOverflow(&'static str),
    InvalidDeltaLen {
        deltas: usize,
        indices: usize,
    },
    InvalidBestNode(Box<InvalidBestNodeInfo>),
    InvalidAncestorOfValidPayload {
        ancestor_block_root: Hash256,
    },
    ValidExecutionStatusBecameInvalid {
        block_root: Hash256,
    },
}

/// Diagnostic payload for the fatal case where the node selected as head is not viable under the
/// current checkpoints. This indicates store corruption, never a recoverable condition.
#[derive(Clone, PartialEq, Debug)]
pub struct InvalidBestNodeInfo {
    pub start_root: Hash256,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub head_root: Hash256,
    pub head_justified_checkpoint: Checkpoint,
    pub head_finalized_checkpoint: Checkpoint,
}
