use crate::error::Error;
use crate::proto_array::{ProposerBoost, ProtoArray};
use crate::ssz_container::SszContainer;
use crate::vote_tracker::{compute_deltas, ElasticList, VoteTracker};
use beacon_types::{ChainSpec, Checkpoint, Epoch, Hash256, Slot};
use serde_derive::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use std::collections::HashMap;

/// The execution layer's verdict on a block, as far as fork choice is concerned.
///
/// `Optimistic` and `Syncing` both mean "no verdict yet" — the former after a payload has been
/// submitted and is pending, the latter while the execution layer is still catching up. The
/// distinction is informational; viability treats them alike. `Valid` is terminal for a node's
/// lifetime in the tree. `Invalid` never persists: an invalid report removes the node and its
/// subtree immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Valid,
    Optimistic,
    Syncing,
    Invalid,
}

impl ExecutionStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ExecutionStatus::Valid)
    }

    pub fn is_optimistic(&self) -> bool {
        matches!(self, ExecutionStatus::Optimistic | ExecutionStatus::Syncing)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ExecutionStatus::Invalid)
    }

    fn to_u8(self) -> u8 {
        match self {
            ExecutionStatus::Valid => 0,
            ExecutionStatus::Optimistic => 1,
            ExecutionStatus::Syncing => 2,
            ExecutionStatus::Invalid => 3,
        }
    }

    fn from_u8(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(ExecutionStatus::Valid),
            1 => Ok(ExecutionStatus::Optimistic),
            2 => Ok(ExecutionStatus::Syncing),
            3 => Ok(ExecutionStatus::Invalid),
            other => Err(DecodeError::BytesInvalid(format!(
                "{} is not a valid execution status",
                other
            ))),
        }
    }
}

impl Encode for ExecutionStatus {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        1
    }

    fn ssz_bytes_len(&self) -> usize {
        1
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.push(self.to_u8())
    }
}

impl Decode for ExecutionStatus {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        1
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        match bytes {
            [value] => Self::from_u8(*value),
            _ => Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: 1,
            }),
        }
    }
}

/// A block descriptor, as handed to fork choice by the import pipeline once state transition has
/// completed. The checkpoints are the ones computed by this block's post-state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub slot: Slot,
    pub root: Hash256,
    /// `None` only for the anchor (tree root) block.
    pub parent_root: Option<Hash256>,
    pub state_root: Hash256,
    pub target_root: Hash256,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub execution_status: ExecutionStatus,
}

/// The proto-array store plus the vote/balance bookkeeping that feeds it.
///
/// There is deliberately no internal locking: the engine is logically single-threaded and the
/// calling layer serializes every mutation through one writer.
#[derive(PartialEq, Debug)]
pub struct ProtoArrayForkChoice {
    pub(crate) proto_array: ProtoArray,
    pub(crate) votes: ElasticList<VoteTracker>,
    /// The balances reflected in the currently-applied node weights. Replaced by the snapshot
    /// supplied to `find_head` once its deltas have been applied.
    pub(crate) balances: Vec<u64>,
}

impl ProtoArrayForkChoice {
    /// Instantiate a store containing only the anchor block (genesis, or the block a checkpoint
    /// sync started from).
    pub fn new(
        anchor: Block,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
    ) -> Result<Self, Error> {
        let mut proto_array = ProtoArray {
            justified_checkpoint,
            finalized_checkpoint,
            nodes: Vec::with_capacity(1),
            indices: HashMap::with_capacity(1),
            previous_proposer_boost: ProposerBoost::default(),
        };

        proto_array.on_block(Block {
            parent_root: None,
            ..anchor
        })?;

        Ok(Self {
            proto_array,
            votes: ElasticList::default(),
            balances: vec![],
        })
    }

    /// Record a validator's latest vote. Weights are untouched; the vote becomes binding at the
    /// next `find_head`.
    pub fn process_attestation(
        &mut self,
        validator_index: usize,
        block_root: Hash256,
        target_epoch: Epoch,
    ) {
        self.votes
            .get_mut(validator_index)
            .observe(block_root, target_epoch);
    }

    /// Register a block. See `ProtoArray::on_block`.
    pub fn process_block(&mut self, block: Block) -> Result<(), Error> {
        self.proto_array.on_block(block)
    }

    /// Make all pending votes binding and return the current head.
    ///
    /// Runs the two-phase weight update: compute sparse deltas from vote/balance changes, apply
    /// them in one backward pass, then chase the best-descendant pointers from the justified
    /// node.
    pub fn find_head(
        &mut self,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: &[u64],
        proposer_boost_root: Hash256,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        let old_balances = &mut self.balances;
        let new_balances = justified_state_balances;

        let deltas = compute_deltas(
            &self.proto_array.indices,
            &mut self.votes,
            old_balances,
            new_balances,
        )?;

        self.proto_array.apply_score_changes(
            deltas,
            justified_checkpoint,
            finalized_checkpoint,
            new_balances,
            proposer_boost_root,
            spec,
        )?;

        *old_balances = new_balances.to_vec();

        self.proto_array.find_head(&justified_checkpoint.root)
    }

    /// See `ProtoArray::prune`.
    pub fn prune(&mut self, finalized_root: Hash256) -> Result<Vec<Hash256>, Error> {
        self.proto_array.prune(finalized_root)
    }

    /// See `ProtoArray::invalidate_subtree`.
    pub fn invalidate_subtree(&mut self, block_root: Hash256) -> Result<Vec<Hash256>, Error> {
        self.proto_array.invalidate_subtree(block_root)
    }

    /// See `ProtoArray::propagate_execution_payload_validation`.
    pub fn process_execution_payload_validation(
        &mut self,
        block_root: Hash256,
    ) -> Result<(), Error> {
        self.proto_array
            .propagate_execution_payload_validation(block_root)
    }

    pub fn len(&self) -> usize {
        self.proto_array.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proto_array.nodes.is_empty()
    }

    pub fn contains_block(&self, block_root: &Hash256) -> bool {
        self.proto_array.indices.contains_key(block_root)
    }

    pub fn get_block(&self, block_root: &Hash256) -> Option<Block> {
        let block_index = self.proto_array.indices.get(block_root)?;
        let block = self.proto_array.nodes.get(*block_index)?;
        let parent_root = block
            .parent
            .and_then(|i| self.proto_array.nodes.get(i))
            .map(|parent| parent.root);

        Some(Block {
            slot: block.slot,
            root: block.root,
            parent_root,
            state_root: block.state_root,
            target_root: block.target_root,
            justified_checkpoint: block.justified_checkpoint,
            finalized_checkpoint: block.finalized_checkpoint,
            execution_status: block.execution_status,
        })
    }

    pub fn get_weight(&self, block_root: &Hash256) -> Option<u64> {
        let index = self.proto_array.indices.get(block_root)?;
        self.proto_array.nodes.get(*index).map(|node| node.weight)
    }

    pub fn get_block_execution_status(&self, block_root: &Hash256) -> Option<ExecutionStatus> {
        let index = self.proto_array.indices.get(block_root)?;
        self.proto_array
            .nodes
            .get(*index)
            .map(|node| node.execution_status)
    }

    /// Returns the most recent vote known for `validator_index`, if any.
    pub fn latest_message(&self, validator_index: usize) -> Option<(Hash256, Epoch)> {
        let vote = self.votes.0.get(validator_index)?;

        if *vote == VoteTracker::default() {
            None
        } else {
            Some((vote.next_root, vote.next_epoch))
        }
    }

    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.proto_array.is_descendant(ancestor_root, descendant_root)
    }

    /// Return a reverse iterator over the block roots of the chain ending at `block_root`.
    pub fn iter_block_roots<'a>(
        &'a self,
        block_root: &Hash256,
    ) -> impl Iterator<Item = (Hash256, Slot)> + 'a {
        self.proto_array.iter_block_roots(block_root)
    }

    /// Encode a snapshot of the whole structure for persistence. Insertion order is preserved,
    /// so decoding rebuilds identical indices.
    pub fn as_bytes(&self) -> Vec<u8> {
        SszContainer::from(self).as_ssz_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        SszContainer::from_ssz_bytes(bytes)
            .map_err(|e| format!("Failed to decode ProtoArrayForkChoice: {:?}", e))?
            .try_into()
            .map_err(|e| format!("Failed to rebuild ProtoArrayForkChoice: {:?}", e))
    }

    /// Direct access to the core `ProtoArray`.
    ///
    /// Should only be used for introspection (metrics, debugging); all mutation goes through the
    /// methods above.
    pub fn core_proto_array(&self) -> &ProtoArray {
        &self.proto_array
    }
}
