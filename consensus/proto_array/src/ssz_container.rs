use crate::proto_array::{ProposerBoost, ProtoArray, ProtoNode};
use crate::proto_array_fork_choice::ProtoArrayForkChoice;
use crate::vote_tracker::{ElasticList, VoteTracker};
use crate::Error;
use beacon_types::Checkpoint;
use ssz_derive::{Decode, Encode};
use std::collections::HashMap;

/// The persisted form of the fork-choice bookkeeping.
///
/// Nodes are stored in insertion order and the root-to-index map is rebuilt on decode, so a
/// decoded store is index-for-index identical to the one that was encoded.
#[derive(Encode, Decode)]
pub struct SszContainer {
    pub votes: Vec<VoteTracker>,
    pub balances: Vec<u64>,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub previous_proposer_boost: ProposerBoost,
    pub nodes: Vec<ProtoNode>,
}

impl From<&ProtoArrayForkChoice> for SszContainer {
    fn from(from: &ProtoArrayForkChoice) -> Self {
        let proto_array = &from.proto_array;

        Self {
            votes: from.votes.0.clone(),
            balances: from.balances.clone(),
            justified_checkpoint: proto_array.justified_checkpoint,
            finalized_checkpoint: proto_array.finalized_checkpoint,
            previous_proposer_boost: proto_array.previous_proposer_boost,
            nodes: proto_array.nodes.clone(),
        }
    }
}

impl TryFrom<SszContainer> for ProtoArrayForkChoice {
    type Error = Error;

    fn try_from(from: SszContainer) -> Result<Self, Error> {
        let mut indices = HashMap::with_capacity(from.nodes.len());

        for (node_index, node) in from.nodes.iter().enumerate() {
            // A parent must precede its children; anything else means the snapshot is corrupt.
            if node.parent.map_or(false, |parent| parent >= node_index) {
                return Err(Error::InvalidNodeIndex(node_index));
            }
            indices.insert(node.root, node_index);
        }

        let proto_array = ProtoArray {
            justified_checkpoint: from.justified_checkpoint,
            finalized_checkpoint: from.finalized_checkpoint,
            nodes: from.nodes,
            indices,
            previous_proposer_boost: from.previous_proposer_boost,
        };

        Ok(Self {
            proto_array,
            votes: ElasticList(from.votes),
            balances: from.balances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto_array_fork_choice::{Block, ExecutionStatus};
    use beacon_types::{Epoch, Hash256, Slot};
    use ssz::{Decode, Encode};

    #[test]
    fn round_trip_rebuilds_identical_indices() {
        let checkpoint = Checkpoint {
            epoch: Epoch::new(0),
            root: Hash256::from_low_u64_be(1),
        };
        let anchor = Block {
            slot: Slot::new(0),
            root: checkpoint.root,
            parent_root: None,
            state_root: Hash256::zero(),
            target_root: Hash256::zero(),
            justified_checkpoint: checkpoint,
            finalized_checkpoint: checkpoint,
            execution_status: ExecutionStatus::Valid,
        };

        let mut fork_choice =
            ProtoArrayForkChoice::new(anchor.clone(), checkpoint, checkpoint).unwrap();
        fork_choice
            .process_block(Block {
                slot: Slot::new(1),
                root: Hash256::from_low_u64_be(2),
                parent_root: Some(anchor.root),
                execution_status: ExecutionStatus::Optimistic,
                ..anchor
            })
            .unwrap();
        fork_choice.process_attestation(7, Hash256::from_low_u64_be(2), Epoch::new(1));

        let bytes = fork_choice.as_bytes();
        let decoded = ProtoArrayForkChoice::from_bytes(&bytes).unwrap();

        assert!(fork_choice == decoded);
    }

    #[test]
    fn out_of_order_parents_are_rejected() {
        let container = SszContainer {
            votes: vec![],
            balances: vec![],
            justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
            previous_proposer_boost: ProposerBoost::default(),
            nodes: vec![ProtoNode {
                slot: Slot::new(0),
                root: Hash256::from_low_u64_be(1),
                state_root: Hash256::zero(),
                target_root: Hash256::zero(),
                // A node may not be its own ancestor.
                parent: Some(0),
                justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                weight: 0,
                best_child: None,
                best_descendant: None,
                execution_status: ExecutionStatus::Optimistic,
            }],
        };

        let bytes = container.as_ssz_bytes();
        let container = SszContainer::from_ssz_bytes(&bytes).unwrap();
        assert!(ProtoArrayForkChoice::try_from(container).is_err());
    }
}
