mod execution_status;
mod ffg_updates;
mod no_votes;
mod votes;

use crate::proto_array_fork_choice::{Block, ExecutionStatus, ProtoArrayForkChoice};
use beacon_types::{ChainSpec, Checkpoint, Epoch, Hash256, Slot};
use serde_derive::{Deserialize, Serialize};

pub use execution_status::*;
pub use ffg_updates::*;
pub use no_votes::*;
pub use votes::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    FindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
        expected_head: Hash256,
    },
    ProposerBoostFindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
        proposer_boost_root: Hash256,
        expected_head: Hash256,
    },
    InvalidFindHead {
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        justified_state_balances: Vec<u64>,
    },
    ProcessBlock {
        slot: Slot,
        root: Hash256,
        parent_root: Hash256,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
    },
    ProcessAttestation {
        validator_index: usize,
        block_root: Hash256,
        target_epoch: Epoch,
    },
    ValidatePayload {
        block_root: Hash256,
    },
    InvalidateSubtree {
        root: Hash256,
        expected_removed: Vec<Hash256>,
    },
    Prune {
        finalized_root: Hash256,
        expected_len: usize,
    },
    AssertWeight {
        block_root: Hash256,
        weight: u64,
    },
    AssertExecutionStatus {
        block_root: Hash256,
        status: ExecutionStatus,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkChoiceTestDefinition {
    pub finalized_block_slot: Slot,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub operations: Vec<Operation>,
}

impl ForkChoiceTestDefinition {
    pub fn run(self) {
        let mut spec = ChainSpec::mainnet();
        spec.proposer_score_boost = Some(50);

        let anchor = Block {
            slot: self.finalized_block_slot,
            root: self.finalized_checkpoint.root,
            parent_root: None,
            state_root: Hash256::zero(),
            target_root: Hash256::zero(),
            justified_checkpoint: self.justified_checkpoint,
            finalized_checkpoint: self.finalized_checkpoint,
            execution_status: ExecutionStatus::Optimistic,
        };
        let mut fork_choice = ProtoArrayForkChoice::new(
            anchor,
            self.justified_checkpoint,
            self.finalized_checkpoint,
        )
        .expect("should create fork choice struct");

        for (op_index, op) in self.operations.into_iter().enumerate() {
            match op.clone() {
                Operation::FindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                    expected_head,
                } => {
                    let head = fork_choice
                        .find_head(
                            justified_checkpoint,
                            finalized_checkpoint,
                            &justified_state_balances,
                            Hash256::zero(),
                            &spec,
                        )
                        .unwrap_or_else(|e| {
                            panic!("find_head op at index {} returned error {:?}", op_index, e)
                        });

                    assert_eq!(
                        head, expected_head,
                        "Operation at index {} failed head check. Operation: {:?}",
                        op_index, op
                    );
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::ProposerBoostFindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                    proposer_boost_root,
                    expected_head,
                } => {
                    let head = fork_choice
                        .find_head(
                            justified_checkpoint,
                            finalized_checkpoint,
                            &justified_state_balances,
                            proposer_boost_root,
                            &spec,
                        )
                        .unwrap_or_else(|e| {
                            panic!("find_head op at index {} returned error {:?}", op_index, e)
                        });

                    assert_eq!(
                        head, expected_head,
                        "Operation at index {} failed head check. Operation: {:?}",
                        op_index, op
                    );
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::InvalidFindHead {
                    justified_checkpoint,
                    finalized_checkpoint,
                    justified_state_balances,
                } => {
                    let result = fork_choice.find_head(
                        justified_checkpoint,
                        finalized_checkpoint,
                        &justified_state_balances,
                        Hash256::zero(),
                        &spec,
                    );

                    assert!(
                        result.is_err(),
                        "Operation at index {} was expected to fail. Operation: {:?}",
                        op_index,
                        op
                    );
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::ProcessBlock {
                    slot,
                    root,
                    parent_root,
                    justified_checkpoint,
                    finalized_checkpoint,
                } => {
                    let block = Block {
                        slot,
                        root,
                        parent_root: Some(parent_root),
                        state_root: Hash256::zero(),
                        target_root: Hash256::zero(),
                        justified_checkpoint,
                        finalized_checkpoint,
                        execution_status: ExecutionStatus::Optimistic,
                    };
                    fork_choice.process_block(block).unwrap_or_else(|e| {
                        panic!(
                            "process_block op at index {} returned error: {:?}",
                            op_index, e
                        )
                    });
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::ProcessAttestation {
                    validator_index,
                    block_root,
                    target_epoch,
                } => {
                    fork_choice.process_attestation(validator_index, block_root, target_epoch);
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::ValidatePayload { block_root } => {
                    fork_choice
                        .process_execution_payload_validation(block_root)
                        .unwrap_or_else(|e| {
                            panic!(
                                "validate_payload op at index {} returned error: {:?}",
                                op_index, e
                            )
                        });
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::InvalidateSubtree {
                    root,
                    expected_removed,
                } => {
                    let removed = fork_choice.invalidate_subtree(root).unwrap_or_else(|e| {
                        panic!(
                            "invalidate_subtree op at index {} returned error: {:?}",
                            op_index, e
                        )
                    });

                    assert_eq!(
                        removed, expected_removed,
                        "Operation at index {} removed an unexpected set. Operation: {:?}",
                        op_index, op
                    );
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::Prune {
                    finalized_root,
                    expected_len,
                } => {
                    fork_choice.prune(finalized_root).unwrap_or_else(|e| {
                        panic!("prune op at index {} returned error: {:?}", op_index, e)
                    });

                    assert_eq!(
                        fork_choice.len(),
                        expected_len,
                        "Prune op at index {} left {} nodes instead of {}",
                        op_index,
                        fork_choice.len(),
                        expected_len
                    );
                    check_bytes_round_trip(&fork_choice);
                }
                Operation::AssertWeight { block_root, weight } => assert_eq!(
                    fork_choice.get_weight(&block_root),
                    Some(weight),
                    "Operation at index {} failed weight check. Operation: {:?}",
                    op_index,
                    op
                ),
                Operation::AssertExecutionStatus { block_root, status } => assert_eq!(
                    fork_choice.get_block_execution_status(&block_root),
                    Some(status),
                    "Operation at index {} failed status check. Operation: {:?}",
                    op_index,
                    op
                ),
            }
        }
    }
}

/// Gives a root that is not the zero hash (unless i is `u64::MAX`).
fn get_root(i: u64) -> Hash256 {
    Hash256::from_low_u64_be(i + 1)
}

/// Gives a checkpoint with a root that is not the zero hash (unless i is `u64::MAX`).
fn get_checkpoint(epoch: u64, root: u64) -> Checkpoint {
    Checkpoint {
        epoch: Epoch::new(epoch),
        root: get_root(root),
    }
}

fn check_bytes_round_trip(original: &ProtoArrayForkChoice) {
    let bytes = original.as_bytes();
    let decoded =
        ProtoArrayForkChoice::from_bytes(&bytes).expect("fork choice should decode from bytes");
    assert!(
        *original == decoded,
        "fork choice should encode and decode without change"
    );
}
