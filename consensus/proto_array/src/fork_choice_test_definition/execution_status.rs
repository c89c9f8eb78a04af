use super::*;

/// Execution-layer interactions: validity propagating to ancestors, and an invalid report
/// removing a whole subtree together with its accumulated weight.
pub fn get_execution_status_test_definition() -> ForkChoiceTestDefinition {
    let genesis_checkpoint = get_checkpoint(0, 0);
    let balances = vec![1, 1];

    let operations = vec![
        //            0
        //           / \
        //          1   4
        //          |
        //          2
        //          |
        //          3
        Operation::ProcessBlock {
            slot: Slot::new(1),
            root: get_root(1),
            parent_root: get_root(0),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(2),
            parent_root: get_root(1),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::ProcessBlock {
            slot: Slot::new(3),
            root: get_root(3),
            parent_root: get_root(2),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::ProcessBlock {
            slot: Slot::new(1),
            root: get_root(4),
            parent_root: get_root(0),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::ProcessAttestation {
            validator_index: 0,
            block_root: get_root(3),
            target_epoch: Epoch::new(0),
        },
        Operation::ProcessAttestation {
            validator_index: 1,
            block_root: get_root(3),
            target_epoch: Epoch::new(0),
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(3),
        },
        Operation::AssertExecutionStatus {
            block_root: get_root(3),
            status: ExecutionStatus::Optimistic,
        },
        // The execution layer confirms block 4: validity reaches the anchor.
        Operation::ValidatePayload {
            block_root: get_root(4),
        },
        Operation::AssertExecutionStatus {
            block_root: get_root(4),
            status: ExecutionStatus::Valid,
        },
        Operation::AssertExecutionStatus {
            block_root: get_root(0),
            status: ExecutionStatus::Valid,
        },
        // The execution layer rejects block 2: it disappears together with its descendant, and
        // the two units of weight they held are taken off the surviving ancestors.
        Operation::InvalidateSubtree {
            root: get_root(2),
            expected_removed: vec![get_root(2), get_root(3)],
        },
        Operation::AssertWeight {
            block_root: get_root(1),
            weight: 0,
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(4),
        },
        // Votes stranded on the removed subtree do not resurrect: they only count again once
        // the validator moves to a surviving block.
        Operation::ProcessAttestation {
            validator_index: 0,
            block_root: get_root(4),
            target_epoch: Epoch::new(1),
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances,
            expected_head: get_root(4),
        },
        Operation::AssertWeight {
            block_root: get_root(4),
            weight: 1,
        },
    ];

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        justified_checkpoint: genesis_checkpoint,
        finalized_checkpoint: genesis_checkpoint,
        operations,
    }
}
