use super::*;

/// Checkpoint filtering: once the store's justified checkpoint leaves the genesis epoch, blocks
/// whose post-state disagrees with it are excluded from head competition no matter how much
/// attester weight they carry.
pub fn get_ffg_case_test_definition() -> ForkChoiceTestDefinition {
    let genesis_checkpoint = get_checkpoint(0, 0);
    let balances = vec![1, 1];

    let operations = vec![
        //            0
        //            |
        //            1
        //            |
        //            2
        //            |
        //            3 <- justifies epoch 1, root 1
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
            justified_checkpoint: get_checkpoint(1, 1),
            finalized_checkpoint: genesis_checkpoint,
        },
        // While the store is still at the genesis checkpoints, everything is viable.
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(3),
        },
        // Adopt the new justified checkpoint. Only block 3 agrees with it, but its ancestors
        // remain on the canonical path through their best descendant.
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 1),
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(3),
        },
        //            0
        //            |
        //            1
        //           / \
        //          2   4 <- does not justify epoch 1
        //          |
        //          3
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(4),
            parent_root: get_root(1),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        // The whole validator set votes for the conflicting fork...
        Operation::ProcessAttestation {
            validator_index: 0,
            block_root: get_root(4),
            target_epoch: Epoch::new(2),
        },
        Operation::ProcessAttestation {
            validator_index: 1,
            block_root: get_root(4),
            target_epoch: Epoch::new(2),
        },
        // ...and block 3 still wins, because a head on block 4's fork would revert the
        // justification the store has already accepted.
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(1, 1),
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances,
            expected_head: get_root(3),
        },
        Operation::AssertWeight {
            block_root: get_root(4),
            weight: 2,
        },
        Operation::AssertWeight {
            block_root: get_root(3),
            weight: 0,
        },
    ];

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        justified_checkpoint: genesis_checkpoint,
        finalized_checkpoint: genesis_checkpoint,
        operations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test() {
        get_ffg_case_test_definition().run();
    }
}
