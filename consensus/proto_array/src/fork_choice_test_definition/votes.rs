use super::*;

/// Vote application, vote switching, balance changes and pruning on a small two-validator
/// chain. Weights are asserted along the way to pin down the delta bookkeeping, not just the
/// selected head.
pub fn get_votes_test_definition() -> ForkChoiceTestDefinition {
    let genesis_checkpoint = get_checkpoint(0, 0);
    let balances = vec![1, 1];

    let operations = vec![
        //           0
        //          / \
        //         1   2
        Operation::ProcessBlock {
            slot: Slot::new(1),
            root: get_root(1),
            parent_root: get_root(0),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::ProcessBlock {
            slot: Slot::new(1),
            root: get_root(2),
            parent_root: get_root(0),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        // Validator 0 votes for block 1: its weight alone decides the fork.
        Operation::ProcessAttestation {
            validator_index: 0,
            block_root: get_root(1),
            target_epoch: Epoch::new(0),
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(1),
        },
        // Validator 1 votes for block 2: weights tie at 1 and the greater root wins.
        Operation::ProcessAttestation {
            validator_index: 1,
            block_root: get_root(2),
            target_epoch: Epoch::new(0),
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(2),
        },
        // Validator 0 switches to block 2: one balance moves across the fork.
        Operation::ProcessAttestation {
            validator_index: 0,
            block_root: get_root(2),
            target_epoch: Epoch::new(1),
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(2),
        },
        Operation::AssertWeight {
            block_root: get_root(1),
            weight: 0,
        },
        Operation::AssertWeight {
            block_root: get_root(2),
            weight: 2,
        },
        Operation::AssertWeight {
            block_root: get_root(0),
            weight: 2,
        },
        //           0
        //          / \
        //         1   2
        //             |
        //             3
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(3),
            parent_root: get_root(2),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::ProcessAttestation {
            validator_index: 0,
            block_root: get_root(3),
            target_epoch: Epoch::new(2),
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(3),
        },
        Operation::AssertWeight {
            block_root: get_root(2),
            weight: 2,
        },
        Operation::AssertWeight {
            block_root: get_root(3),
            weight: 1,
        },
        // Finality advances to block 2: the anchor and the abandoned fork are dropped, the
        // retained weights are untouched.
        Operation::Prune {
            finalized_root: get_root(2),
            expected_len: 2,
        },
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(0, 2),
            finalized_checkpoint: get_checkpoint(0, 2),
            justified_state_balances: balances,
            expected_head: get_root(3),
        },
        Operation::AssertWeight {
            block_root: get_root(2),
            weight: 2,
        },
        Operation::AssertWeight {
            block_root: get_root(3),
            weight: 1,
        },
        // Validator 0's balance doubles without a vote change: the old balance is subtracted
        // and the new one added on the same chain.
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(0, 2),
            finalized_checkpoint: get_checkpoint(0, 2),
            justified_state_balances: vec![2, 1],
            expected_head: get_root(3),
        },
        Operation::AssertWeight {
            block_root: get_root(3),
            weight: 2,
        },
        Operation::AssertWeight {
            block_root: get_root(2),
            weight: 3,
        },
        //             2
        //             |
        //             3
        //            / \
        //           4   5
        Operation::ProcessBlock {
            slot: Slot::new(3),
            root: get_root(4),
            parent_root: get_root(3),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::ProcessBlock {
            slot: Slot::new(3),
            root: get_root(5),
            parent_root: get_root(3),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        // Unvoted siblings tie and the greater root wins...
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(0, 2),
            finalized_checkpoint: get_checkpoint(0, 2),
            justified_state_balances: vec![2, 1],
            expected_head: get_root(5),
        },
        // ...unless the lesser one holds the proposer boost (50% of the 3 units of total
        // balance, rounded down to 1).
        Operation::ProposerBoostFindHead {
            justified_checkpoint: get_checkpoint(0, 2),
            finalized_checkpoint: get_checkpoint(0, 2),
            justified_state_balances: vec![2, 1],
            proposer_boost_root: get_root(4),
            expected_head: get_root(4),
        },
        // The boost is withdrawn on the next computation and the tie-break reasserts itself.
        Operation::FindHead {
            justified_checkpoint: get_checkpoint(0, 2),
            finalized_checkpoint: get_checkpoint(0, 2),
            justified_state_balances: vec![2, 1],
            expected_head: get_root(5),
        },
        Operation::AssertWeight {
            block_root: get_root(4),
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
        get_votes_test_definition().run();
    }
}
