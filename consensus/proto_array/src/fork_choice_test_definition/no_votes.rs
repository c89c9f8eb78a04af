use super::*;

/// Head selection on a voteless tree: every fork carries zero weight, so the byte order on
/// block roots decides every contest.
pub fn get_no_votes_test_definition() -> ForkChoiceTestDefinition {
    let genesis_checkpoint = get_checkpoint(0, 0);
    let balances = vec![];

    let operations = vec![
        //          0 <- anchor
        //          |
        //          1
        Operation::ProcessBlock {
            slot: Slot::new(1),
            root: get_root(1),
            parent_root: get_root(0),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(1),
        },
        //          0
        //         / \
        //        1   2 <- the greater root wins the tie
        Operation::ProcessBlock {
            slot: Slot::new(1),
            root: get_root(2),
            parent_root: get_root(0),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(2),
        },
        //          0
        //         / \
        //        1   2
        //        |
        //        3       <- extending the lesser fork does not win it the tie
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(3),
            parent_root: get_root(1),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(2),
        },
        //          0
        //         / \
        //        1   2
        //        |   |
        //        3   4   <- the winning fork's leaf becomes the head
        Operation::ProcessBlock {
            slot: Slot::new(2),
            root: get_root(4),
            parent_root: get_root(2),
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
        },
        Operation::FindHead {
            justified_checkpoint: genesis_checkpoint,
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances.clone(),
            expected_head: get_root(4),
        },
        // A justified root that is not in the store is fatal.
        Operation::InvalidFindHead {
            justified_checkpoint: get_checkpoint(0, 99),
            finalized_checkpoint: genesis_checkpoint,
            justified_state_balances: balances,
        },
    ];

    ForkChoiceTestDefinition {
        finalized_block_slot: Slot::new(0),
        justified_checkpoint: genesis_checkpoint,
        finalized_checkpoint: genesis_checkpoint,
        operations,
    }
}
