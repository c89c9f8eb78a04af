use beacon_types::{ChainSpec, Checkpoint, Epoch, Hash256, Slot};
use fork_choice::{
    AttestationSummary, Block, Error, ExecutionStatus, ForkChoice, InvalidBlock, MemoryStore,
};
use slog::{o, Logger};
use std::time::Duration;

/// Received well after the attesting interval: never earns the proposer boost.
const LATE: Duration = Duration::from_secs(6);
/// Received within the first third of the slot: earns the proposer boost.
const TIMELY: Duration = Duration::from_secs(1);

fn logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

fn root(i: u64) -> Hash256 {
    Hash256::from_low_u64_be(i)
}

fn checkpoint(epoch: u64, root: Hash256) -> Checkpoint {
    Checkpoint {
        epoch: Epoch::new(epoch),
        root,
    }
}

fn anchor_block(anchor_root: Hash256) -> Block {
    Block {
        slot: Slot::new(0),
        root: anchor_root,
        parent_root: None,
        state_root: Hash256::zero(),
        target_root: Hash256::zero(),
        justified_checkpoint: checkpoint(0, anchor_root),
        finalized_checkpoint: checkpoint(0, anchor_root),
        execution_status: ExecutionStatus::Valid,
    }
}

fn block(slot: u64, block_root: Hash256, parent_root: Hash256, anchor_root: Hash256) -> Block {
    Block {
        slot: Slot::new(slot),
        root: block_root,
        parent_root: Some(parent_root),
        state_root: Hash256::zero(),
        target_root: Hash256::zero(),
        justified_checkpoint: checkpoint(0, anchor_root),
        finalized_checkpoint: checkpoint(0, anchor_root),
        execution_status: ExecutionStatus::Optimistic,
    }
}

fn attestation(
    slot: u64,
    attesting_indices: Vec<u64>,
    block_root: Hash256,
    target_epoch: u64,
) -> AttestationSummary {
    AttestationSummary {
        slot: Slot::new(slot),
        attesting_indices,
        beacon_block_root: block_root,
        target: checkpoint(target_epoch, block_root),
    }
}

fn engine_with_spec(anchor_root: Hash256, spec: ChainSpec) -> ForkChoice<MemoryStore> {
    let anchor_checkpoint = checkpoint(0, anchor_root);
    let store = MemoryStore::new(Slot::new(0), anchor_checkpoint, anchor_checkpoint);
    ForkChoice::from_anchor(store, anchor_block(anchor_root), spec, logger())
        .expect("engine should build from anchor")
}

fn engine(anchor_root: Hash256) -> ForkChoice<MemoryStore> {
    engine_with_spec(anchor_root, ChainSpec::mainnet())
}

#[test]
fn from_anchor_selects_the_anchor_as_head() {
    let genesis = root(1);
    let mut fc = engine(genesis);

    let head = fc.get_head(Slot::new(0)).unwrap();
    assert_eq!(head.root, genesis);
    assert_eq!(head.slot, Slot::new(0));
    assert_eq!(head.parent_root, None);
}

#[test]
fn misaligned_anchor_is_rejected() {
    let genesis = root(1);
    let anchor_checkpoint = checkpoint(0, genesis);
    let store = MemoryStore::new(Slot::new(1), anchor_checkpoint, anchor_checkpoint);
    let mut anchor = anchor_block(genesis);
    anchor.slot = Slot::new(1);

    let result = ForkChoice::from_anchor(store, anchor, ChainSpec::mainnet(), logger());
    assert!(matches!(result, Err(Error::InvalidAnchor { .. })));
}

/// Scenarios A and B: a single vote decides a two-block fork, and moving the vote moves the
/// head with the expected weight transfer.
#[test]
fn a_vote_decides_the_fork_and_can_move() {
    let genesis = root(1);
    let block_a = root(2);
    let block_b = root(3);
    let mut fc = engine(genesis);
    fc.on_new_balances(vec![32, 32]);

    fc.on_block(Slot::new(1), block(1, block_a, genesis, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(1), block(1, block_b, genesis, genesis), LATE)
        .unwrap();

    // Voteless, the greater root wins the tie.
    assert_eq!(fc.get_head(Slot::new(1)).unwrap().root, block_b);

    // Validator 0 attests for A.
    fc.on_attestation(Slot::new(2), attestation(1, vec![0], block_a, 0))
        .unwrap();
    assert_eq!(fc.get_head(Slot::new(2)).unwrap().root, block_a);
    assert_eq!(fc.proto_array().get_weight(&block_a), Some(32));
    assert_eq!(fc.proto_array().get_weight(&block_b), Some(0));

    // The validator's next attestation, in the same target epoch, votes for B instead: the
    // balance moves across the fork.
    fc.on_attestation(Slot::new(2), attestation(1, vec![0], block_b, 0))
        .unwrap();
    assert_eq!(fc.get_head(Slot::new(2)).unwrap().root, block_b);
    assert_eq!(fc.proto_array().get_weight(&block_a), Some(0));
    assert_eq!(fc.proto_array().get_weight(&block_b), Some(32));
    assert_eq!(fc.proto_array().get_weight(&genesis), Some(32));
}

#[test]
fn get_head_is_memoized_until_something_changes() {
    let genesis = root(1);
    let block_a = root(2);
    let mut fc = engine(genesis);
    fc.on_new_balances(vec![32]);
    fc.on_block(Slot::new(1), block(1, block_a, genesis, genesis), LATE)
        .unwrap();

    let first = fc.get_head(Slot::new(1)).unwrap();
    assert!(fc.cached_head().is_some());

    // No intervening votes or blocks: the identical result is returned.
    let second = fc.get_head(Slot::new(1)).unwrap();
    assert_eq!(first, second);

    // An ignored attestation (unknown block) must not disturb the cache.
    fc.on_attestation(Slot::new(1), attestation(0, vec![0], root(99), 0))
        .unwrap();
    assert!(fc.cached_head().is_some());

    // A real vote invalidates it.
    fc.on_attestation(Slot::new(2), attestation(1, vec![0], block_a, 0))
        .unwrap();
    assert!(fc.cached_head().is_none());
    assert_eq!(fc.get_head(Slot::new(2)).unwrap().root, block_a);
}

/// Scenario C: a timely block with zero attester weight beats a heavier late sibling while the
/// boost lasts, and loses it at the next slot tick.
#[test]
fn proposer_boost_outweighs_a_late_competitor() {
    let genesis = root(1);
    let timely_block = root(2);
    let late_block = root(3);

    let mut spec = ChainSpec::mainnet();
    spec.proposer_score_boost = Some(100);
    let mut fc = engine_with_spec(genesis, spec);
    fc.on_new_balances(vec![32, 32]);

    fc.on_block(Slot::new(1), block(1, late_block, genesis, genesis), LATE)
        .unwrap();
    fc.on_attestation(Slot::new(1), attestation(0, vec![0], late_block, 0))
        .unwrap();
    fc.on_block(Slot::new(1), block(1, timely_block, genesis, genesis), TIMELY)
        .unwrap();

    // Boost (100% of 64 total balance) exceeds the sibling's 32 of attester weight.
    assert_eq!(fc.get_head(Slot::new(1)).unwrap().root, timely_block);

    // The boost expires with the slot; the attested block takes the head back.
    assert_eq!(fc.get_head(Slot::new(2)).unwrap().root, late_block);
    assert_eq!(fc.proto_array().get_weight(&timely_block), Some(0));
}

/// Scenario D: an invalid execution payload removes the block and its descendants, and no
/// subsequent head computation ever selects them.
#[test]
fn invalidated_subtree_is_removed_from_head_competition() {
    let genesis = root(1);
    let block_a = root(2);
    let block_a1 = root(3);
    let block_a2 = root(4);
    let block_b = root(5);
    let mut fc = engine(genesis);
    fc.on_new_balances(vec![32, 32]);

    fc.on_block(Slot::new(1), block(1, block_a, genesis, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(2), block(2, block_a1, block_a, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(3), block(3, block_a2, block_a1, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(3), block(1, block_b, genesis, genesis), LATE)
        .unwrap();

    fc.on_attestation(Slot::new(4), attestation(3, vec![0], block_a2, 0))
        .unwrap();
    assert_eq!(fc.get_head(Slot::new(4)).unwrap().root, block_a2);

    let removed = fc.on_invalid_execution_payload(block_a).unwrap();
    assert_eq!(removed, vec![block_a, block_a1, block_a2]);

    for removed_root in &removed {
        assert!(!fc.contains_block(removed_root));
    }

    // The vote stranded on the removed subtree was subtracted from the surviving ancestors.
    assert_eq!(fc.proto_array().get_weight(&genesis), Some(0));

    let head = fc.get_head(Slot::new(4)).unwrap();
    assert_eq!(head.root, block_b);
}

#[test]
fn unknown_parents_are_recoverable() {
    let genesis = root(1);
    let parent = root(2);
    let child = root(3);
    let mut fc = engine(genesis);

    // The child arrives before its parent: rejected, nothing mutated.
    let result = fc.on_block(Slot::new(2), block(2, child, parent, genesis), LATE);
    assert!(matches!(
        result,
        Err(Error::InvalidBlock(InvalidBlock::UnknownParent(_)))
    ));
    assert_eq!(fc.proto_array().len(), 1);

    // Once the parent arrives, the buffered child imports cleanly.
    fc.on_block(Slot::new(2), block(1, parent, genesis, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(2), block(2, child, parent, genesis), LATE)
        .unwrap();
    assert_eq!(fc.proto_array().len(), 3);
}

#[test]
fn future_blocks_are_rejected() {
    let genesis = root(1);
    let mut fc = engine(genesis);

    let result = fc.on_block(Slot::new(1), block(5, root(2), genesis, genesis), LATE);
    assert!(matches!(
        result,
        Err(Error::InvalidBlock(InvalidBlock::FutureSlot { .. }))
    ));
}

#[test]
fn attestations_for_unknown_blocks_are_ignored() {
    let genesis = root(1);
    let mut fc = engine(genesis);

    fc.on_attestation(Slot::new(1), attestation(0, vec![0], root(77), 0))
        .unwrap();

    assert!(fc.queued_attestations().is_empty());
    assert_eq!(fc.proto_array().latest_message(0), None);
}

#[test]
fn current_slot_attestations_wait_for_the_next_slot() {
    let genesis = root(1);
    let block_a = root(2);
    let block_b = root(3);
    let mut fc = engine(genesis);
    fc.on_new_balances(vec![32, 32]);

    fc.on_block(Slot::new(1), block(1, block_a, genesis, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(1), block(1, block_b, genesis, genesis), LATE)
        .unwrap();

    // An attestation for the current slot is queued, not applied.
    fc.on_attestation(Slot::new(1), attestation(1, vec![0], block_a, 0))
        .unwrap();
    assert_eq!(fc.queued_attestations().len(), 1);

    // It has no influence yet: the tie-break still decides.
    assert_eq!(fc.get_head(Slot::new(1)).unwrap().root, block_b);

    // Once its slot has passed it is drained and becomes binding.
    assert_eq!(fc.get_head(Slot::new(2)).unwrap().root, block_a);
    assert!(fc.queued_attestations().is_empty());
}

#[test]
fn finality_advance_prunes_stale_branches() {
    let genesis = root(1);
    let block_a = root(2);
    let block_b = root(3);
    let stale = root(4);
    let finalizer = root(5);
    let mut fc = engine(genesis);
    fc.on_new_balances(vec![32, 32]);

    fc.on_block(Slot::new(1), block(1, block_a, genesis, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(2), block(2, block_b, block_a, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(2), block(1, stale, genesis, genesis), LATE)
        .unwrap();

    // A block whose post-state justifies and finalizes epoch 1 at block A.
    let mut finalizing_block = block(33, finalizer, block_b, genesis);
    finalizing_block.justified_checkpoint = checkpoint(1, block_a);
    finalizing_block.finalized_checkpoint = checkpoint(1, block_a);
    fc.on_block(Slot::new(33), finalizing_block, LATE).unwrap();

    assert_eq!(fc.finalized_checkpoint(), checkpoint(1, block_a));

    let removed = fc.prune().unwrap();
    assert_eq!(removed, vec![genesis, stale]);
    assert!(!fc.contains_block(&genesis));
    assert!(!fc.contains_block(&stale));
    assert!(fc.contains_block(&block_b));

    // Every remaining block descends from the finalized root, and the head sits on the
    // finalizing fork.
    for kept in [block_a, block_b, finalizer] {
        assert!(fc.is_descendant(block_a, kept));
    }
    assert_eq!(fc.get_head(Slot::new(33)).unwrap().root, finalizer);
    assert_eq!(fc.get_finalized_block().unwrap().root, block_a);
    assert_eq!(fc.get_justified_block().unwrap().root, block_a);
}

#[test]
fn persisted_engine_restores_identically() {
    let genesis = root(1);
    let block_a = root(2);
    let block_b = root(3);
    let mut fc = engine(genesis);
    fc.on_new_balances(vec![32, 32]);

    fc.on_block(Slot::new(1), block(1, block_a, genesis, genesis), LATE)
        .unwrap();
    fc.on_block(Slot::new(1), block(1, block_b, genesis, genesis), LATE)
        .unwrap();
    fc.on_attestation(Slot::new(2), attestation(1, vec![0], block_a, 0))
        .unwrap();
    let head = fc.get_head(Slot::new(2)).unwrap();

    let persisted = fc.to_persisted();
    let mut restored = ForkChoice::from_persisted(
        persisted,
        fc.fc_store().clone(),
        ChainSpec::mainnet(),
        logger(),
    )
    .expect("snapshot should restore");

    assert_eq!(restored.proto_array().len(), fc.proto_array().len());
    assert_eq!(restored.get_head(Slot::new(2)).unwrap(), head);
    assert_eq!(
        restored.proto_array().get_weight(&block_a),
        fc.proto_array().get_weight(&block_a)
    );
}
