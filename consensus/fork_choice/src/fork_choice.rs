use crate::metrics;
use crate::ForkChoiceStore;
use beacon_types::{ChainSpec, Checkpoint, Hash256, Slot, INTERVALS_PER_SLOT};
use proto_array::{Block, ProtoArrayForkChoice};
use slog::{crit, debug, warn, Logger};
use ssz_derive::{Decode, Encode};
use std::cmp::Ordering;
use std::time::Duration;

#[derive(Debug)]
pub enum Error<T> {
    /// The block was rejected before any state was mutated; the import pipeline may buffer and
    /// retry it.
    InvalidBlock(InvalidBlock),
    ProtoArrayError(proto_array::Error),
    MissingProtoArrayBlock(Hash256),
    /// The clock was asked to move backwards or to skip. This is a caller bug.
    InconsistentOnTick {
        previous_slot: Slot,
        time: Slot,
    },
    UnableToSetJustifiedCheckpoint(T),
    /// The justified block is absent from the block tree. Fatal: the tree is corrupt and any
    /// head computed from it would be untrustworthy.
    MissingJustifiedBlock {
        justified_checkpoint: Checkpoint,
    },
    /// As `MissingJustifiedBlock`, for the finalized block.
    MissingFinalizedBlock {
        finalized_checkpoint: Checkpoint,
    },
    InvalidAnchor {
        block_slot: Slot,
    },
    InvalidPersistedBytes(String),
}

#[derive(Debug, PartialEq)]
pub enum InvalidBlock {
    /// The block's parent is not known to fork choice. Recoverable: buffer the block until the
    /// parent arrives.
    UnknownParent(Hash256),
    /// The block descriptor carried no parent root; only the anchor may do that, and the anchor
    /// is supplied at construction.
    MissingParent(Hash256),
    FutureSlot {
        current_slot: Slot,
        block_slot: Slot,
    },
    FinalizedSlot {
        finalized_slot: Slot,
        block_slot: Slot,
    },
    NotFinalizedDescendant {
        finalized_root: Hash256,
        block_ancestor: Option<Hash256>,
    },
}

impl<T> From<proto_array::Error> for Error<T> {
    fn from(e: proto_array::Error) -> Self {
        Error::ProtoArrayError(e)
    }
}

/// The minimum information about an attestation that fork choice needs, as distilled by the
/// verification pipeline. One summary may carry the votes of a whole aggregate.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct AttestationSummary {
    pub slot: Slot,
    pub attesting_indices: Vec<u64>,
    pub beacon_block_root: Hash256,
    pub target: Checkpoint,
}

/// The canonical head as selected by the last `get_head` run.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadInfo {
    pub root: Hash256,
    pub slot: Slot,
    pub state_root: Hash256,
    pub parent_root: Option<Hash256>,
}

/// An SSZ snapshot of the engine for fast restarts. Node insertion order is preserved, so the
/// rebuilt engine is index-for-index identical.
#[derive(Encode, Decode)]
pub struct PersistedForkChoice {
    pub proto_array_bytes: Vec<u8>,
    pub queued_attestations: Vec<AttestationSummary>,
}

/// Returns all values in `queued_attestations` with a slot earlier than `current_slot`, removing
/// them from the queue.
fn dequeue_attestations(
    current_slot: Slot,
    queued_attestations: &mut Vec<AttestationSummary>,
) -> Vec<AttestationSummary> {
    let remaining = queued_attestations.split_off(
        queued_attestations
            .iter()
            .position(|a| a.slot >= current_slot)
            .unwrap_or(queued_attestations.len()),
    );

    std::mem::replace(queued_attestations, remaining)
}

/// The LMD-GHOST fork-choice engine with proposer boost.
///
/// Wraps the proto-array store and provides:
///
/// - Slot ticking and deferred application of current-slot attestations.
/// - Proposer-boost assignment for timely blocks.
/// - Checkpoint advancement and finality-driven pruning.
/// - A memoized head: `get_head` recomputes only when a block, vote, balance snapshot,
///   checkpoint or boost changed since the last call.
///
/// The engine is logically single-threaded; the calling layer must serialize every call through
/// one writer. All time is supplied explicitly by the caller, which keeps runs deterministic and
/// reproducible.
pub struct ForkChoice<T> {
    /// Storage for fork choice, modelled on the consensus specification's `Store` object.
    fc_store: T,
    /// The underlying representation of the block DAG.
    proto_array: ProtoArrayForkChoice,
    /// Attestations for the current or a future slot, queued until their slot has passed.
    queued_attestations: Vec<AttestationSummary>,
    /// The memoized result of the last `get_head` run. `None` whenever any input to head
    /// selection has changed since.
    head: Option<HeadInfo>,
    spec: ChainSpec,
    log: Logger,
}

impl<T> ForkChoice<T>
where
    T: ForkChoiceStore,
{
    /// Instantiates the engine from an anchor block: genesis, or the block a checkpoint sync
    /// started from. The store's checkpoints must already point at the anchor.
    pub fn from_anchor(
        fc_store: T,
        anchor: Block,
        spec: ChainSpec,
        log: Logger,
    ) -> Result<Self, Error<T::Error>> {
        // The anchor must sit on an epoch boundary; checkpoints can only ever reference such
        // blocks.
        if anchor.slot % spec.slots_per_epoch != 0 {
            return Err(Error::InvalidAnchor {
                block_slot: anchor.slot,
            });
        }

        let proto_array = ProtoArrayForkChoice::new(
            anchor,
            *fc_store.justified_checkpoint(),
            *fc_store.finalized_checkpoint(),
        )?;

        let mut fork_choice = Self {
            fc_store,
            proto_array,
            queued_attestations: vec![],
            head: None,
            spec,
            log,
        };

        // Compute the initial head so the engine never reports an empty one.
        let current_slot = fork_choice.fc_store.get_current_slot();
        fork_choice.get_head(current_slot)?;

        Ok(fork_choice)
    }

    /// Restore an engine from a persisted snapshot. The store is supplied by the caller, which
    /// persists it alongside the snapshot.
    pub fn from_persisted(
        persisted: PersistedForkChoice,
        fc_store: T,
        spec: ChainSpec,
        log: Logger,
    ) -> Result<Self, Error<T::Error>> {
        let proto_array = ProtoArrayForkChoice::from_bytes(&persisted.proto_array_bytes)
            .map_err(Error::InvalidPersistedBytes)?;

        Ok(Self {
            fc_store,
            proto_array,
            queued_attestations: persisted.queued_attestations,
            head: None,
            spec,
            log,
        })
    }

    pub fn to_persisted(&self) -> PersistedForkChoice {
        PersistedForkChoice {
            proto_array_bytes: self.proto_array.as_bytes(),
            queued_attestations: self.queued_attestations.clone(),
        }
    }

    /// Add `block` to the fork-choice DAG.
    ///
    /// `block_delay` is how long after the start of `block.slot` the block was received, as
    /// measured by the caller's clock; it decides proposer-boost eligibility.
    ///
    /// The block must already have passed state transition; no validity checks beyond
    /// tree-integrity ones happen here.
    pub fn on_block(
        &mut self,
        system_time_current_slot: Slot,
        block: Block,
        block_delay: Duration,
    ) -> Result<(), Error<T::Error>> {
        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_PROCESS_BLOCK_TIMES);

        let current_slot = self.update_time(system_time_current_slot)?;

        let parent_root = block
            .parent_root
            .ok_or(Error::InvalidBlock(InvalidBlock::MissingParent(block.root)))?;

        // The parent must be known. This is the one rejection the import pipeline is expected
        // to handle routinely, by buffering the block until the parent arrives over the network.
        if !self.proto_array.contains_block(&parent_root) {
            return Err(Error::InvalidBlock(InvalidBlock::UnknownParent(parent_root)));
        }

        // Blocks cannot be in the future. If they are, their consideration must be delayed
        // until they are in the past. Presently we do not delay consideration: the caller
        // re-submits.
        if block.slot > current_slot {
            return Err(Error::InvalidBlock(InvalidBlock::FutureSlot {
                current_slot,
                block_slot: block.slot,
            }));
        }

        // Check that the block is later than the finalized epoch slot (optimization to reduce
        // calls to `ancestor_at_slot`).
        let finalized_slot = self
            .fc_store
            .finalized_checkpoint()
            .epoch
            .start_slot(self.spec.slots_per_epoch);
        if block.slot <= finalized_slot {
            return Err(Error::InvalidBlock(InvalidBlock::FinalizedSlot {
                finalized_slot,
                block_slot: block.slot,
            }));
        }

        // Check that the block descends from the finalized root. Since
        // `block.slot > finalized_slot`, searching from the parent is equivalent to searching
        // from the block itself and spares inserting it first.
        let block_ancestor = self.ancestor_at_slot(parent_root, finalized_slot)?;
        let finalized_root = self.fc_store.finalized_checkpoint().root;
        if block_ancestor != Some(finalized_root) {
            return Err(Error::InvalidBlock(InvalidBlock::NotFinalizedDescendant {
                finalized_root,
                block_ancestor,
            }));
        }

        // A block for the current slot seen within the first interval of the slot earns the
        // proposer boost, displacing any previous holder. This is what stops an attacker from
        // stealing the head with a competing block published late in the slot.
        let is_before_attesting_interval =
            block_delay < Duration::from_secs(self.spec.seconds_per_slot / INTERVALS_PER_SLOT);
        if current_slot == block.slot && is_before_attesting_interval {
            self.fc_store.set_proposer_boost_root(block.root);
            self.head = None;
        }

        self.update_checkpoints(block.justified_checkpoint, block.finalized_checkpoint)?;

        // This does not apply a vote to the block, it only makes fork choice aware of it so it
        // can be selected as head even without votes.
        self.proto_array.process_block(block)?;
        self.head = None;

        Ok(())
    }

    /// Register the votes of `attestation` so they may influence future `get_head` calls.
    ///
    /// Weights are never touched here: votes are recorded in the trackers and become binding
    /// during the next head computation. Attestations for the current or a future slot are
    /// queued, since a vote may only affect the fork choice of slots after the one it was cast
    /// in.
    pub fn on_attestation(
        &mut self,
        system_time_current_slot: Slot,
        attestation: AttestationSummary,
    ) -> Result<(), Error<T::Error>> {
        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_PROCESS_ATTESTATION_TIMES);

        self.update_time(system_time_current_slot)?;

        // Ignore votes for the zero hash; attesters that have never seen a block vote for it,
        // and such votes carry no information the tree can use.
        if attestation.beacon_block_root == Hash256::zero() {
            return Ok(());
        }

        // Attestations regularly arrive ahead of their block over gossip. An unknown vote
        // target is not an error; the vote is simply dropped.
        if !self.proto_array.contains_block(&attestation.beacon_block_root) {
            debug!(
                self.log,
                "Ignoring attestation for unknown block";
                "block_root" => ?attestation.beacon_block_root,
                "slot" => %attestation.slot,
            );
            return Ok(());
        }

        if attestation.slot < self.fc_store.get_current_slot() {
            self.apply_attestation_votes(&attestation);
        } else {
            self.queued_attestations.push(attestation);
        }

        Ok(())
    }

    /// Replace the balance snapshot used to weigh votes, typically once per epoch when the
    /// justified state changes. Applied weights change only at the next `get_head`.
    pub fn on_new_balances(&mut self, balances: Vec<u64>) {
        self.fc_store.set_justified_balances(balances);
        self.head = None;
    }

    /// Run the fork-choice rule to determine the canonical head.
    ///
    /// If nothing has changed since the last run, the memoized head is returned. Otherwise all
    /// pending votes are made binding, score changes are applied in one backward pass and the
    /// best-descendant pointers are chased from the justified node.
    pub fn get_head(
        &mut self,
        system_time_current_slot: Slot,
    ) -> Result<HeadInfo, Error<T::Error>> {
        self.update_time(system_time_current_slot)?;

        if let Some(head) = &self.head {
            metrics::inc_counter(&metrics::FORK_CHOICE_HEAD_CACHE_HITS);
            return Ok(head.clone());
        }

        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_FIND_HEAD_TIMES);

        let justified_checkpoint = *self.fc_store.justified_checkpoint();
        let finalized_checkpoint = *self.fc_store.finalized_checkpoint();

        let head_root = self
            .proto_array
            .find_head(
                justified_checkpoint,
                finalized_checkpoint,
                self.fc_store.justified_balances(),
                self.fc_store.proposer_boost_root(),
                &self.spec,
            )
            .map_err(|e| match e {
                proto_array::Error::JustifiedNodeUnknown(root) => {
                    crit!(
                        self.log,
                        "Justified block missing from fork choice";
                        "root" => ?root,
                    );
                    Error::MissingJustifiedBlock {
                        justified_checkpoint,
                    }
                }
                other => Error::ProtoArrayError(other),
            })?;

        let head_block = self
            .proto_array
            .get_block(&head_root)
            .ok_or(Error::MissingProtoArrayBlock(head_root))?;

        let head = HeadInfo {
            root: head_block.root,
            slot: head_block.slot,
            state_root: head_block.state_root,
            parent_root: head_block.parent_root,
        };

        self.head = Some(head.clone());

        Ok(head)
    }

    /// The execution layer confirmed the block's payload: mark it and its ancestors valid.
    pub fn on_valid_execution_payload(
        &mut self,
        block_root: Hash256,
    ) -> Result<(), Error<T::Error>> {
        self.proto_array
            .process_execution_payload_validation(block_root)
            .map_err(Error::ProtoArrayError)
    }

    /// The execution layer rejected the block's payload: remove it and its whole subtree.
    ///
    /// Returns the removed roots so the chain, sync and mempool components can roll back any
    /// state built on them.
    pub fn on_invalid_execution_payload(
        &mut self,
        block_root: Hash256,
    ) -> Result<Vec<Hash256>, Error<T::Error>> {
        let removed = self.proto_array.invalidate_subtree(block_root)?;

        if removed.contains(&self.fc_store.proposer_boost_root()) {
            self.fc_store.set_proposer_boost_root(Hash256::zero());
        }
        self.head = None;

        metrics::inc_counter_by(&metrics::FORK_CHOICE_INVALIDATED_NODES, removed.len() as u64);
        warn!(
            self.log,
            "Invalidated execution payload subtree";
            "block_root" => ?block_root,
            "removed_blocks" => removed.len(),
        );

        Ok(removed)
    }

    /// Prune the block tree to the finalized root. To be called whenever the finalized
    /// checkpoint advances.
    ///
    /// Returns the removed roots for archival/mempool collaborators.
    pub fn prune(&mut self) -> Result<Vec<Hash256>, Error<T::Error>> {
        let finalized_root = self.fc_store.finalized_checkpoint().root;
        let removed = self.proto_array.prune(finalized_root)?;
        self.head = None;

        metrics::inc_counter_by(&metrics::FORK_CHOICE_PRUNED_NODES, removed.len() as u64);
        debug!(
            self.log,
            "Pruned fork choice";
            "finalized_root" => ?finalized_root,
            "removed_blocks" => removed.len(),
        );

        Ok(removed)
    }

    /// Advance the store's clock to `current_slot`, ticking through every intermediate slot, and
    /// apply any queued attestations that became eligible. Returns the store's view of the
    /// current slot, which never decreases.
    pub fn update_time(&mut self, current_slot: Slot) -> Result<Slot, Error<T::Error>> {
        while self.fc_store.get_current_slot() < current_slot {
            let previous_slot = self.fc_store.get_current_slot();
            // `on_tick` updates the store time, so this loop always terminates.
            self.on_tick(previous_slot + 1)?;
        }

        self.process_attestation_queue();

        Ok(self.fc_store.get_current_slot())
    }

    /// Called whenever the current time increases by one slot.
    fn on_tick(&mut self, time: Slot) -> Result<(), Error<T::Error>> {
        let previous_slot = self.fc_store.get_current_slot();

        if time > previous_slot + 1 {
            return Err(Error::InconsistentOnTick {
                previous_slot,
                time,
            });
        }

        self.fc_store.set_current_slot(time);

        // The proposer boost only lives for the slot the block arrived in.
        if time > previous_slot && self.fc_store.proposer_boost_root() != Hash256::zero() {
            self.fc_store.set_proposer_boost_root(Hash256::zero());
            self.head = None;
        }

        Ok(())
    }

    /// Drain and apply queued attestations whose slot has passed.
    fn process_attestation_queue(&mut self) {
        let current_slot = self.fc_store.get_current_slot();
        for attestation in dequeue_attestations(current_slot, &mut self.queued_attestations) {
            self.apply_attestation_votes(&attestation);
        }
    }

    fn apply_attestation_votes(&mut self, attestation: &AttestationSummary) {
        for validator_index in &attestation.attesting_indices {
            self.proto_array.process_attestation(
                *validator_index as usize,
                attestation.beacon_block_root,
                attestation.target.epoch,
            );
        }
        self.head = None;
    }

    /// Advance the store's checkpoints when a block's post-state carries newer ones. Advancing
    /// the finalized checkpoint does not prune; the chain layer calls `prune` explicitly.
    fn update_checkpoints(
        &mut self,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
    ) -> Result<(), Error<T::Error>> {
        if justified_checkpoint.epoch > self.fc_store.justified_checkpoint().epoch {
            self.fc_store
                .set_justified_checkpoint(justified_checkpoint)
                .map_err(Error::UnableToSetJustifiedCheckpoint)?;
            self.head = None;
        }

        if finalized_checkpoint.epoch > self.fc_store.finalized_checkpoint().epoch {
            self.fc_store.set_finalized_checkpoint(finalized_checkpoint);
            self.head = None;
        }

        Ok(())
    }

    /// Returns the block root of the ancestor of `block_root` at `ancestor_slot`. Skipped slots
    /// resolve to the most recent block at or before the requested slot.
    pub fn ancestor_at_slot(
        &self,
        block_root: Hash256,
        ancestor_slot: Slot,
    ) -> Result<Option<Hash256>, Error<T::Error>> {
        let block = self
            .proto_array
            .get_block(&block_root)
            .ok_or(Error::MissingProtoArrayBlock(block_root))?;

        match block.slot.cmp(&ancestor_slot) {
            Ordering::Greater => Ok(self
                .proto_array
                .iter_block_roots(&block_root)
                // Search for a slot that is less than or equal to the target, to account for
                // skipped slots.
                .find(|(_, slot)| *slot <= ancestor_slot)
                .map(|(root, _)| root)),
            // The block is at or before the requested slot already.
            Ordering::Less | Ordering::Equal => Ok(Some(block_root)),
        }
    }

    /// Returns `true` if `descendant_root` has `ancestor_root` as an ancestor (or is equal to
    /// it). Unknown roots yield `false`.
    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.proto_array.is_descendant(ancestor_root, descendant_root)
    }

    /// Returns `true` if the block is known **and** descends from the finalized root. Between a
    /// finality advance and the next `prune`, stale branches may still be present in the tree;
    /// they are not reported here.
    pub fn contains_block(&self, block_root: &Hash256) -> bool {
        self.proto_array.contains_block(block_root)
            && self.is_finalized_checkpoint_or_descendant(*block_root)
    }

    /// Returns the block if it is known **and** descends from the finalized root.
    pub fn get_block(&self, block_root: &Hash256) -> Option<Block> {
        if self.is_finalized_checkpoint_or_descendant(*block_root) {
            self.proto_array.get_block(block_root)
        } else {
            None
        }
    }

    pub fn get_justified_block(&self) -> Result<Block, Error<T::Error>> {
        let justified_checkpoint = *self.fc_store.justified_checkpoint();
        self.proto_array
            .get_block(&justified_checkpoint.root)
            .ok_or(Error::MissingJustifiedBlock {
                justified_checkpoint,
            })
    }

    pub fn get_finalized_block(&self) -> Result<Block, Error<T::Error>> {
        let finalized_checkpoint = *self.fc_store.finalized_checkpoint();
        self.proto_array
            .get_block(&finalized_checkpoint.root)
            .ok_or(Error::MissingFinalizedBlock {
                finalized_checkpoint,
            })
    }

    fn is_finalized_checkpoint_or_descendant(&self, block_root: Hash256) -> bool {
        self.proto_array
            .is_descendant(self.fc_store.finalized_checkpoint().root, block_root)
    }

    /// The memoized head, if it is current. `None` means a mutation has occurred since the last
    /// `get_head`.
    pub fn cached_head(&self) -> Option<&HeadInfo> {
        self.head.as_ref()
    }

    pub fn justified_checkpoint(&self) -> Checkpoint {
        *self.fc_store.justified_checkpoint()
    }

    pub fn finalized_checkpoint(&self) -> Checkpoint {
        *self.fc_store.finalized_checkpoint()
    }

    pub fn queued_attestations(&self) -> &[AttestationSummary] {
        &self.queued_attestations
    }

    pub fn proto_array(&self) -> &ProtoArrayForkChoice {
        &self.proto_array
    }

    pub fn fc_store(&self) -> &T {
        &self.fc_store
    }
}
