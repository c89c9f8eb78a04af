use beacon_types::{Checkpoint, Hash256, Slot};

/// Approximates the `Store` object in the consensus specification's fork-choice document.
///
/// The chain layer implements this trait to own the pieces of fork-choice state that outlive the
/// engine or need to be persisted alongside other chain data: the clock, the current
/// checkpoints, the justified-state balance snapshot and the proposer-boost root. The block DAG
/// itself lives in the engine's proto-array.
pub trait ForkChoiceStore: Sized {
    type Error: std::fmt::Debug;

    /// Returns the last slot passed to `set_current_slot`.
    fn get_current_slot(&self) -> Slot;

    /// Should only ever be called from within `ForkChoice::on_tick`.
    fn set_current_slot(&mut self, slot: Slot);

    fn justified_checkpoint(&self) -> &Checkpoint;

    /// May fail if the implementer cannot make the state at the new checkpoint available (e.g.,
    /// balances cannot be loaded).
    fn set_justified_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<(), Self::Error>;

    fn finalized_checkpoint(&self) -> &Checkpoint;

    fn set_finalized_checkpoint(&mut self, checkpoint: Checkpoint);

    /// The effective balances of the validator set at the justified state, indexed by validator.
    /// Inactive validators hold a zero balance.
    fn justified_balances(&self) -> &[u64];

    /// Replace the balance snapshot wholesale. Applied weights change only at the next
    /// `ForkChoice::get_head`.
    fn set_justified_balances(&mut self, balances: Vec<u64>);

    /// The root holding the proposer boost, or the zero hash when no boost is active.
    fn proposer_boost_root(&self) -> Hash256;

    fn set_proposer_boost_root(&mut self, root: Hash256);
}

/// A self-contained `ForkChoiceStore` for tests and simple embeddings that have no persistence
/// requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStore {
    current_slot: Slot,
    justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,
    justified_balances: Vec<u64>,
    proposer_boost_root: Hash256,
}

impl MemoryStore {
    pub fn new(
        current_slot: Slot,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
    ) -> Self {
        Self {
            current_slot,
            justified_checkpoint,
            finalized_checkpoint,
            justified_balances: vec![],
            proposer_boost_root: Hash256::zero(),
        }
    }
}

impl ForkChoiceStore for MemoryStore {
    type Error = std::convert::Infallible;

    fn get_current_slot(&self) -> Slot {
        self.current_slot
    }

    fn set_current_slot(&mut self, slot: Slot) {
        self.current_slot = slot;
    }

    fn justified_checkpoint(&self) -> &Checkpoint {
        &self.justified_checkpoint
    }

    fn set_justified_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<(), Self::Error> {
        self.justified_checkpoint = checkpoint;
        Ok(())
    }

    fn finalized_checkpoint(&self) -> &Checkpoint {
        &self.finalized_checkpoint
    }

    fn set_finalized_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.finalized_checkpoint = checkpoint;
    }

    fn justified_balances(&self) -> &[u64] {
        &self.justified_balances
    }

    fn set_justified_balances(&mut self, balances: Vec<u64>) {
        self.justified_balances = balances;
    }

    fn proposer_boost_root(&self) -> Hash256 {
        self.proposer_boost_root
    }

    fn set_proposer_boost_root(&mut self, root: Hash256) {
        self.proposer_boost_root = root;
    }
}
