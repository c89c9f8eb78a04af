mod fork_choice;
mod fork_choice_store;
pub mod metrics;

pub use crate::fork_choice::{
    AttestationSummary, Error, ForkChoice, HeadInfo, InvalidBlock, PersistedForkChoice,
};
pub use fork_choice_store::{ForkChoiceStore, MemoryStore};
pub use proto_array::{Block, ExecutionStatus};
