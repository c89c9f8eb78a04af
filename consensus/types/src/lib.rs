//! The protocol types shared by the fork-choice crates.
//!
//! This crate deliberately contains only what fork choice needs: slot/epoch arithmetic,
//! checkpoints and the subset of chain configuration that influences head selection.
//! State-transition containers (blocks, states, attestations) live with the collaborators that
//! produce them.

mod chain_spec;
mod checkpoint;
mod slot_epoch;

pub use chain_spec::{ChainSpec, INTERVALS_PER_SLOT};
pub use checkpoint::Checkpoint;
pub use slot_epoch::{Epoch, Slot};

/// A 32-byte block, state or checkpoint root.
///
/// The derived `Ord` on this type (lexicographic over the big-endian bytes) is the total order
/// used to break fork-choice ties between equal-weight blocks. It is consensus-critical and must
/// not change.
pub type Hash256 = ethereum_types::H256;
