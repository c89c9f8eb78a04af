mod error;
pub mod fork_choice_test_definition;
mod proto_array;
mod proto_array_fork_choice;
mod ssz_container;
mod vote_tracker;

pub use crate::proto_array::calculate_proposer_boost;
pub use crate::proto_array_fork_choice::{Block, ExecutionStatus, ProtoArrayForkChoice};
pub use error::{Error, InvalidBestNodeInfo};

pub mod core {
    pub use super::proto_array::{ProposerBoost, ProtoArray, ProtoNode};
    pub use super::ssz_container::SszContainer;
    pub use super::vote_tracker::{ElasticList, VoteTracker};
}
