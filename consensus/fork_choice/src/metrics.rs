pub use metrics::*;
use std::sync::LazyLock;

use crate::{ForkChoice, ForkChoiceStore};

pub static FORK_CHOICE_NODES: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge("fork_choice_nodes", "Current count of proto array nodes")
});
pub static FORK_CHOICE_QUEUED_ATTESTATIONS: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "fork_choice_queued_attestations",
        "Current count of queued attestations",
    )
});
pub static FORK_CHOICE_HEAD_CACHE_HITS: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "fork_choice_head_cache_hits_total",
        "Total count of get_head calls served from the memoized head",
    )
});
pub static FORK_CHOICE_PRUNED_NODES: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "fork_choice_pruned_nodes_total",
        "Total count of nodes removed by pruning",
    )
});
pub static FORK_CHOICE_INVALIDATED_NODES: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "fork_choice_invalidated_nodes_total",
        "Total count of nodes removed after an invalid execution payload",
    )
});
pub static FORK_CHOICE_PROCESS_BLOCK_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "fork_choice_process_block_seconds",
        "The duration in seconds of on_block runs",
    )
});
pub static FORK_CHOICE_PROCESS_ATTESTATION_TIMES: LazyLock<Result<Histogram>> =
    LazyLock::new(|| {
        try_create_histogram(
            "fork_choice_process_attestation_seconds",
            "The duration in seconds of on_attestation runs",
        )
    });
pub static FORK_CHOICE_FIND_HEAD_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "fork_choice_find_head_seconds",
        "The duration in seconds of full (non-memoized) head recomputations",
    )
});

/// Update the global metrics registry with info from the fork choice.
pub fn scrape_for_metrics<T: ForkChoiceStore>(fork_choice: &ForkChoice<T>) {
    set_gauge(
        &FORK_CHOICE_NODES,
        fork_choice.proto_array().len() as i64,
    );
    set_gauge(
        &FORK_CHOICE_QUEUED_ATTESTATIONS,
        fork_choice.queued_attestations().len() as i64,
    );
}
