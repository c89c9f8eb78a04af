use crate::Error;
use beacon_types::{Epoch, Hash256};
use ssz_derive::{Decode, Encode};
use std::collections::HashMap;

/// One validator's latest-message state.
///
/// `current_root` is the vote already reflected in node weights; `next_root` is the most recent
/// observed vote, which becomes binding only when the next delta computation commits it. The
/// split is what lets weight updates cost O(validator count) instead of a full tree rescan.
#[derive(Default, PartialEq, Clone, Debug, Encode, Decode)]
pub struct VoteTracker {
    pub current_root: Hash256,
    pub next_root: Hash256,
    pub next_epoch: Epoch,
}

impl VoteTracker {
    /// Record a new vote if it is at least as recent as the one already held.
    ///
    /// A vote for the same target epoch replaces the previous one: the newest message wins.
    /// Detecting and punishing the equivocation is the slasher's job, not fork choice's.
    pub fn observe(&mut self, block_root: Hash256, target_epoch: Epoch) {
        if target_epoch >= self.next_epoch {
            self.next_root = block_root;
            self.next_epoch = target_epoch;
        }
    }
}

/// A Vec-wrapper which will grow to match any request.
///
/// E.g., a `get_mut` to an out-of-bounds element will cause the Vec to grow (using `Default`) to
/// the smallest size required to fulfill the request. Validator trackers are created lazily on
/// their first vote and never deleted.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct ElasticList<T>(pub Vec<T>);

impl<T> ElasticList<T>
where
    T: Default,
{
    fn ensure(&mut self, i: usize) {
        if self.0.len() <= i {
            self.0.resize_with(i + 1, Default::default);
        }
    }

    pub fn get_mut(&mut self, i: usize) -> &mut T {
        self.ensure(i);
        &mut self.0[i]
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

/// Returns a list of `deltas`, one for each index in `0..indices.len()`.
///
/// A delta is formed by a change between `old_balances` and `new_balances`, and/or a change of
/// vote in `votes`; every touched tracker commits `current_root = next_root`. Votes for roots
/// that are not in `indices` are assumed to be outside the tree (pre-finalization or removed by
/// invalidation) and are skipped.
pub fn compute_deltas(
    indices: &HashMap<Hash256, usize>,
    votes: &mut ElasticList<VoteTracker>,
    old_balances: &[u64],
    new_balances: &[u64],
) -> Result<Vec<i64>, Error> {
    let mut deltas = vec![0_i64; indices.len()];

    for (val_index, vote) in votes.iter_mut().enumerate() {
        // The validator has never voted, or both votes are for the zero hash (an alias to the
        // genesis block); there is no score change to make.
        if vote.current_root == Hash256::zero() && vote.next_root == Hash256::zero() {
            continue;
        }

        // Validators absent from a balances snapshot (not yet onboarded on this fork, or exited)
        // count as zero.
        let old_balance = old_balances.get(val_index).copied().unwrap_or(0);
        let new_balance = new_balances.get(val_index).copied().unwrap_or(0);

        if vote.current_root != vote.next_root || old_balance != new_balance {
            if let Some(current_delta_index) = indices.get(&vote.current_root).copied() {
                let delta = deltas
                    .get(current_delta_index)
                    .ok_or(Error::InvalidNodeDelta(current_delta_index))?
                    .checked_sub(old_balance as i64)
                    .ok_or(Error::DeltaOverflow(current_delta_index))?;

                // Array access safe due to check above.
                deltas[current_delta_index] = delta;
            }

            if let Some(next_delta_index) = indices.get(&vote.next_root).copied() {
                let delta = deltas
                    .get(next_delta_index)
                    .ok_or(Error::InvalidNodeDelta(next_delta_index))?
                    .checked_add(new_balance as i64)
                    .ok_or(Error::DeltaOverflow(next_delta_index))?;

                // Array access safe due to check above.
                deltas[next_delta_index] = delta;
            }

            vote.current_root = vote.next_root;
        }
    }

    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(i: u64) -> Hash256 {
        Hash256::from_low_u64_be(i + 1)
    }

    /// An index map over `count` roots, `root(i) -> i`.
    fn indices(count: usize) -> HashMap<Hash256, usize> {
        (0..count).map(|i| (root(i as u64), i)).collect()
    }

    fn voted(current: Hash256, next: Hash256) -> VoteTracker {
        VoteTracker {
            current_root: current,
            next_root: next,
            next_epoch: Epoch::new(0),
        }
    }

    #[test]
    fn fresh_votes_apply_the_whole_balance() {
        let indices = indices(2);
        let mut votes = ElasticList(vec![
            voted(Hash256::zero(), root(1)),
            voted(Hash256::zero(), root(1)),
        ]);
        let balances = vec![5, 7];

        let deltas = compute_deltas(&indices, &mut votes, &balances, &balances)
            .expect("deltas should compute");

        assert_eq!(deltas, vec![0, 12]);
        for vote in votes.0 {
            assert_eq!(vote.current_root, vote.next_root, "the vote was committed");
        }
    }

    #[test]
    fn a_moved_vote_shifts_the_balance() {
        let indices = indices(2);
        let mut votes = ElasticList(vec![voted(root(0), root(1))]);
        let balances = vec![9];

        let deltas = compute_deltas(&indices, &mut votes, &balances, &balances)
            .expect("deltas should compute");

        assert_eq!(deltas, vec![-9, 9]);
    }

    #[test]
    fn an_unchanged_vote_with_changed_balance_reweighs() {
        let indices = indices(1);
        let mut votes = ElasticList(vec![voted(root(0), root(0))]);

        let deltas = compute_deltas(&indices, &mut votes, &[4], &[10])
            .expect("deltas should compute");

        // Old balance out, new balance in, on the same node.
        assert_eq!(deltas, vec![6]);
    }

    #[test]
    fn votes_outside_the_tree_are_skipped() {
        let indices = indices(1);
        let mut votes = ElasticList(vec![
            // Moving to the zero hash: only the subtraction lands.
            voted(root(0), Hash256::zero()),
            // Moving in from an unknown (e.g. invalidated) root: only the addition lands.
            voted(root(99), root(0)),
        ]);
        let balances = vec![3, 3];

        let deltas = compute_deltas(&indices, &mut votes, &balances, &balances)
            .expect("deltas should compute");

        assert_eq!(deltas, vec![0]);
        for vote in votes.0 {
            assert_eq!(vote.current_root, vote.next_root, "the vote was committed");
        }
    }

    #[test]
    fn appearing_and_disappearing_validators_use_zero_balances() {
        let indices = indices(2);
        let mut votes = ElasticList(vec![voted(root(0), root(1)), voted(root(0), root(1))]);

        // Validator 1 exists only in the new balances; validator 0 only in the old.
        let deltas = compute_deltas(&indices, &mut votes, &[6], &[0, 6])
            .expect("deltas should compute");

        assert_eq!(deltas, vec![-6, 6]);
    }

    #[test]
    fn same_epoch_vote_switch_is_accepted() {
        let mut vote = VoteTracker::default();
        vote.observe(root(0), Epoch::new(1));
        vote.observe(root(1), Epoch::new(1));

        assert_eq!(vote.next_root, root(1), "the newest message wins");

        // An older target epoch does not displace the vote.
        vote.observe(root(2), Epoch::new(0));
        assert_eq!(vote.next_root, root(1));
    }
}
