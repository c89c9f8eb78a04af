use crate::error::InvalidBestNodeInfo;
use crate::proto_array_fork_choice::{Block, ExecutionStatus};
use crate::Error;
use beacon_types::{ChainSpec, Checkpoint, Epoch, Hash256, Slot};
use serde_derive::{Deserialize, Serialize};
use ssz::four_byte_option_impl;
use ssz_derive::{Decode, Encode};
use std::collections::HashMap;

// Define a "legacy" implementation of `Option<usize>` which uses four bytes for encoding the
// union selector.
four_byte_option_impl!(four_byte_option_usize, usize);

/// A block-tree node.
///
/// One `ProtoNode` exists per known block. Nodes are append-only and addressed by their index in
/// `ProtoArray::nodes`; a node's parent always has a smaller index than the node itself.
#[derive(Clone, PartialEq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct ProtoNode {
    pub slot: Slot,
    pub root: Hash256,
    /// Exists for upstream components (duty computation, API); `ProtoArray` itself never reads
    /// it.
    pub state_root: Hash256,
    /// The root that an LMD vote cast for this block would use as its attestation target.
    pub target_root: Hash256,
    #[ssz(with = "four_byte_option_usize")]
    pub parent: Option<usize>,
    /// The justified checkpoint computed by this block's post-state.
    pub justified_checkpoint: Checkpoint,
    /// The finalized checkpoint computed by this block's post-state.
    pub finalized_checkpoint: Checkpoint,
    pub weight: u64,
    #[ssz(with = "four_byte_option_usize")]
    pub best_child: Option<usize>,
    #[ssz(with = "four_byte_option_usize")]
    pub best_descendant: Option<usize>,
    pub execution_status: ExecutionStatus,
}

/// The score bonus applied to the most recent timely block, so it can be subtracted again once
/// the boost moves on or expires.
#[derive(Default, PartialEq, Debug, Encode, Decode, Serialize, Deserialize, Copy, Clone)]
pub struct ProposerBoost {
    pub root: Hash256,
    pub score: u64,
}

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct ProtoArray {
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub nodes: Vec<ProtoNode>,
    pub indices: HashMap<Hash256, usize>,
    pub previous_proposer_boost: ProposerBoost,
}

impl ProtoArray {
    /// Register a block with the store.
    ///
    /// Only the anchor (the first block inserted) may omit a parent root. A block whose parent
    /// is not yet known is rejected with `Error::UnknownParent` and nothing is mutated; the
    /// caller buffers it until the parent arrives.
    pub fn on_block(&mut self, block: Block) -> Result<(), Error> {
        // If the block is already known, simply ignore it.
        if self.indices.contains_key(&block.root) {
            return Ok(());
        }

        let parent = match block.parent_root {
            Some(parent_root) => Some(
                *self
                    .indices
                    .get(&parent_root)
                    .ok_or(Error::UnknownParent {
                        block_root: block.root,
                        parent_root,
                    })?,
            ),
            None if self.nodes.is_empty() => None,
            None => {
                return Err(Error::UnknownParent {
                    block_root: block.root,
                    parent_root: Hash256::zero(),
                })
            }
        };

        let node_index = self.nodes.len();

        let node = ProtoNode {
            slot: block.slot,
            root: block.root,
            state_root: block.state_root,
            target_root: block.target_root,
            parent,
            justified_checkpoint: block.justified_checkpoint,
            finalized_checkpoint: block.finalized_checkpoint,
            weight: 0,
            best_child: None,
            best_descendant: None,
            execution_status: block.execution_status,
        };

        self.indices.insert(node.root, node_index);
        self.nodes.push(node);

        if let Some(parent_index) = parent {
            self.maybe_update_best_child_and_descendant(parent_index, node_index)?;

            if block.execution_status.is_valid() {
                // Any ancestor of an already-valid payload is itself valid.
                self.propagate_execution_payload_validation_by_index(parent_index)?;
            }
        }

        Ok(())
    }

    /// Iterate backwards through the array, touching all nodes and their parents and potentially
    /// the best-child of each parent.
    ///
    /// The structure of the `self.nodes` array ensures that the child of each node is always
    /// touched before its parent, so a node's weight is final before it is folded into the
    /// parent. This single backward pass is what makes score application O(n).
    ///
    /// For each node:
    ///
    /// - Apply the proposer-boost adjustment (subtract the previous boost, add the new one).
    /// - Update the node's weight with the corresponding delta.
    /// - Back-propagate the node's delta to its parent's delta.
    pub fn apply_score_changes(
        &mut self,
        mut deltas: Vec<i64>,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        new_balances: &[u64],
        proposer_boost_root: Hash256,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        if deltas.len() != self.indices.len() {
            return Err(Error::InvalidDeltaLen {
                deltas: deltas.len(),
                indices: self.indices.len(),
            });
        }

        if justified_checkpoint != self.justified_checkpoint
            || finalized_checkpoint != self.finalized_checkpoint
        {
            self.justified_checkpoint = justified_checkpoint;
            self.finalized_checkpoint = finalized_checkpoint;
        }

        let mut proposer_score = 0;

        for node_index in (0..self.nodes.len()).rev() {
            let node = self
                .nodes
                .get_mut(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?;

            let mut node_delta = deltas
                .get(node_index)
                .copied()
                .ok_or(Error::InvalidNodeDelta(node_index))?;

            // If this is the node the boost was previously applied to, take the old score back.
            if self.previous_proposer_boost.root != Hash256::zero()
                && self.previous_proposer_boost.root == node.root
            {
                node_delta = node_delta
                    .checked_sub(self.previous_proposer_boost.score as i64)
                    .ok_or(Error::DeltaOverflow(node_index))?;
            }
            // If this is the node currently holding the boost, add the new score.
            if let Some(proposer_score_boost) = spec.proposer_score_boost {
                if proposer_boost_root != Hash256::zero() && proposer_boost_root == node.root {
                    proposer_score = calculate_proposer_boost(new_balances, proposer_score_boost)
                        .ok_or(Error::ProposerBoostOverflow(node_index))?;
                    node_delta = node_delta
                        .checked_add(proposer_score as i64)
                        .ok_or(Error::DeltaOverflow(node_index))?;
                }
            }

            // A negative delta larger than the node's weight means the bookkeeping is corrupt;
            // fail fast rather than saturate into a plausible-looking head.
            if node_delta < 0 {
                node.weight = node
                    .weight
                    .checked_sub(node_delta.unsigned_abs())
                    .ok_or(Error::DeltaOverflow(node_index))?;
            } else {
                node.weight = node
                    .weight
                    .checked_add(node_delta as u64)
                    .ok_or(Error::DeltaOverflow(node_index))?;
            }

            if let Some(parent_index) = node.parent {
                let parent_delta = deltas
                    .get_mut(parent_index)
                    .ok_or(Error::InvalidParentDelta(parent_index))?;

                *parent_delta += node_delta;
            }
        }

        self.previous_proposer_boost = ProposerBoost {
            root: proposer_boost_root,
            score: proposer_score,
        };

        // Best-child/best-descendant pointers are only refreshed once every weight is final;
        // interleaving the two passes would elect children against stale parent weights.
        self.update_best_descendants()
    }

    /// A second reverse pass over the array, re-electing each parent's best child and
    /// best descendant against the current weights and viability.
    fn update_best_descendants(&mut self) -> Result<(), Error> {
        for node_index in (0..self.nodes.len()).rev() {
            let parent = self
                .nodes
                .get(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?
                .parent;

            if let Some(parent_index) = parent {
                self.maybe_update_best_child_and_descendant(parent_index, node_index)?;
            }
        }

        Ok(())
    }

    /// Follows the best-descendant links to find the best block (i.e., the head block).
    ///
    /// ## Notes
    ///
    /// The result of this function is only accurate if `Self::apply_score_changes` has run since
    /// the last mutation; `on_block` alone does not walk backwards through the tree updating the
    /// cached pointers.
    pub fn find_head(&self, justified_root: &Hash256) -> Result<Hash256, Error> {
        let justified_index = self
            .indices
            .get(justified_root)
            .copied()
            .ok_or(Error::JustifiedNodeUnknown(*justified_root))?;

        let justified_node = self
            .nodes
            .get(justified_index)
            .ok_or(Error::InvalidJustifiedIndex(justified_index))?;

        let best_descendant_index = justified_node.best_descendant.unwrap_or(justified_index);

        let best_node = self
            .nodes
            .get(best_descendant_index)
            .ok_or(Error::InvalidBestDescendant(best_descendant_index))?;

        // Sanity check: the cached pointers must never lead to a non-viable head. If they do,
        // the store is corrupt and continuing would risk selecting a finality-reverting head.
        if !self.node_is_viable_for_head(best_node) {
            return Err(Error::InvalidBestNode(Box::new(InvalidBestNodeInfo {
                start_root: *justified_root,
                justified_checkpoint: self.justified_checkpoint,
                finalized_checkpoint: self.finalized_checkpoint,
                head_root: best_node.root,
                head_justified_checkpoint: best_node.justified_checkpoint,
                head_finalized_checkpoint: best_node.finalized_checkpoint,
            })));
        }

        Ok(best_node.root)
    }

    /// Remove every node that is not `finalized_root` or one of its descendants, compacting the
    /// array and rebuilding the root-to-index map.
    ///
    /// Must only be called when the finalized checkpoint advances. Returns the removed roots so
    /// that archival and mempool collaborators can react.
    pub fn prune(&mut self, finalized_root: Hash256) -> Result<Vec<Hash256>, Error> {
        let finalized_index = *self
            .indices
            .get(&finalized_root)
            .ok_or(Error::FinalizedNodeUnknown(finalized_root))?;

        let mut remove = vec![true; self.nodes.len()];
        remove[finalized_index] = false;

        // Children always carry a larger index than their parent, so one forward sweep marks the
        // whole retained subtree.
        for node_index in (finalized_index + 1)..self.nodes.len() {
            if let Some(parent_index) = self
                .nodes
                .get(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?
                .parent
            {
                if !remove[parent_index] {
                    remove[node_index] = false;
                }
            }
        }

        if remove.iter().all(|flagged| !flagged) {
            return Ok(vec![]);
        }

        let removed_roots = self.remove_nodes(&remove)?;
        self.update_best_descendants()?;

        Ok(removed_roots)
    }

    /// Remove `root` and its entire subtree, e.g. because the execution layer reported the block
    /// invalid. Returns the removed roots.
    ///
    /// The subtree's accumulated weight is subtracted from every remaining ancestor, so the
    /// weights of the surviving tree stay consistent with the applied votes; votes that pointed
    /// into the removed subtree are subsequently treated as out-of-tree by the delta
    /// computation.
    pub fn invalidate_subtree(&mut self, root: Hash256) -> Result<Vec<Hash256>, Error> {
        let index = *self.indices.get(&root).ok_or(Error::NodeUnknown(root))?;

        let subtree_root = self.nodes.get(index).ok_or(Error::InvalidNodeIndex(index))?;
        if subtree_root.parent.is_none() {
            return Err(Error::InvalidatingFinalizedRoot(root));
        }

        // An execution layer may never flip a block it has declared valid; that is a consensus
        // failure on its behalf.
        if subtree_root.execution_status.is_valid() {
            return Err(Error::ValidExecutionStatusBecameInvalid { block_root: root });
        }

        let mut remove = vec![false; self.nodes.len()];
        remove[index] = true;

        for node_index in (index + 1)..self.nodes.len() {
            let node = self
                .nodes
                .get(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?;

            if let Some(parent_index) = node.parent {
                if remove[parent_index] {
                    if node.execution_status.is_valid() {
                        return Err(Error::ValidExecutionStatusBecameInvalid {
                            block_root: node.root,
                        });
                    }
                    remove[node_index] = true;
                }
            }
        }

        // `weight` aggregates the whole subtree, so removing the subtree means taking exactly
        // that amount off each remaining ancestor.
        let subtree_weight = self
            .nodes
            .get(index)
            .ok_or(Error::InvalidNodeIndex(index))?
            .weight;
        let mut ancestor = self
            .nodes
            .get(index)
            .ok_or(Error::InvalidNodeIndex(index))?
            .parent;
        while let Some(ancestor_index) = ancestor {
            let node = self
                .nodes
                .get_mut(ancestor_index)
                .ok_or(Error::InvalidNodeIndex(ancestor_index))?;
            node.weight = node
                .weight
                .checked_sub(subtree_weight)
                .ok_or(Error::DeltaOverflow(ancestor_index))?;
            ancestor = node.parent;
        }

        let removed_roots = self.remove_nodes(&remove)?;
        self.update_best_descendants()?;

        Ok(removed_roots)
    }

    /// Drop every node whose `remove` flag is set, compacting `self.nodes`, remapping all
    /// indices and clearing pointers into the removed set. Returns the removed roots in
    /// insertion order.
    fn remove_nodes(&mut self, remove: &[bool]) -> Result<Vec<Hash256>, Error> {
        let mut new_indices = vec![None; self.nodes.len()];
        let mut next_index = 0_usize;
        for (node_index, flagged) in remove.iter().enumerate() {
            if !flagged {
                new_indices[node_index] = Some(next_index);
                next_index += 1;
            }
        }

        let remap = |index: Option<usize>| -> Option<usize> {
            index.and_then(|i| new_indices.get(i).copied().flatten())
        };

        let mut removed_roots = Vec::new();
        let old_nodes = std::mem::take(&mut self.nodes);
        self.nodes = Vec::with_capacity(next_index);

        for (node_index, mut node) in old_nodes.into_iter().enumerate() {
            if remove[node_index] {
                self.indices.remove(&node.root);
                removed_roots.push(node.root);
                continue;
            }

            node.parent = remap(node.parent);
            // Pointers into the removed set are cleared here and re-elected by the caller's
            // `update_best_descendants` pass.
            node.best_child = remap(node.best_child);
            node.best_descendant = remap(node.best_descendant);
            self.nodes.push(node);
        }

        for index in self.indices.values_mut() {
            *index = new_indices
                .get(*index)
                .copied()
                .flatten()
                .ok_or(Error::IndexOverflow("indices"))?;
        }

        // If the boosted block went with the removed set, its score went with it.
        if !self
            .indices
            .contains_key(&self.previous_proposer_boost.root)
        {
            self.previous_proposer_boost = ProposerBoost::default();
        }

        Ok(removed_roots)
    }

    /// Observe the parent at `parent_index` with respect to the child at `child_index` and
    /// potentially modify the `parent.best_child` and `parent.best_descendant` values.
    ///
    /// There are four outcomes:
    ///
    /// - The child is already the best child but is now non-viable and must be removed.
    /// - The child is already the best child and the parent is updated with the new
    ///   best descendant.
    /// - The child is not the best child but becomes the best child.
    /// - The child is not the best child and does not become the best child.
    fn maybe_update_best_child_and_descendant(
        &mut self,
        parent_index: usize,
        child_index: usize,
    ) -> Result<(), Error> {
        let child = self
            .nodes
            .get(child_index)
            .ok_or(Error::InvalidNodeIndex(child_index))?;

        let parent = self
            .nodes
            .get(parent_index)
            .ok_or(Error::InvalidNodeIndex(parent_index))?;

        let child_leads_to_viable_head = self.node_leads_to_viable_head(child)?;

        // Aliases for the three values `(parent.best_child, parent.best_descendant)` may be set
        // to.
        let change_to_none = (None, None);
        let change_to_child = (
            Some(child_index),
            child.best_descendant.or(Some(child_index)),
        );
        let no_change = (parent.best_child, parent.best_descendant);

        let (new_best_child, new_best_descendant) =
            if let Some(best_child_index) = parent.best_child {
                if best_child_index == child_index && !child_leads_to_viable_head {
                    // The child is already the best child of the parent but is no longer viable
                    // for the head.
                    change_to_none
                } else if best_child_index == child_index {
                    // Re-elect the child to pick up its updated best descendant.
                    change_to_child
                } else {
                    let best_child = self
                        .nodes
                        .get(best_child_index)
                        .ok_or(Error::InvalidBestDescendant(best_child_index))?;

                    let best_child_leads_to_viable_head =
                        self.node_leads_to_viable_head(best_child)?;

                    if child_leads_to_viable_head && !best_child_leads_to_viable_head {
                        change_to_child
                    } else if !child_leads_to_viable_head && best_child_leads_to_viable_head {
                        no_change
                    } else if child.weight == best_child.weight {
                        // Tie-break equal weights by the fixed byte order on roots. This order
                        // must match all other implementations bit-for-bit; it decides the
                        // canonical head network-wide when forks carry identical support.
                        if child.root > best_child.root {
                            change_to_child
                        } else {
                            no_change
                        }
                    } else if child.weight > best_child.weight {
                        change_to_child
                    } else {
                        no_change
                    }
                }
            } else if child_leads_to_viable_head {
                change_to_child
            } else {
                no_change
            };

        let parent = self
            .nodes
            .get_mut(parent_index)
            .ok_or(Error::InvalidNodeIndex(parent_index))?;

        parent.best_child = new_best_child;
        parent.best_descendant = new_best_descendant;

        Ok(())
    }

    /// Indicates if the node itself is viable for the head, or if its best descendant is.
    fn node_leads_to_viable_head(&self, node: &ProtoNode) -> Result<bool, Error> {
        let best_descendant_is_viable_for_head =
            if let Some(best_descendant_index) = node.best_descendant {
                let best_descendant = self
                    .nodes
                    .get(best_descendant_index)
                    .ok_or(Error::InvalidBestDescendant(best_descendant_index))?;

                self.node_is_viable_for_head(best_descendant)
            } else {
                false
            };

        Ok(best_descendant_is_viable_for_head || self.node_is_viable_for_head(node))
    }

    /// A node may only be the head if the checkpoints its post-state computed agree with the
    /// store's current checkpoints (a store checkpoint still at the genesis epoch matches
    /// anything). Excluding mismatched nodes from best-child competition is what guarantees fork
    /// choice can never select a head that would revert finality.
    fn node_is_viable_for_head(&self, node: &ProtoNode) -> bool {
        if node.execution_status.is_invalid() {
            return false;
        }

        let genesis_epoch = Epoch::new(0);

        let correct_justified = node.justified_checkpoint == self.justified_checkpoint
            || self.justified_checkpoint.epoch == genesis_epoch;
        let correct_finalized = node.finalized_checkpoint == self.finalized_checkpoint
            || self.finalized_checkpoint.epoch == genesis_epoch;

        correct_justified && correct_finalized
    }

    /// Updates `block_root` and all its ancestors to have validated execution payloads.
    ///
    /// Returns an error if the `block_root` is unknown or an ancestor is already invalid.
    pub fn propagate_execution_payload_validation(
        &mut self,
        block_root: Hash256,
    ) -> Result<(), Error> {
        let index = *self
            .indices
            .get(&block_root)
            .ok_or(Error::NodeUnknown(block_root))?;
        self.propagate_execution_payload_validation_by_index(index)
    }

    fn propagate_execution_payload_validation_by_index(
        &mut self,
        verified_node_index: usize,
    ) -> Result<(), Error> {
        let mut index = verified_node_index;
        loop {
            let node = self
                .nodes
                .get_mut(index)
                .ok_or(Error::InvalidNodeIndex(index))?;

            match node.execution_status {
                // All ancestors of an already-valid node were set to valid when it was; no need
                // to walk further.
                ExecutionStatus::Valid => return Ok(()),
                ExecutionStatus::Optimistic | ExecutionStatus::Syncing => {
                    node.execution_status = ExecutionStatus::Valid;
                    match node.parent {
                        Some(parent_index) => index = parent_index,
                        None => return Ok(()),
                    }
                }
                // Invalid nodes are removed from the tree as soon as they are reported, so
                // meeting one here means the store is corrupt.
                ExecutionStatus::Invalid => {
                    return Err(Error::InvalidAncestorOfValidPayload {
                        ancestor_block_root: node.root,
                    })
                }
            }
        }
    }

    /// Return a reverse iterator over the nodes which comprise the chain ending at `block_root`.
    pub fn iter_nodes<'a>(&'a self, block_root: &Hash256) -> Iter<'a> {
        let next_node_index = self.indices.get(block_root).copied();
        Iter {
            next_node_index,
            proto_array: self,
        }
    }

    /// Return a reverse iterator over the block roots of the chain ending at `block_root`.
    ///
    /// Note that unlike many other iterators, this one will not yield anything at skipped slots.
    pub fn iter_block_roots<'a>(
        &'a self,
        block_root: &Hash256,
    ) -> impl Iterator<Item = (Hash256, Slot)> + 'a {
        self.iter_nodes(block_root).map(|node| (node.root, node.slot))
    }

    /// Returns `true` if `descendant_root` has an ancestor with `ancestor_root`. Always returns
    /// `false` if either input root is unknown.
    ///
    /// Still returns `true` if `ancestor_root` is known and `ancestor_root == descendant_root`.
    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.indices
            .get(&ancestor_root)
            .and_then(|ancestor_index| self.nodes.get(*ancestor_index))
            .map(|ancestor| {
                self.iter_nodes(&descendant_root)
                    .take_while(|node| node.slot >= ancestor.slot)
                    .any(|node| node.root == ancestor_root)
            })
            .unwrap_or(false)
    }
}

/// Computes the score bonus awarded to a timely block proposal: a fixed percentage of the total
/// active balance. Inactive validators are stored with a zero balance, so filtering zeroes
/// yields the active total.
///
/// Returns `None` on arithmetic overflow.
pub fn calculate_proposer_boost(
    validator_balances: &[u64],
    proposer_score_boost: u64,
) -> Option<u64> {
    let mut total_balance: u64 = 0;
    for &balance in validator_balances {
        if balance != 0 {
            total_balance = total_balance.checked_add(balance)?;
        }
    }
    total_balance
        .checked_mul(proposer_score_boost)?
        .checked_div(100)
}

/// Reverse iterator over one path through a `ProtoArray`.
pub struct Iter<'a> {
    next_node_index: Option<usize>,
    proto_array: &'a ProtoArray,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ProtoNode;

    fn next(&mut self) -> Option<Self::Item> {
        let next_node_index = self.next_node_index?;
        let node = self.proto_array.nodes.get(next_node_index)?;
        self.next_node_index = node.parent;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(i: u64) -> Hash256 {
        Hash256::from_low_u64_be(i + 1)
    }

    fn genesis_checkpoint() -> Checkpoint {
        Checkpoint {
            epoch: Epoch::new(0),
            root: root(0),
        }
    }

    fn block(slot: u64, block_root: Hash256, parent_root: Option<Hash256>) -> Block {
        Block {
            slot: Slot::new(slot),
            root: block_root,
            parent_root,
            state_root: Hash256::zero(),
            target_root: Hash256::zero(),
            justified_checkpoint: genesis_checkpoint(),
            finalized_checkpoint: genesis_checkpoint(),
            execution_status: ExecutionStatus::Optimistic,
        }
    }

    fn empty_array() -> ProtoArray {
        let mut array = ProtoArray {
            justified_checkpoint: genesis_checkpoint(),
            finalized_checkpoint: genesis_checkpoint(),
            nodes: vec![],
            indices: HashMap::new(),
            previous_proposer_boost: ProposerBoost::default(),
        };
        array
            .on_block(block(0, root(0), None))
            .expect("anchor insertion succeeds");
        array
    }

    fn apply_zero_deltas(array: &mut ProtoArray) {
        let deltas = vec![0; array.indices.len()];
        array
            .apply_score_changes(
                deltas,
                array.justified_checkpoint,
                array.finalized_checkpoint,
                &[],
                Hash256::zero(),
                &ChainSpec::mainnet(),
            )
            .expect("zero deltas apply cleanly");
    }

    #[test]
    fn unknown_parent_is_rejected_without_mutation() {
        let mut array = empty_array();

        let orphan = block(2, root(7), Some(root(6)));
        assert_eq!(
            array.on_block(orphan),
            Err(Error::UnknownParent {
                block_root: root(7),
                parent_root: root(6),
            })
        );
        assert_eq!(array.nodes.len(), 1);
        assert!(!array.indices.contains_key(&root(7)));
    }

    #[test]
    fn equal_weight_tie_breaks_by_greater_root() {
        // Insert the two siblings in both orders; the winner must not depend on arrival order.
        for (first, second) in [(root(1), root(2)), (root(2), root(1))] {
            let mut array = empty_array();
            array.on_block(block(1, first, Some(root(0)))).unwrap();
            array.on_block(block(1, second, Some(root(0)))).unwrap();
            apply_zero_deltas(&mut array);

            let head = array.find_head(&root(0)).expect("head exists");
            assert_eq!(head, root(2), "the greater root must win the tie");
        }
    }

    #[test]
    fn is_descendant_walks_parents() {
        let mut array = empty_array();
        array.on_block(block(1, root(1), Some(root(0)))).unwrap();
        array.on_block(block(2, root(2), Some(root(1)))).unwrap();
        array.on_block(block(1, root(3), Some(root(0)))).unwrap();

        assert!(array.is_descendant(root(0), root(2)));
        assert!(array.is_descendant(root(1), root(2)));
        assert!(array.is_descendant(root(2), root(2)));
        assert!(!array.is_descendant(root(1), root(3)));
        assert!(!array.is_descendant(root(9), root(2)));
        assert!(!array.is_descendant(root(1), root(9)));
    }

    #[test]
    fn prune_retains_only_finalized_descendants() {
        let mut array = empty_array();
        array.on_block(block(1, root(1), Some(root(0)))).unwrap();
        array.on_block(block(1, root(2), Some(root(0)))).unwrap();
        array.on_block(block(2, root(3), Some(root(1)))).unwrap();
        apply_zero_deltas(&mut array);

        let removed = array.prune(root(1)).expect("prune succeeds");

        assert_eq!(removed, vec![root(0), root(2)]);
        assert_eq!(array.nodes.len(), 2);
        assert!(array.is_descendant(root(1), root(3)));
        // The finalized node becomes the tree root.
        assert_eq!(array.nodes[0].root, root(1));
        assert_eq!(array.nodes[0].parent, None);
        // Indices were remapped consistently.
        assert_eq!(array.indices.get(&root(3)), Some(&1));
        assert_eq!(array.find_head(&root(1)).unwrap(), root(3));
    }

    #[test]
    fn prune_with_nothing_to_remove_is_a_no_op() {
        let mut array = empty_array();
        array.on_block(block(1, root(1), Some(root(0)))).unwrap();

        let removed = array.prune(root(0)).expect("prune succeeds");
        assert!(removed.is_empty());
        assert_eq!(array.nodes.len(), 2);
    }

    #[test]
    fn invalidate_subtree_removes_descendants_and_weight() {
        let mut array = empty_array();
        array.on_block(block(1, root(1), Some(root(0)))).unwrap();
        array.on_block(block(2, root(2), Some(root(1)))).unwrap();
        array.on_block(block(1, root(3), Some(root(0)))).unwrap();

        // Hand the subtree some weight: one unit on the leaf.
        let mut deltas = vec![0_i64; array.indices.len()];
        deltas[2] = 1;
        array
            .apply_score_changes(
                deltas,
                array.justified_checkpoint,
                array.finalized_checkpoint,
                &[1],
                Hash256::zero(),
                &ChainSpec::mainnet(),
            )
            .unwrap();
        assert_eq!(array.nodes[0].weight, 1);

        let removed = array.invalidate_subtree(root(1)).expect("invalidation succeeds");

        assert_eq!(removed, vec![root(1), root(2)]);
        assert!(!array.indices.contains_key(&root(1)));
        assert!(!array.indices.contains_key(&root(2)));
        // The anchor's weight lost the whole subtree.
        assert_eq!(array.nodes[0].weight, 0);
        assert_eq!(array.find_head(&root(0)).unwrap(), root(3));
    }

    #[test]
    fn invalidating_the_anchor_is_refused() {
        let mut array = empty_array();
        assert_eq!(
            array.invalidate_subtree(root(0)),
            Err(Error::InvalidatingFinalizedRoot(root(0)))
        );
    }

    #[test]
    fn invalidating_a_valid_block_is_refused() {
        let mut array = empty_array();
        array.on_block(block(1, root(1), Some(root(0)))).unwrap();
        array
            .propagate_execution_payload_validation(root(1))
            .unwrap();

        assert_eq!(
            array.invalidate_subtree(root(1)),
            Err(Error::ValidExecutionStatusBecameInvalid { block_root: root(1) })
        );
    }

    #[test]
    fn payload_validation_reaches_ancestors() {
        let mut array = empty_array();
        array.on_block(block(1, root(1), Some(root(0)))).unwrap();
        array.on_block(block(2, root(2), Some(root(1)))).unwrap();

        array
            .propagate_execution_payload_validation(root(2))
            .unwrap();

        for node in &array.nodes {
            assert_eq!(node.execution_status, ExecutionStatus::Valid);
        }
    }

    #[test]
    fn proposer_boost_is_a_fraction_of_active_balance() {
        // Zero balances are inactive validators and must not count.
        assert_eq!(calculate_proposer_boost(&[32, 32, 0, 0], 40), Some(25));
        assert_eq!(calculate_proposer_boost(&[32, 32], 100), Some(64));
        assert_eq!(calculate_proposer_boost(&[], 40), Some(0));
    }
}
