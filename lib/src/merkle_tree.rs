//! Rebuilding the contract's deposit tree from its event log.
//!
//! The contract keeps an append-only binary tree of fixed height; leaves it
//! has not filled yet hold [`zero_value`], and an empty subtree at level `k`
//! hashes to `zeros[k]`. The tree here stores only the populated prefix of
//! each level and substitutes those constants for everything to the right.

use alloy_primitives::B256;
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use crate::crypto::{zero_value, Hasher};
use crate::error::{Error, Result};
use crate::field::fr_to_hex;

/// Tree height the deployed pools use.
pub const DEFAULT_TREE_HEIGHT: usize = 20;

/// Leaf indices are `u32` on chain.
pub const MAX_TREE_HEIGHT: usize = 32;

/// Where on the ledger a deposit event was observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub timestamp: Option<u64>,
}

/// One `Deposit(commitment, leafIndex, timestamp)` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub commitment: Fr,
    pub leaf_index: u32,
    pub block: BlockContext,
}

impl DepositEvent {
    pub fn new(commitment: Fr, leaf_index: u32) -> Self {
        Self {
            commitment,
            leaf_index,
            block: BlockContext::default(),
        }
    }
}

/// Membership proof for one leaf.
///
/// `path_indices[i] == 0` means the node on the path is the left child at
/// level `i` and `path_elements[i]` is its right sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub root: Fr,
    pub path_elements: Vec<Fr>,
    pub path_indices: Vec<u8>,
}

impl MerkleProof {
    /// Fold `leaf` up the path and return the resulting root.
    pub fn compute_root<H: Hasher>(&self, hasher: &H, leaf: &Fr) -> Result<Fr> {
        let mut node = *leaf;
        for (sibling, bit) in self.path_elements.iter().zip(&self.path_indices) {
            node = match bit {
                0 => hasher.hash_pair(&node, sibling)?,
                _ => hasher.hash_pair(sibling, &node)?,
            };
        }
        Ok(node)
    }

    /// True if `leaf` folds up to [`MerkleProof::root`].
    pub fn verify<H: Hasher>(&self, hasher: &H, leaf: &Fr) -> Result<bool> {
        Ok(self.path_elements.len() == self.path_indices.len()
            && self.compute_root(hasher, leaf)? == self.root)
    }
}

/// Empty-subtree hashes for levels `0..=height`.
pub fn zero_hashes<H: Hasher>(hasher: &H, height: usize) -> Result<Vec<Fr>> {
    let mut zeros = Vec::with_capacity(height + 1);
    zeros.push(zero_value());
    for level in 0..height {
        let below = zeros[level];
        zeros.push(hasher.hash_pair(&below, &below)?);
    }
    Ok(zeros)
}

/// Root of a tree of `height` with no leaves inserted.
pub fn empty_root<H: Hasher>(hasher: &H, height: usize) -> Result<Fr> {
    check_height(height)?;
    Ok(zero_hashes(hasher, height)?[height])
}

fn check_height(height: usize) -> Result<()> {
    if height == 0 || height > MAX_TREE_HEIGHT {
        return Err(Error::InvalidTreeHeight(height));
    }
    Ok(())
}

/// A sparse fixed-height tree holding the populated prefix of every level.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    height: usize,
    levels: Vec<Vec<Fr>>,
    zeros: Vec<Fr>,
}

impl MerkleTree {
    /// Build the tree bottom-up from leaves in insertion order.
    pub fn new<H: Hasher>(hasher: &H, height: usize, leaves: Vec<Fr>) -> Result<Self> {
        check_height(height)?;
        let capacity = 1u64 << height;
        if leaves.len() as u64 > capacity {
            return Err(Error::TreeOverflow {
                leaf_index: capacity,
                capacity,
            });
        }

        let zeros = zero_hashes(hasher, height)?;
        let mut levels = Vec::with_capacity(height + 1);
        levels.push(leaves);
        for level in 0..height {
            let below = &levels[level];
            let mut above = Vec::with_capacity(below.len().div_ceil(2));
            for pair in below.chunks(2) {
                let right = pair.get(1).unwrap_or(&zeros[level]);
                above.push(hasher.hash_pair(&pair[0], right)?);
            }
            levels.push(above);
        }

        Ok(Self {
            height,
            levels,
            zeros,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn root(&self) -> Fr {
        self.node(self.height, 0)
    }

    fn node(&self, level: usize, index: usize) -> Fr {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    /// Sibling path for the leaf at `index`, bottom-up.
    pub fn path(&self, index: usize) -> Result<MerkleProof> {
        let capacity = 1u64 << self.height;
        if index as u64 >= capacity {
            return Err(Error::TreeOverflow {
                leaf_index: index as u64,
                capacity,
            });
        }

        let mut path_elements = Vec::with_capacity(self.height);
        let mut path_indices = Vec::with_capacity(self.height);
        let mut cursor = index;
        for level in 0..self.height {
            path_elements.push(self.node(level, cursor ^ 1));
            path_indices.push((cursor & 1) as u8);
            cursor >>= 1;
        }

        Ok(MerkleProof {
            root: self.root(),
            path_elements,
            path_indices,
        })
    }
}

/// Order events by leaf index and check they form `0..n` exactly.
fn ordered_leaves(events: &[DepositEvent]) -> Result<Vec<&DepositEvent>> {
    let mut sorted: Vec<&DepositEvent> = events.iter().collect();
    sorted.sort_by_key(|event| event.leaf_index);

    for (expected, event) in sorted.iter().enumerate() {
        let expected = expected as u64;
        let found = event.leaf_index as u64;
        if found < expected {
            return Err(Error::DuplicateLeafIndex(event.leaf_index));
        }
        if found > expected {
            return Err(Error::LeafIndexGap {
                expected: expected as u32,
                found: event.leaf_index,
            });
        }
    }
    Ok(sorted)
}

/// Rebuild the tree from `events` and prove membership of `target`.
///
/// Returns the proof together with the target's leaf index. Gaps or
/// duplicates in the leaf indices abort reconstruction instead of producing
/// a root the contract never had.
pub fn reconstruct<H: Hasher>(
    hasher: &H,
    events: &[DepositEvent],
    height: usize,
    target: &Fr,
) -> Result<(MerkleProof, u32)> {
    check_height(height)?;
    let sorted = ordered_leaves(events)?;

    // Leaf indices are dense from here on: the first one past capacity is `capacity`.
    let capacity = 1u64 << height;
    if sorted.len() as u64 > capacity {
        return Err(Error::TreeOverflow {
            leaf_index: capacity,
            capacity,
        });
    }

    let leaf_index = sorted
        .iter()
        .find(|event| event.commitment == *target)
        .map(|event| event.leaf_index)
        .ok_or_else(|| Error::CommitmentNotFound {
            commitment: fr_to_hex(target),
            deposits: sorted.len(),
        })?;

    let leaves = sorted.iter().map(|event| event.commitment).collect();
    let tree = MerkleTree::new(hasher, height, leaves)?;
    let proof = tree.path(leaf_index as usize)?;
    Ok((proof, leaf_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PoseidonHasher;
    use crate::field::fr_to_u256;
    use alloy_primitives::U256;
    use proptest::prelude::*;

    fn leaf(n: u64) -> Fr {
        Fr::from(n + 1_000)
    }

    fn events(n: u32) -> Vec<DepositEvent> {
        (0..n).map(|i| DepositEvent::new(leaf(i as u64), i)).collect()
    }

    #[test]
    fn test_two_leaf_scenario_path() {
        let h = PoseidonHasher;
        let a = leaf(0);
        let b = leaf(1);
        let (proof, index) = reconstruct(&h, &events(2), 2, &a).unwrap();

        let zeros = zero_hashes(&h, 2).unwrap();
        assert_eq!(index, 0);
        assert_eq!(proof.path_indices, vec![0, 0]);
        assert_eq!(proof.path_elements, vec![b, zeros[1]]);

        let expected_root = h.hash_pair(&h.hash_pair(&a, &b).unwrap(), &zeros[1]).unwrap();
        assert_eq!(proof.root, expected_root);
    }

    #[test]
    fn test_right_child_sets_path_bit() {
        let h = PoseidonHasher;
        let (proof, index) = reconstruct(&h, &events(3), 2, &leaf(1)).unwrap();
        assert_eq!(index, 1);
        assert_eq!(proof.path_indices, vec![1, 0]);
        assert_eq!(proof.path_elements[0], leaf(0));
        assert!(proof.verify(&h, &leaf(1)).unwrap());

        let (proof, _) = reconstruct(&h, &events(3), 2, &leaf(2)).unwrap();
        assert_eq!(proof.path_indices, vec![0, 1]);
        assert_eq!(proof.path_elements[0], zero_value());
    }

    #[test]
    fn test_empty_tree_root_is_zero_schedule() {
        let h = PoseidonHasher;
        let tree = MerkleTree::new(&h, 4, Vec::new()).unwrap();
        let zeros = zero_hashes(&h, 4).unwrap();
        assert_eq!(tree.root(), zeros[4]);
        assert_eq!(empty_root(&h, 4).unwrap(), zeros[4]);
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn test_zero_schedule_known_values() {
        let h = PoseidonHasher;
        let zeros = zero_hashes(&h, 1).unwrap();
        let level0: U256 =
            "21663839004416932945382355908790599225266501822907911457504978515578255421292"
                .parse()
                .unwrap();
        let level1: U256 =
            "8995896153219992062710898675021891003404871425075198597897889079729967997688"
                .parse()
                .unwrap();
        assert_eq!(fr_to_u256(&zeros[0]), level0);
        assert_eq!(fr_to_u256(&zeros[1]), level1);
        assert_eq!(fr_to_u256(&empty_root(&h, 1).unwrap()), level1);
    }

    #[test]
    fn test_full_height_tree_accepts_events() {
        let h = PoseidonHasher;
        let events: Vec<DepositEvent> = (0..3u32)
            .map(|i| DepositEvent::new(leaf(i as u64), i))
            .collect();
        let (proof, index) = reconstruct(&h, &events, MAX_TREE_HEIGHT, &leaf(2)).unwrap();
        assert_eq!(index, 2);
        assert_eq!(proof.path_elements.len(), MAX_TREE_HEIGHT);
        assert!(proof.verify(&h, &leaf(2)).unwrap());
    }

    #[test]
    fn test_sparse_tree_matches_dense_construction() {
        let h = PoseidonHasher;
        let height = 3;
        let leaves: Vec<Fr> = (0..5).map(leaf).collect();
        let tree = MerkleTree::new(&h, height, leaves.clone()).unwrap();

        let mut level: Vec<Fr> = leaves;
        level.resize(1 << height, zero_value());
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| h.hash_pair(&pair[0], &pair[1]).unwrap())
                .collect();
        }
        assert_eq!(tree.root(), level[0]);
    }

    #[test]
    fn test_unordered_events_are_sorted() {
        let h = PoseidonHasher;
        let mut shuffled = events(4);
        shuffled.reverse();
        let (from_shuffled, _) = reconstruct(&h, &shuffled, 3, &leaf(2)).unwrap();
        let (from_ordered, _) = reconstruct(&h, &events(4), 3, &leaf(2)).unwrap();
        assert_eq!(from_shuffled, from_ordered);
    }

    #[test]
    fn test_duplicate_leaf_index_rejected() {
        let mut evs = events(3);
        evs.push(DepositEvent::new(leaf(9), 1));
        assert!(matches!(
            reconstruct(&PoseidonHasher, &evs, 4, &leaf(0)),
            Err(Error::DuplicateLeafIndex(1))
        ));
    }

    #[test]
    fn test_gap_rejected() {
        let mut evs = events(2);
        evs.push(DepositEvent::new(leaf(5), 5));
        assert!(matches!(
            reconstruct(&PoseidonHasher, &evs, 4, &leaf(0)),
            Err(Error::LeafIndexGap {
                expected: 2,
                found: 5
            })
        ));

        let missing_first = vec![DepositEvent::new(leaf(1), 1)];
        assert!(matches!(
            reconstruct(&PoseidonHasher, &missing_first, 4, &leaf(1)),
            Err(Error::LeafIndexGap {
                expected: 0,
                found: 1
            })
        ));
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(matches!(
            reconstruct(&PoseidonHasher, &events(3), 1, &leaf(0)),
            Err(Error::TreeOverflow {
                leaf_index: 2,
                capacity: 2
            })
        ));
        assert!(matches!(
            MerkleTree::new(&PoseidonHasher, 1, vec![leaf(0); 3]),
            Err(Error::TreeOverflow { .. })
        ));
    }

    #[test]
    fn test_missing_commitment_reported() {
        let err = reconstruct(&PoseidonHasher, &events(3), 4, &leaf(42)).unwrap_err();
        assert!(matches!(err, Error::CommitmentNotFound { deposits: 3, .. }));

        let err = reconstruct(&PoseidonHasher, &[], 4, &leaf(0)).unwrap_err();
        assert!(matches!(err, Error::CommitmentNotFound { deposits: 0, .. }));
    }

    #[test]
    fn test_invalid_height_rejected() {
        assert!(matches!(
            reconstruct(&PoseidonHasher, &events(1), 0, &leaf(0)),
            Err(Error::InvalidTreeHeight(0))
        ));
        assert!(matches!(
            MerkleTree::new(&PoseidonHasher, 33, Vec::new()),
            Err(Error::InvalidTreeHeight(33))
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_path() {
        let h = PoseidonHasher;
        let (mut proof, _) = reconstruct(&h, &events(4), 3, &leaf(3)).unwrap();
        assert!(proof.verify(&h, &leaf(3)).unwrap());
        proof.path_indices[0] ^= 1;
        assert!(!proof.verify(&h, &leaf(3)).unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_path_recomputes_root(count in 1u32..24, pick in any::<prop::sample::Index>()) {
            let h = PoseidonHasher;
            let target = pick.index(count as usize) as u64;
            let (proof, index) = reconstruct(&h, &events(count), 5, &leaf(target)).unwrap();
            prop_assert_eq!(index as u64, target);
            prop_assert_eq!(proof.path_elements.len(), 5);
            prop_assert_eq!(proof.compute_root(&h, &leaf(target)).unwrap(), proof.root);
        }
    }
}
