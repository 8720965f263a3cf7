//! Representation and well-formedness of Equihash proofs
//!
//! A proof lists its `2^K` leaf indices in canonical tree order: recursively,
//! every left subtree's leftmost leaf is smaller than its sibling's. This is
//! the order the Wagner constraints prescribe and the order the minimal byte
//! encoding serializes; a fully sorted copy of the indices is only used to
//! rule out duplicates. The `Solution` type checks the structural properties
//! (length, index range, tree order, distinctness) but says nothing about
//! hashes; [`crate::verify()`] checks a solution against a seed.

use crate::err::Error;
use crate::minimal;
use crate::params::Params;
use arrayvec::ArrayVec;

/// Most solutions kept per run; rarely are more found.
pub const MAXSOLS: usize = 8;

/// The bundle of solutions returned by one solver run.
pub type SolutionArray = ArrayVec<Solution, MAXSOLS>;

/// One well-formed Equihash proof: `2^K` distinct leaf indices in canonical
/// tree order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    indices: Box<[u32]>,
}

impl Solution {
    /// Adopt indices from a solver walk, which produces them already
    /// canonicalized and checked.
    pub(crate) fn from_walk(indices: &[u32]) -> Self {
        debug_assert!(tree_ordered(indices));
        Solution {
            indices: indices.into(),
        }
    }

    /// Build a solution from plain indices, checking well-formedness.
    pub fn try_from_indices<P: Params>(indices: &[u32]) -> Result<Self, Error> {
        if indices.len() != P::PROOFSIZE {
            return Err(Error::Malformed);
        }
        if indices.iter().any(|&i| i >= P::NHASHES) {
            return Err(Error::IndexRange);
        }
        if !tree_ordered(indices) {
            return Err(Error::Order);
        }
        let mut sorted: Vec<u32> = indices.to_vec();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::DuplicateIndices);
        }
        Ok(Solution {
            indices: indices.into(),
        })
    }

    /// Decode the Zcash minimal byte encoding.
    pub fn try_from_minimal<P: Params>(bytes: &[u8]) -> Result<Self, Error> {
        let indices = minimal::indices_from_minimal::<P>(bytes)?;
        Self::try_from_indices::<P>(&indices)
    }

    /// Encode into the Zcash minimal byte form: big-endian
    /// `DIGIT_BITS + 1`-bit indices, packed.
    pub fn to_minimal<P: Params>(&self) -> Vec<u8> {
        minimal::minimal_from_indices::<P>(&self.indices)
    }

    /// The leaf indices, in canonical tree order.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

/// Check the recursive leftmost-leaf ordering.
fn tree_ordered(indices: &[u32]) -> bool {
    if indices.len() < 2 {
        return true;
    }
    let (left, right) = indices.split_at(indices.len() / 2);
    left[0] < right[0] && tree_ordered(left) && tree_ordered(right)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{N96K5, Params};

    #[test]
    fn tree_order_is_leftmost_not_sorted() {
        // Pairwise and nodewise leftmost ordering holds even though the
        // flat sequence is not ascending.
        assert!(tree_ordered(&[2, 9, 5, 7]));
        assert!(!tree_ordered(&[9, 2, 5, 7]));
        assert!(!tree_ordered(&[5, 7, 2, 9]));
    }

    #[test]
    fn rejects_malformed_proofs() {
        let base: Vec<u32> = (0..32).collect();
        assert!(Solution::try_from_indices::<N96K5>(&base).is_ok());

        assert!(matches!(
            Solution::try_from_indices::<N96K5>(&base[..16]),
            Err(Error::Malformed),
        ));

        let mut range = base.clone();
        range[31] = N96K5::NHASHES;
        assert!(matches!(
            Solution::try_from_indices::<N96K5>(&range),
            Err(Error::IndexRange),
        ));

        let mut swapped = base.clone();
        swapped.swap(0, 16);
        assert!(matches!(
            Solution::try_from_indices::<N96K5>(&swapped),
            Err(Error::Order),
        ));

        let mut dup = base;
        dup[3] = dup[1];
        let err = Solution::try_from_indices::<N96K5>(&dup);
        assert!(matches!(err, Err(Error::Order) | Err(Error::DuplicateIndices)));
    }
}
