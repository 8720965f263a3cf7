//! Independent proof verification
//!
//! Recomputes leaf hashes from the keyed seed and replays the Wagner tree:
//! at every level the sibling hashes must agree on one more digit, the left
//! subtree's leftmost leaf must come first, and no index may repeat; the
//! root XOR must vanish entirely. This shares nothing with the solver's
//! bucket machinery beyond the seed derivation, which is what makes it a
//! useful cross-check in tests.

use crate::blake;
use crate::err::Error;
use crate::minimal::expand_array;
use crate::params::Params;
use blake2b_simd::State;

/// One row of the replay: a partial XOR and the leaves under it.
///
/// Hashes are expanded to one digit per `DIGIT_BITS/8`-rounded row so that
/// trimming a digit per level is a byte operation.
struct Row {
    hash: Vec<u8>,
    indices: Vec<u32>,
}

/// Bytes holding one expanded digit.
fn digit_bytes<P: Params>() -> usize {
    (P::DIGIT_BITS as usize + 7) / 8
}

impl Row {
    fn leaf<P: Params>(state: &State, i: u32) -> Self {
        let hash = blake::index_hash::<P>(state, i);
        Row {
            hash: expand_array(&hash, P::DIGIT_BITS as usize, 0),
            indices: vec![i],
        }
    }

    fn from_children<P: Params>(a: Row, b: Row) -> Self {
        let trim = digit_bytes::<P>();
        let hash = a
            .hash
            .iter()
            .zip(b.hash.iter())
            .skip(trim)
            .map(|(a, b)| a ^ b)
            .collect();
        let mut indices = Vec::with_capacity(a.indices.len() + b.indices.len());
        indices.extend(a.indices);
        indices.extend(b.indices);
        Row { hash, indices }
    }

    fn indices_before(&self, other: &Row) -> bool {
        self.indices[0] < other.indices[0]
    }

    fn is_zero(&self, len: usize) -> bool {
        self.hash.iter().take(len).all(|v| *v == 0)
    }
}

fn validate_subtrees<P: Params>(a: &Row, b: &Row) -> Result<(), Error> {
    let collision = a
        .hash
        .iter()
        .zip(b.hash.iter())
        .take(digit_bytes::<P>())
        .all(|(a, b)| a == b);
    if !collision {
        return Err(Error::Collision);
    }
    if !a.indices_before(b) {
        return Err(Error::Order);
    }
    for i in &a.indices {
        if b.indices.contains(i) {
            return Err(Error::DuplicateIndices);
        }
    }
    Ok(())
}

fn tree_validator<P: Params>(state: &State, indices: &[u32]) -> Result<Row, Error> {
    if indices.len() > 1 {
        let mid = indices.len() / 2;
        let a = tree_validator::<P>(state, &indices[..mid])?;
        let b = tree_validator::<P>(state, &indices[mid..])?;
        validate_subtrees::<P>(&a, &b)?;
        Ok(Row::from_children::<P>(a, b))
    } else {
        Ok(Row::leaf::<P>(state, indices[0]))
    }
}

/// Check plain indices against a seed.
///
/// `indices` must be in canonical tree order, the order the solver emits.
pub fn verify_indices<P: Params>(
    input: &[u8],
    nonce: &[u8],
    indices: &[u32],
) -> Result<(), Error> {
    if indices.len() != P::PROOFSIZE {
        return Err(Error::Malformed);
    }
    if indices.iter().any(|&i| i >= P::NHASHES) {
        return Err(Error::IndexRange);
    }

    let state = blake::base_state::<P>(input, nonce);
    let root = tree_validator::<P>(&state, indices)?;

    // Digits were trimmed on the way up; only the last one remains.
    if root.is_zero(digit_bytes::<P>()) {
        Ok(())
    } else {
        Err(Error::NonZeroRoot)
    }
}
