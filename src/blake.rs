//! Keyed Blake2b state construction and per-block hashing
//!
//! Equihash derives its hash inputs from Blake2b personalized with
//! `"ZcashPoW" || le32(N) || le32(K)` and an output length holding a whole
//! number of `N`-bit hashes. The caller-provided input (header bytes and
//! nonce) is absorbed once; each 512-bit block is then produced by cloning
//! that state and finalizing over the little-endian block index.

use crate::params::Params;
use blake2b_simd::{Hash, Params as Blake2bParams, State};
use byteorder::{LittleEndian, WriteBytesExt};

/// The 32-byte nonce block a [`crate::Solver`] keys with: `le32(nonce)`
/// zero-padded.
///
/// Verifying a solver-found proof requires passing the same block as the
/// nonce bytes.
pub fn nonce_bytes(nonce: u32) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&nonce.to_le_bytes());
    bytes
}

/// Build the keyed state over `input || nonce`.
pub(crate) fn base_state<P: Params>(input: &[u8], nonce: &[u8]) -> State {
    let mut personal = Vec::from(&b"ZcashPoW"[..]);
    personal
        .write_u32::<LittleEndian>(P::N)
        .expect("writing to a Vec cannot fail");
    personal
        .write_u32::<LittleEndian>(P::K)
        .expect("writing to a Vec cannot fail");

    let mut state = Blake2bParams::new()
        .hash_length(P::HASH_OUT)
        .personal(&personal)
        .to_state();
    state.update(input);
    state.update(nonce);
    state
}

/// Finalize one indexed block: `HASHES_PER_BLAKE` hashes, concatenated.
pub(crate) fn block_hash(base: &State, block: u32) -> Hash {
    let mut lei = [0u8; 4];
    (&mut lei[..])
        .write_u32::<LittleEndian>(block)
        .expect("writing to a fixed buffer of the right size cannot fail");

    let mut state = base.clone();
    state.update(&lei);
    state.finalize()
}

/// The `index`-th `N/8`-byte hash, sliced out of its block.
pub(crate) fn index_hash<P: Params>(base: &State, index: u32) -> Vec<u8> {
    let hash = block_hash(base, index / P::HASHES_PER_BLAKE);
    let start = ((index % P::HASHES_PER_BLAKE) * P::N / 8) as usize;
    hash.as_bytes()[start..start + (P::N / 8) as usize].to_vec()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{N200K9, N96K5, Params};

    #[test]
    fn output_lengths_match_parameterization() {
        let state = base_state::<N96K5>(b"header", &[0; 4]);
        assert_eq!(block_hash(&state, 0).as_bytes().len(), N96K5::HASH_OUT);
        let state = base_state::<N200K9>(b"header", &[0; 4]);
        assert_eq!(block_hash(&state, 0).as_bytes().len(), N200K9::HASH_OUT);
    }

    #[test]
    fn blocks_differ_and_repeat() {
        let state = base_state::<N96K5>(b"header", &[0; 4]);
        assert_ne!(block_hash(&state, 0), block_hash(&state, 1));
        assert_eq!(block_hash(&state, 7), block_hash(&state, 7));
    }

    #[test]
    fn index_hash_slices_its_block() {
        let state = base_state::<N96K5>(b"header", &[1, 0, 0, 0]);
        let block = block_hash(&state, 3);
        let hash = index_hash::<N96K5>(&state, 3 * N96K5::HASHES_PER_BLAKE + 2);
        assert_eq!(hash, block.as_bytes()[24..36]);
    }
}
