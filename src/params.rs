//! Compile-time Equihash parameterizations and per-layer geometry
//!
//! An `(N, K)` instance fixes `n = N/(K+1)`, the digit width. Each of the
//! `K+1` digit passes classifies a slot by the leading `BUCK_BITS` bits of
//! its current digit (the bucket) and the following `REST_BITS` bits (the
//! rest value, used for collision grouping inside a bucket). The exact byte
//! positions those bits occupy in a Blake2b output or an XOR of stored
//! hashes depend on `(BUCK_BITS, REST_BITS)`, so each parameterization
//! carries its own extraction routines. The digit engines monomorphize over
//! this trait, keeping the inner loops free of geometry dispatch.

/// Geometry of one Equihash instance.
///
/// Implemented by the zero-sized parameterization types [`N96K5`],
/// [`N200K9`] and [`N144K5`]. The derived constants follow from `N` and `K`;
/// the required methods encode the bit layout of digits within the byte
/// stream and must agree with the derived constants. Geometry preconditions
/// are checked at compile time when a [`Solver`](crate::Solver) is built, so
/// an impl with an unsupported shape fails to compile rather than misbehave.
pub trait Params: Copy + Send + Sync + 'static {
    /// Total hash bit length. Must be a multiple of 8 and of `K + 1`.
    const N: u32;
    /// Tree height: a proof XORs `2^K` leaf hashes to zero.
    const K: u32;

    /// Digit width in bits, `n = N/(K+1)`. One digit is zeroed per pass.
    const DIGIT_BITS: u32 = Self::N / (Self::K + 1);
    /// Bits of the digit used to group slots within a bucket.
    const REST_BITS: u32 = 4;
    /// Bits of the digit selecting the bucket.
    const BUCK_BITS: u32 = Self::DIGIT_BITS - Self::REST_BITS;
    /// Buckets per layer.
    const NBUCKETS: u32 = 1 << Self::BUCK_BITS;
    /// log2 of the bucket capacity, 4x the expected occupancy.
    const SLOT_BITS: u32 = Self::REST_BITS + 2;
    /// Slots per bucket. Insertions past this are dropped and counted.
    const NSLOTS: u32 = 1 << Self::SLOT_BITS;
    /// Mask for a slot id.
    const SLOT_MASK: u32 = Self::NSLOTS - 1;
    /// Distinct rest values.
    const NRESTS: u32 = 1 << Self::REST_BITS;
    /// Cap on one rest-value group in the slot-list collision finder.
    const XFULL: u32 = Self::NSLOTS / 4;

    /// Whether a tree node carries its slot's rest value.
    ///
    /// When the three node fields leave 4 spare bits this is a cheap cache;
    /// when they fill the word (`BUCK_BITS = 20`) the rest value is kept as
    /// head padding inside the stored hash instead and read back from its
    /// head byte.
    const XHASH_IN_NODE: bool = true;

    /// Size of the index space, `2^(n+1)`.
    const NHASHES: u32 = 1 << (Self::DIGIT_BITS + 1);
    /// Equihash hashes packed into one 512-bit Blake2b output.
    const HASHES_PER_BLAKE: u32 = 512 / Self::N;
    /// Blake2b output length in bytes.
    const HASH_OUT: usize = (Self::HASHES_PER_BLAKE * Self::N / 8) as usize;
    /// Blake2b invocations needed to cover the index space.
    const NBLOCKS: u32 =
        (Self::NHASHES + Self::HASHES_PER_BLAKE - 1) / Self::HASHES_PER_BLAKE;
    /// Indices per proof, `2^K`.
    const PROOFSIZE: usize = 1 << Self::K;

    /// Split the leading digit of a fresh `N/8`-byte hash into
    /// `(bucket, rest)`.
    fn seed_split(ph: &[u8]) -> (u32, u32);

    /// Split the next digit out of an XOR of two stored hashes, for an
    /// odd-numbered pass.
    ///
    /// `x` holds the four XOR bytes starting at the previous layer's head
    /// byte offset. Returns `(bucket, rest)` for the produced slot.
    fn xor_split_odd(x: [u8; 4]) -> (u32, u32);

    /// Split the next digit out of an XOR of two stored hashes, for an
    /// even-numbered pass.
    ///
    /// Distinct from [`Self::xor_split_odd`] only when the digit width is
    /// not a whole number of bytes, in which case digit boundaries
    /// alternate between byte-aligned and nibble-aligned.
    fn xor_split_even(x: [u8; 4]) -> (u32, u32);

    /// Rest value of a stored slot, from the head byte of its hash, when
    /// [`Self::XHASH_IN_NODE`] is off and the reading pass is odd.
    fn rest_from_head_odd(b: u8) -> u32 {
        u32::from(b >> 4)
    }

    /// As [`Self::rest_from_head_odd`], for an even reading pass.
    fn rest_from_head_even(b: u8) -> u32 {
        u32::from(b & 0xf)
    }
}

/// Zcash production parameters: 200-bit hashes, 512-leaf proofs.
///
/// 20-bit digits split 16/4. Digits are 2.5 bytes wide, so their boundaries
/// alternate between byte- and nibble-aligned and the odd/even splits
/// differ.
#[derive(Clone, Copy, Debug)]
pub struct N200K9;

impl Params for N200K9 {
    const N: u32 = 200;
    const K: u32 = 9;

    fn seed_split(ph: &[u8]) -> (u32, u32) {
        let bucket = u32::from(ph[0]) << 8 | u32::from(ph[1]);
        (bucket, u32::from(ph[2] >> 4))
    }

    fn xor_split_odd(x: [u8; 4]) -> (u32, u32) {
        // The digit starts at the low nibble of the head byte; its high
        // nibble is the rest value both slots collided on, so it XORs to
        // zero and the mask only drops dead bits.
        let bucket = ((u32::from(x[0]) << 8 | u32::from(x[1])) & 0xfff) << 4
            | u32::from(x[2] >> 4);
        (bucket, u32::from(x[2] & 0xf))
    }

    fn xor_split_even(x: [u8; 4]) -> (u32, u32) {
        let bucket = u32::from(x[0]) << 8 | u32::from(x[1]);
        (bucket, u32::from(x[2] >> 4))
    }
}

/// Test-sized parameters: 96-bit hashes, 32-leaf proofs.
///
/// 16-bit digits split 12/4, always byte-aligned.
#[derive(Clone, Copy, Debug)]
pub struct N96K5;

impl Params for N96K5 {
    const N: u32 = 96;
    const K: u32 = 5;

    fn seed_split(ph: &[u8]) -> (u32, u32) {
        let bucket = u32::from(ph[0]) << 4 | u32::from(ph[1] >> 4);
        (bucket, u32::from(ph[1] & 0xf))
    }

    fn xor_split_odd(x: [u8; 4]) -> (u32, u32) {
        let bucket = u32::from(x[0]) << 4 | u32::from(x[1] >> 4);
        (bucket, u32::from(x[1] & 0xf))
    }

    fn xor_split_even(x: [u8; 4]) -> (u32, u32) {
        Self::xor_split_odd(x)
    }
}

/// Mid-sized parameters: 144-bit hashes, 32-leaf proofs.
///
/// 24-bit digits split 20/4. The node fields alone fill 32 bits, so the
/// rest value lives as head padding inside the stored hash: its byte sits
/// at the head offset, with the digit in the three bytes after it.
#[derive(Clone, Copy, Debug)]
pub struct N144K5;

impl Params for N144K5 {
    const N: u32 = 144;
    const K: u32 = 5;

    const XHASH_IN_NODE: bool = false;

    fn seed_split(ph: &[u8]) -> (u32, u32) {
        let bucket =
            u32::from(ph[0]) << 12 | u32::from(ph[1]) << 4 | u32::from(ph[2] >> 4);
        (bucket, u32::from(ph[2] & 0xf))
    }

    fn xor_split_odd(x: [u8; 4]) -> (u32, u32) {
        let bucket =
            u32::from(x[1]) << 12 | u32::from(x[2]) << 4 | u32::from(x[3] >> 4);
        (bucket, u32::from(x[3] & 0xf))
    }

    fn xor_split_even(x: [u8; 4]) -> (u32, u32) {
        Self::xor_split_odd(x)
    }

    // Byte-aligned digits keep the rest value in the low nibble of the
    // head byte on every pass.
    fn rest_from_head_odd(b: u8) -> u32 {
        u32::from(b & 0xf)
    }

    fn rest_from_head_even(b: u8) -> u32 {
        u32::from(b & 0xf)
    }
}

/// Bits still stored for a layer-`r` slot.
///
/// Each pass consumes one digit into its bucket/rest classification. When
/// the rest value cannot ride in the tree node it stays in the stored hash
/// as `REST_BITS` of head padding.
pub(crate) fn hash_bits<P: Params>(r: u32) -> u32 {
    let pad = if P::XHASH_IN_NODE { 0 } else { P::REST_BITS };
    P::N - (r + 1) * P::DIGIT_BITS + pad
}

/// Stored hash length in bytes for layer `r`.
pub(crate) fn hash_bytes<P: Params>(r: u32) -> usize {
    ((hash_bits::<P>(r) + 7) / 8) as usize
}

/// Words needed for `bytes` hash bytes.
pub(crate) fn hash_words(bytes: usize) -> usize {
    (bytes + 3) / 4
}

/// Word/byte geometry of one digit pass.
///
/// Stored hashes are right-aligned in their word array: `bo` head bytes of
/// the first word are padding (or, without the in-node rest cache, the rest
/// nibble), so XORs and equality checks run on whole words while byte
/// extraction indexes from `bo`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout {
    /// Stored words per slot in the layer being read.
    pub(crate) prev_units: usize,
    /// Head byte offset within the previous layer's word array.
    pub(crate) prev_bo: usize,
    /// Stored words per slot in the layer being written.
    pub(crate) next_units: usize,
    /// Head byte offset within the written word array.
    pub(crate) next_bo: usize,
    /// Whole words the hash shrinks by across this pass, 0 or 1.
    pub(crate) dunits: usize,
}

impl Layout {
    pub(crate) fn new<P: Params>(r: u32) -> Self {
        let next_bytes = hash_bytes::<P>(r);
        let next_units = hash_words(next_bytes);
        let next_bo = next_units * 4 - next_bytes;
        if r == 0 {
            return Layout {
                prev_units: 0,
                prev_bo: 0,
                next_units,
                next_bo,
                dunits: 0,
            };
        }
        let prev_bytes = hash_bytes::<P>(r - 1);
        let prev_units = hash_words(prev_bytes);
        Layout {
            prev_units,
            prev_bo: prev_units * 4 - prev_bytes,
            next_units,
            next_bo,
            dunits: prev_units - next_units,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn layer_table<P: Params>() -> Vec<(usize, usize, usize)> {
        (0..P::K)
            .map(|r| {
                let l = Layout::new::<P>(r);
                (l.next_units, l.next_bo, l.dunits)
            })
            .collect()
    }

    #[test]
    fn n200k9_geometry() {
        assert_eq!(N200K9::DIGIT_BITS, 20);
        assert_eq!(N200K9::BUCK_BITS, 16);
        assert_eq!(N200K9::NSLOTS, 64);
        assert_eq!(N200K9::HASHES_PER_BLAKE, 2);
        assert_eq!(N200K9::HASH_OUT, 50);
        assert_eq!(N200K9::NBLOCKS, 1 << 20);
        // (stored words, head byte offset, words dropped on entry) per layer
        assert_eq!(
            layer_table::<N200K9>(),
            vec![
                (6, 1, 0),
                (5, 0, 1),
                (5, 2, 0),
                (4, 1, 1),
                (4, 3, 0),
                (3, 2, 1),
                (2, 0, 1),
                (2, 3, 0),
                (1, 1, 1),
            ],
        );
    }

    #[test]
    fn n96k5_geometry() {
        assert_eq!(N96K5::DIGIT_BITS, 16);
        assert_eq!(N96K5::BUCK_BITS, 12);
        assert_eq!(N96K5::NBUCKETS, 1 << 12);
        assert_eq!(N96K5::HASHES_PER_BLAKE, 5);
        assert_eq!(N96K5::HASH_OUT, 60);
        assert_eq!(N96K5::NBLOCKS, 26215);
        // The last block covers indices past 2^17; the seeding pass stops
        // at the index-space boundary.
        assert!(N96K5::NBLOCKS * N96K5::HASHES_PER_BLAKE > N96K5::NHASHES);
        assert_eq!(
            layer_table::<N96K5>(),
            vec![(3, 2, 0), (2, 0, 1), (2, 2, 0), (1, 0, 1), (1, 2, 0)],
        );
    }

    #[test]
    fn n144k5_geometry() {
        assert_eq!(N144K5::DIGIT_BITS, 24);
        assert_eq!(N144K5::BUCK_BITS, 20);
        assert!(!N144K5::XHASH_IN_NODE);
        assert_eq!(N144K5::HASH_OUT, 54);
        // Head offsets point at the byte holding the rest-nibble padding.
        assert_eq!(
            layer_table::<N144K5>(),
            vec![(4, 0, 0), (4, 3, 0), (3, 2, 1), (2, 1, 1), (1, 0, 1)],
        );
    }

    #[test]
    fn seed_and_xor_splits_agree_on_digit_width() {
        // A digit extracted from all-ones bytes uses every bit exactly once.
        let (b, x) = N200K9::seed_split(&[0xff; 25]);
        assert_eq!((b, x), (0xffff, 0xf));
        let (b, x) = N200K9::xor_split_odd([0xff; 4]);
        assert_eq!((b, x), (0xffff, 0xf));
        let (b, x) = N200K9::xor_split_even([0xff; 4]);
        assert_eq!((b, x), (0xffff, 0xf));

        let (b, x) = N96K5::seed_split(&[0xff; 12]);
        assert_eq!((b, x), (0xfff, 0xf));
        let (b, x) = N96K5::xor_split_odd([0xff; 4]);
        assert_eq!((b, x), (0xfff, 0xf));

        let (b, x) = N144K5::seed_split(&[0xff; 18]);
        assert_eq!((b, x), (0xfffff, 0xf));
        let (b, x) = N144K5::xor_split_even([0xff; 4]);
        assert_eq!((b, x), (0xfffff, 0xf));
    }
}
