//! Two-heap slot arena and atomic bucket counters
//!
//! All layers live in two fixed word arenas, each sized for one layer of
//! `NBUCKETS x NSLOTS` layer-0 slots. Even layers use one heap, odd layers
//! the other, so a pass writing layer `r` only ever reads the opposite heap.
//! Within a heap, layer `r` is placed at word offset `r/2` into each slot
//! cell: stored hashes shrink by at least one word every two digits (this is
//! what the `n >= 16` precondition buys), so layer `r+2` fits beside the
//! columns that earlier even (or odd) layers used for their tree nodes.
//! A layer's hash words may be overwritten two passes later, but its node
//! word never is; the node columns of every layer survive until the final
//! pass walks them to reconstruct proofs.
//!
//! Slots are plain (non-atomic) words behind [`UnsafeCell`]. The access
//! protocol that makes this sound:
//!
//! * A writer owns a slot only by winning the bucket's atomic counter
//!   fetch-add, and writes it exactly once before the pass-end barrier.
//! * Readers of a layer run in a later pass, after that barrier, and only
//!   ever read slots below the drained counter value, all of which were
//!   fully written.
//! * Draining a counter (read then reset) happens between barriers, with
//!   no concurrent inserts on that layer.
//!
//! Every `unsafe` block below relies on those three rules and nothing else.

use crate::params::{hash_bytes, hash_words, Params};
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

/// Widest stored hash, in words, across the supported parameterizations.
pub(crate) const MAX_HASH_WORDS: usize = 8;

/// One shared arena word.
///
/// `Sync` because cross-thread access follows the module's reservation and
/// barrier protocol; the cell itself provides no synchronization.
#[derive(Default)]
#[repr(transparent)]
struct Word(UnsafeCell<u32>);

// SAFETY: see the module docs; writers are made exclusive by slot
// reservation and readers are separated from them by the pass barriers.
unsafe impl Sync for Word {}

/// The two ping-ponged heaps holding every layer's slots.
pub(crate) struct Arena<P: Params> {
    heaps: [Box<[Word]>; 2],
    /// Words per slot cell, `1 +` the layer-0 hash width.
    slot_words: usize,
    _params: PhantomData<P>,
}

impl<P: Params> Arena<P> {
    pub(crate) fn new() -> Self {
        let slot_words = 1 + hash_words(hash_bytes::<P>(0));
        debug_assert!(slot_words <= 1 + MAX_HASH_WORDS);
        // Offset layers must stay inside their cells.
        for r in 0..P::K {
            debug_assert!(
                (r / 2) as usize + 1 + hash_words(hash_bytes::<P>(r)) <= slot_words,
            );
        }
        let len = P::NBUCKETS as usize * P::NSLOTS as usize * slot_words;
        let alloc = || (0..len).map(|_| Word::default()).collect::<Box<[Word]>>();
        Arena {
            heaps: [alloc(), alloc()],
            slot_words,
            _params: PhantomData,
        }
    }

    /// Word index of the node word of slot `(bucket, slot)` at layer `r`.
    #[inline(always)]
    fn cell(&self, r: u32, bucket: u32, slot: u32) -> usize {
        debug_assert!(bucket < P::NBUCKETS && slot < P::NSLOTS);
        (bucket as usize * P::NSLOTS as usize + slot as usize) * self.slot_words
            + (r / 2) as usize
    }

    /// Commit a freshly reserved slot: its node word and stored hash words.
    #[inline(always)]
    pub(crate) fn write_slot(&self, r: u32, bucket: u32, slot: u32, node: u32, hash: &[u32]) {
        let heap = &self.heaps[(r & 1) as usize];
        let base = self.cell(r, bucket, slot);
        // SAFETY: the caller reserved `slot` via the layer's bucket counter,
        // so no other thread writes this cell range, and no reader touches
        // layer `r` until after the pass-end barrier.
        unsafe {
            *heap[base].0.get() = node;
            for (i, &word) in hash.iter().enumerate() {
                *heap[base + 1 + i].0.get() = word;
            }
        }
    }

    /// Node word of a committed slot.
    #[inline(always)]
    pub(crate) fn node(&self, r: u32, bucket: u32, slot: u32) -> u32 {
        let heap = &self.heaps[(r & 1) as usize];
        // SAFETY: committed before the barrier that ordered this read.
        unsafe { *heap[self.cell(r, bucket, slot)].0.get() }
    }

    /// One stored hash word of a committed slot.
    #[inline(always)]
    pub(crate) fn hash_word(&self, r: u32, bucket: u32, slot: u32, i: usize) -> u32 {
        let heap = &self.heaps[(r & 1) as usize];
        // SAFETY: as for `node`.
        unsafe { *heap[self.cell(r, bucket, slot) + 1 + i].0.get() }
    }

    /// Copy a committed slot's stored hash into `out`.
    #[inline(always)]
    pub(crate) fn read_hash(&self, r: u32, bucket: u32, slot: u32, out: &mut [u32]) {
        let heap = &self.heaps[(r & 1) as usize];
        let base = self.cell(r, bucket, slot) + 1;
        for (i, word) in out.iter_mut().enumerate() {
            // SAFETY: as for `node`.
            *word = unsafe { *heap[base + i].0.get() };
        }
    }
}

/// Per-bucket slot counters for both heap parities.
///
/// Reservation is a relaxed fetch-add: the winner owns the slot, and values
/// at or past `NSLOTS` mean the bucket is full and the candidate is dropped.
/// The counter deliberately keeps counting past full; draining clamps.
pub(crate) struct SlotCounts<P: Params> {
    counts: Box<[AtomicU32]>,
    _params: PhantomData<P>,
}

impl<P: Params> SlotCounts<P> {
    pub(crate) fn new() -> Self {
        let counts = (0..2 * P::NBUCKETS).map(|_| AtomicU32::new(0)).collect();
        SlotCounts {
            counts,
            _params: PhantomData,
        }
    }

    #[inline(always)]
    fn at(&self, r: u32, bucket: u32) -> &AtomicU32 {
        &self.counts[((r & 1) * P::NBUCKETS + bucket) as usize]
    }

    /// Reserve the next slot of a bucket; the caller must drop the
    /// candidate when the returned id is at or past `NSLOTS`.
    #[inline(always)]
    pub(crate) fn reserve(&self, r: u32, bucket: u32) -> u32 {
        self.at(r, bucket).fetch_add(1, Ordering::Relaxed)
    }

    /// Read a bucket's committed slot count, clamped to capacity, and
    /// reset it so the layer's parity can be reused two passes later.
    ///
    /// Only sound between barriers, with no concurrent inserts on `r`.
    #[inline(always)]
    pub(crate) fn drain(&self, r: u32, bucket: u32) -> u32 {
        let count = self.at(r, bucket);
        let n = count.load(Ordering::Relaxed).min(P::NSLOTS);
        count.store(0, Ordering::Relaxed);
        n
    }

    /// Committed slots in a bucket without draining it.
    #[inline(always)]
    pub(crate) fn peek(&self, r: u32, bucket: u32) -> u32 {
        self.at(r, bucket).load(Ordering::Relaxed).min(P::NSLOTS)
    }

    /// Zero the layer-0 parity, making the arena ready for a fresh seed.
    /// Other layers are left alone; each pass drains its input as it goes.
    pub(crate) fn reset(&self) {
        for bucket in 0..P::NBUCKETS {
            self.at(0, bucket).store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Arena, SlotCounts};
    use crate::params::{N96K5, Params};

    #[test]
    fn slot_round_trip() {
        let arena = Arena::<N96K5>::new();
        arena.write_slot(0, 17, 3, 0xdead_beef, &[1, 2, 3]);
        arena.write_slot(1, 17, 3, 0x1234_5678, &[9, 8]);
        assert_eq!(arena.node(0, 17, 3), 0xdead_beef);
        assert_eq!(arena.hash_word(0, 17, 3, 2), 3);
        let mut out = [0u32; 2];
        arena.read_hash(1, 17, 3, &mut out);
        assert_eq!(out, [9, 8]);
        // Opposite parities do not alias.
        assert_eq!(arena.node(0, 17, 3), 0xdead_beef);
    }

    #[test]
    fn same_parity_layers_share_cells_but_not_node_columns() {
        let arena = Arena::<N96K5>::new();
        arena.write_slot(0, 5, 0, 111, &[0xaaaa_aaaa, 0xbbbb_bbbb, 0xcccc_cccc]);
        // Layer 2 reuses layer 0's hash columns, shifted one word in.
        arena.write_slot(2, 5, 0, 222, &[0xdddd_dddd, 0xeeee_eeee]);
        assert_eq!(arena.node(0, 5, 0), 111);
        assert_eq!(arena.node(2, 5, 0), 222);
        assert_eq!(arena.hash_word(0, 5, 0, 0), 222);
    }

    #[test]
    fn counter_drains_clamped() {
        let counts = SlotCounts::<N96K5>::new();
        for _ in 0..N96K5::NSLOTS + 5 {
            counts.reserve(3, 42);
        }
        assert_eq!(counts.drain(3, 42), N96K5::NSLOTS);
        assert_eq!(counts.drain(3, 42), 0);
    }

    #[test]
    fn full_bucket_rejects_by_reservation_id() {
        let counts = SlotCounts::<N96K5>::new();
        let mut accepted = 0;
        for _ in 0..N96K5::NSLOTS + 1 {
            if counts.reserve(0, 7) < N96K5::NSLOTS {
                accepted += 1;
            }
        }
        assert_eq!(accepted, N96K5::NSLOTS);
    }
}
