//! Per-bucket collision pairing on rest values
//!
//! While a pass scans one bucket it must emit every unordered pair of slots
//! that share a rest value, pairing each new slot against exactly the slots
//! fed in before it. Two interchangeable structures do this: small per-rest
//! slot lists (the default), and a 64-bit occupancy bitmap per rest value
//! (`bitmap` feature, possible because buckets hold at most 64 slots). Both
//! enumerate partners in insertion order, so a single-threaded solve is
//! deterministic under either.

use crate::params::Params;
use std::marker::PhantomData;

/// Distinct rest values, fixed by the 4 rest bits all parameterizations use.
const NRESTS: usize = 16;

/// Capacity of one rest-value slot list at the widest supported bucket.
const XFULL_CAP: usize = 16;

/// Slot lists grouped by rest value.
///
/// `add_slot` refuses a slot whose rest group is already at `P::XFULL`;
/// the caller drops that slot entirely and counts the overflow.
#[cfg_attr(feature = "bitmap", allow(dead_code))]
pub(crate) struct RestLists<P: Params> {
    /// Live entries per rest value. Keeps counting past the cap so later
    /// arrivals in an overflowed group are also refused.
    counts: [u8; NRESTS],
    slots: [[u8; XFULL_CAP]; NRESTS],
    /// Iteration state for the most recently added slot.
    row: usize,
    next: usize,
    last: usize,
    _params: PhantomData<P>,
}

#[cfg_attr(feature = "bitmap", allow(dead_code))]
impl<P: Params> RestLists<P> {
    pub(crate) fn new() -> Self {
        RestLists {
            counts: [0; NRESTS],
            slots: [[0; XFULL_CAP]; NRESTS],
            row: 0,
            next: 0,
            last: 0,
            _params: PhantomData,
        }
    }

    /// File `slot` under `rest`, making its predecessors available from
    /// [`Self::next_collision`]. Returns false when the group is full.
    #[inline(always)]
    pub(crate) fn add_slot(&mut self, slot: u32, rest: u32) -> bool {
        let row = rest as usize;
        let n = usize::from(self.counts[row]);
        self.counts[row] += 1;
        if n >= P::XFULL as usize {
            return false;
        }
        self.slots[row][n] = slot as u8;
        self.row = row;
        self.next = 0;
        self.last = n;
        true
    }

    /// The next earlier slot colliding with the one last added.
    #[inline(always)]
    pub(crate) fn next_collision(&mut self) -> Option<u32> {
        if self.next < self.last {
            let slot = self.slots[self.row][self.next];
            self.next += 1;
            Some(u32::from(slot))
        } else {
            None
        }
    }
}

/// Occupancy bitmaps grouped by rest value.
///
/// Needs `NSLOTS <= 64`. Never overflows: a group is a u64 mask, and
/// partners are enumerated by clearing set bits in ascending order, which
/// is insertion order because slots are fed in ascending.
#[cfg_attr(not(feature = "bitmap"), allow(dead_code))]
pub(crate) struct RestBitmap<P: Params> {
    masks: [u64; NRESTS],
    /// Partners of the slot last added: the group mask as it was before
    /// that slot's bit was set.
    pending: u64,
    _params: PhantomData<P>,
}

#[cfg_attr(not(feature = "bitmap"), allow(dead_code))]
impl<P: Params> RestBitmap<P> {
    pub(crate) fn new() -> Self {
        const { assert!(P::NSLOTS <= 64) };
        RestBitmap {
            masks: [0; NRESTS],
            pending: 0,
            _params: PhantomData,
        }
    }

    #[inline(always)]
    pub(crate) fn add_slot(&mut self, slot: u32, rest: u32) -> bool {
        let row = rest as usize;
        self.pending = self.masks[row];
        self.masks[row] |= 1 << slot;
        true
    }

    #[inline(always)]
    pub(crate) fn next_collision(&mut self) -> Option<u32> {
        if self.pending == 0 {
            return None;
        }
        let slot = self.pending.trailing_zeros();
        self.pending &= self.pending - 1;
        Some(slot)
    }
}

#[cfg(not(feature = "bitmap"))]
pub(crate) type Collider<P> = RestLists<P>;

#[cfg(feature = "bitmap")]
pub(crate) type Collider<P> = RestBitmap<P>;
