//! The layered digit engines and their thread driver
//!
//! A solve is `K+1` passes over shared state. Pass 0 seeds layer 0 from the
//! keyed Blake2b stream. Passes `1..K` each drain the previous layer bucket
//! by bucket, pair slots that collide on their rest value, XOR the paired
//! hashes, and file the result into the next layer under the digit the XOR
//! exposes. Pass `K` accepts pairs whose remaining hash matches outright and
//! walks their tree of nodes back to leaf indices.
//!
//! Worker threads execute the passes in lockstep. Pass 0 stripes Blake2b
//! blocks across threads; later passes stripe source buckets, so each source
//! bucket is scanned by exactly one thread while destination buckets take
//! inserts from any thread through their atomic counters. Barriers separate
//! a pass's writes from the next pass's reads, and put the counter drains
//! and diagnostics of worker 0 in their own window.

use crate::arena::{Arena, SlotCounts, MAX_HASH_WORDS};
use crate::blake;
use crate::collision::Collider;
use crate::err::Error;
use crate::node::Node;
use crate::params::{hash_bytes, Layout, Params};
use crate::solution::{Solution, SolutionArray};
use blake2b_simd::State;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;

/// Candidates dropped during one digit pass.
///
/// All three conditions are expected in normal operation; they spend
/// solutions, never correctness.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigitStats {
    /// Destination bucket was at capacity.
    pub bucket_full: u32,
    /// A rest-value group hit the collision finder's cap.
    pub rest_full: u32,
    /// A colliding pair's stored hashes were identical, which would
    /// duplicate an index further up the tree.
    pub hash_full: u32,
}

/// Per-digit diagnostics from the most recent run.
#[derive(Clone, Debug, Default)]
pub struct RunStats {
    /// One entry per digit pass, index 0 being the seeding pass.
    pub digits: Vec<DigitStats>,
}

/// A reusable Equihash solver for the parameterization `P`.
///
/// Owns two layer arenas and the bucket counters; nothing is allocated per
/// run beyond the solutions themselves. A typical mining loop constructs
/// one solver and alternates [`Solver::set_nonce`] with [`Solver::run`].
pub struct Solver<P: Params> {
    state: State,
    arena: Arena<P>,
    counts: SlotCounts<P>,
    sols: Mutex<SolutionArray>,
    stats: Mutex<RunStats>,
    bucket_full: AtomicU32,
    rest_full: AtomicU32,
    hash_full: AtomicU32,
    nthreads: usize,
}

impl<P: Params> Solver<P> {
    /// Allocate a solver driving `nthreads` worker threads.
    pub fn new(nthreads: usize) -> Result<Self, Error> {
        const {
            assert!(P::N % 8 == 0);
            assert!(P::N % (P::K + 1) == 0);
            // Stored hashes must shrink a word every two digits for the
            // two-heap recycling to be sound.
            assert!(P::DIGIT_BITS >= 16);
            assert!(P::REST_BITS < P::DIGIT_BITS);
            assert!(P::SLOT_BITS <= 6);
            // A layer-0 leaf index must fit the bucket and slot fields.
            assert!(P::BUCK_BITS + P::SLOT_BITS > P::DIGIT_BITS);
            // The node fields must pack into one word.
            assert!(
                P::BUCK_BITS
                    + 2 * P::SLOT_BITS
                    + if P::XHASH_IN_NODE { P::REST_BITS } else { 0 }
                    <= 32
            );
            // The collision finder's tables are sized for 4 rest bits.
            assert!(P::NRESTS == 16);
        };
        if nthreads == 0 {
            return Err(Error::Threads);
        }
        Ok(Solver {
            state: blake::base_state::<P>(&[], &[]),
            arena: Arena::new(),
            counts: SlotCounts::new(),
            sols: Mutex::new(SolutionArray::new()),
            stats: Mutex::new(RunStats::default()),
            bucket_full: AtomicU32::new(0),
            rest_full: AtomicU32::new(0),
            hash_full: AtomicU32::new(0),
            nthreads,
        })
    }

    /// Key the hash stream with `input` and the zero-padded 32-byte nonce
    /// block, and reset per-run state.
    pub fn set_nonce(&mut self, input: &[u8], nonce: u32) {
        self.state = blake::base_state::<P>(input, &blake::nonce_bytes(nonce));
        self.counts.reset();
        self.clear_run();
    }

    /// Run all `K+1` digit passes and return the proofs found.
    ///
    /// Solutions depend on slot-insertion order, so with more than one
    /// thread the emitted set may vary between runs; with one thread it is
    /// deterministic. Every emitted proof is valid regardless.
    pub fn run(&mut self) -> SolutionArray {
        self.clear_run();
        let this = &*self;
        let barrier = Barrier::new(this.nthreads);
        thread::scope(|scope| {
            for id in 1..this.nthreads {
                let barrier = &barrier;
                scope.spawn(move || this.worker(id, barrier));
            }
            this.worker(0, &barrier);
        });
        self.sols
            .lock()
            .expect("a solver worker panicked")
            .clone()
    }

    /// Diagnostics recorded by the most recent [`Solver::run`].
    pub fn stats(&self) -> RunStats {
        self.stats.lock().expect("a solver worker panicked").clone()
    }

    fn clear_run(&mut self) {
        self.sols.get_mut().expect("a solver worker panicked").clear();
        self.stats.get_mut().expect("a solver worker panicked").digits.clear();
        self.bucket_full.store(0, Ordering::Relaxed);
        self.rest_full.store(0, Ordering::Relaxed);
        self.hash_full.store(0, Ordering::Relaxed);
    }

    fn worker(&self, id: usize, barrier: &Barrier) {
        let mut proof = vec![0u32; P::PROOFSIZE];
        let mut sorted = vec![0u32; P::PROOFSIZE];

        barrier.wait();
        self.digit0(id);
        barrier.wait();
        if id == 0 {
            self.record_digit(0);
        }
        barrier.wait();

        for r in 1..P::K {
            if r & 1 == 1 {
                self.digit_mid::<true>(r, id);
            } else {
                self.digit_mid::<false>(r, id);
            }
            barrier.wait();
            if id == 0 {
                self.record_digit(r);
            }
            barrier.wait();
        }

        if P::K & 1 == 1 {
            self.digit_final::<true>(id, &mut proof, &mut sorted);
        } else {
            self.digit_final::<false>(id, &mut proof, &mut sorted);
        }
        barrier.wait();
        if id == 0 {
            self.record_digit(P::K);
        }
    }

    /// Seed layer 0: hash every block, classify each contained hash by its
    /// leading digit, and store the remainder.
    fn digit0(&self, id: usize) {
        let layout = Layout::new::<P>(0);
        let stored = hash_bytes::<P>(0);
        let hash_len = (P::N / 8) as usize;
        let mut block = id as u32;
        while block < P::NBLOCKS {
            let hash = blake::block_hash(&self.state, block);
            let bytes = hash.as_bytes();
            for i in 0..P::HASHES_PER_BLAKE {
                let index = block * P::HASHES_PER_BLAKE + i;
                if index >= P::NHASHES {
                    // The last block may run past the index space.
                    break;
                }
                let ph = &bytes[i as usize * hash_len..][..hash_len];
                let (bucket, xhash) = P::seed_split(ph);
                let slot = self.counts.reserve(0, bucket);
                if slot >= P::NSLOTS {
                    self.bucket_full.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let mut words = [0u32; MAX_HASH_WORDS];
                pack_bytes(&mut words, layout.next_bo, &ph[hash_len - stored..]);
                self.arena.write_slot(
                    0,
                    bucket,
                    slot,
                    Node::<P>::leaf(index, xhash).word(),
                    &words[..layout.next_units],
                );
            }
            block += self.nthreads as u32;
        }
    }

    /// One middle pass: drain layer `r-1`, pair collisions, file the XORs
    /// into layer `r`.
    fn digit_mid<const ODD: bool>(&self, r: u32, id: usize) {
        let layout = Layout::new::<P>(r);
        let mut bucket = id as u32;
        while bucket < P::NBUCKETS {
            let mut finder = Collider::<P>::new();
            let bsize = self.counts.drain(r - 1, bucket);
            for s1 in 0..bsize {
                let node1 = Node::<P>::from_word(self.arena.node(r - 1, bucket, s1));
                let mut hash1 = [0u32; MAX_HASH_WORDS];
                self.arena
                    .read_hash(r - 1, bucket, s1, &mut hash1[..layout.prev_units]);
                let rest = slot_rest::<P, ODD>(node1, &hash1, layout.prev_bo);
                if !finder.add_slot(s1, rest) {
                    self.rest_full.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                while let Some(s0) = finder.next_collision() {
                    let tail = layout.prev_units - 1;
                    if self.arena.hash_word(r - 1, bucket, s0, tail) == hash1[tail] {
                        self.hash_full.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let mut xor = [0u32; MAX_HASH_WORDS];
                    for (i, word) in xor[..layout.prev_units].iter_mut().enumerate() {
                        *word = self.arena.hash_word(r - 1, bucket, s0, i) ^ hash1[i];
                    }
                    let x = [
                        byte_of(&xor, layout.prev_bo),
                        byte_of(&xor, layout.prev_bo + 1),
                        byte_of(&xor, layout.prev_bo + 2),
                        byte_of(&xor, layout.prev_bo + 3),
                    ];
                    let (xor_bucket, xhash) = if ODD {
                        P::xor_split_odd(x)
                    } else {
                        P::xor_split_even(x)
                    };
                    let slot = self.counts.reserve(r, xor_bucket);
                    if slot >= P::NSLOTS {
                        self.bucket_full.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let node = Node::<P>::join(bucket, s0, s1, xhash);
                    self.arena.write_slot(
                        r,
                        xor_bucket,
                        slot,
                        node.word(),
                        &xor[layout.dunits..layout.prev_units],
                    );
                }
            }
            bucket += self.nthreads as u32;
        }
    }

    /// The final pass: a colliding pair whose whole remaining hash matches
    /// zeroes the last digit too, completing a tree.
    fn digit_final<const ODD: bool>(&self, id: usize, proof: &mut [u32], sorted: &mut [u32]) {
        let layout = Layout::new::<P>(P::K);
        let mut bucket = id as u32;
        while bucket < P::NBUCKETS {
            let mut finder = Collider::<P>::new();
            let bsize = self.counts.drain(P::K - 1, bucket);
            for s1 in 0..bsize {
                let node1 = Node::<P>::from_word(self.arena.node(P::K - 1, bucket, s1));
                let mut hash1 = [0u32; MAX_HASH_WORDS];
                self.arena
                    .read_hash(P::K - 1, bucket, s1, &mut hash1[..layout.prev_units]);
                let rest = slot_rest::<P, ODD>(node1, &hash1, layout.prev_bo);
                if !finder.add_slot(s1, rest) {
                    self.rest_full.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                while let Some(s0) = finder.next_collision() {
                    let tail = layout.prev_units - 1;
                    if self.arena.hash_word(P::K - 1, bucket, s0, tail) == hash1[tail] {
                        self.candidate(Node::<P>::join(bucket, s0, s1, 0), proof, sorted);
                    }
                }
            }
            bucket += self.nthreads as u32;
        }
    }

    /// Walk a completed tree into leaf indices, validate, and commit.
    fn candidate(&self, root: Node<P>, proof: &mut [u32], sorted: &mut [u32]) {
        self.list_indices(P::K, root, proof);
        sorted.copy_from_slice(proof);
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[1] <= w[0]) {
            // An index reached the root along two paths; the tree is
            // degenerate even though every pairwise check passed.
            return;
        }
        let mut sols = self.sols.lock().expect("a solver worker panicked");
        if !sols.is_full() && !sols.iter().any(|s| s.indices() == &proof[..]) {
            sols.push(Solution::from_walk(proof));
        }
    }

    /// Recursively expand a node at layer `r` into `2^r` leaf indices,
    /// swapping sibling halves wherever the right one holds the smaller
    /// leftmost leaf.
    fn list_indices(&self, r: u32, node: Node<P>, out: &mut [u32]) {
        if r == 0 {
            out[0] = node.index();
            return;
        }
        let bucket = node.bucket();
        let (left, right) = out.split_at_mut(1 << (r - 1));
        let child = |slot| Node::<P>::from_word(self.arena.node(r - 1, bucket, slot));
        self.list_indices(r - 1, child(node.slot0()), left);
        self.list_indices(r - 1, child(node.slot1()), right);
        if left[0] > right[0] {
            left.swap_with_slice(right);
        }
    }

    /// Snapshot and reset the overflow counters after pass `r`; worker 0
    /// only, inside its barrier window.
    fn record_digit(&self, r: u32) {
        let digit = DigitStats {
            bucket_full: self.bucket_full.swap(0, Ordering::Relaxed),
            rest_full: self.rest_full.swap(0, Ordering::Relaxed),
            hash_full: self.hash_full.swap(0, Ordering::Relaxed),
        };
        tracing::debug!(
            digit = r,
            bucket_full = digit.bucket_full,
            rest_full = digit.rest_full,
            hash_full = digit.hash_full,
            "digit pass complete"
        );
        if r < P::K && tracing::enabled!(tracing::Level::TRACE) {
            let mut full = 0u32;
            let mut max = 0u32;
            for bucket in 0..P::NBUCKETS {
                let n = self.counts.peek(r, bucket);
                full += u32::from(n == P::NSLOTS);
                max = max.max(n);
            }
            tracing::trace!(digit = r, full_buckets = full, max_fill = max, "layer occupancy");
        }
        self.stats
            .lock()
            .expect("a solver worker panicked")
            .digits
            .push(digit);
    }
}

/// A slot's rest value: from its node when cached there, otherwise from the
/// head byte of its stored hash.
#[inline(always)]
fn slot_rest<P: Params, const ODD: bool>(node: Node<P>, hash: &[u32], prev_bo: usize) -> u32 {
    if P::XHASH_IN_NODE {
        node.xhash()
    } else {
        let head = byte_of(hash, prev_bo);
        if ODD {
            P::rest_from_head_odd(head)
        } else {
            P::rest_from_head_even(head)
        }
    }
}

/// Byte `i` of a word array, in stored order.
#[inline(always)]
fn byte_of(words: &[u32], i: usize) -> u8 {
    (words[i / 4] >> (8 * (i % 4))) as u8
}

/// Right-align `src` into `dst` starting at byte offset `bo`.
#[inline(always)]
fn pack_bytes(dst: &mut [u32], bo: usize, src: &[u8]) {
    for (j, &b) in src.iter().enumerate() {
        let at = bo + j;
        dst[at / 4] |= u32::from(b) << (8 * (at % 4));
    }
}
