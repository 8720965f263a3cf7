//! Error types for the `equihashx` crate

/// Errors from constructing a solver or checking a proof
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The solver was asked to run with zero worker threads.
    #[error("thread count must be nonzero")]
    Threads,

    /// A proof or its minimal encoding has the wrong length.
    #[error("proof has the wrong length for this parameterization")]
    Malformed,

    /// A proof index falls outside the `2^(n+1)` hash space.
    #[error("proof index outside the hash space")]
    IndexRange,

    /// Two sibling subtrees violate the left-before-right leaf ordering.
    ///
    /// Equihash requires the leftmost leaf of every left subtree to be
    /// smaller than the leftmost leaf of its sibling. This canonicalizes
    /// the otherwise ambiguous order of XOR operands.
    #[error("proof subtrees are not in canonical order")]
    Order,

    /// The same leaf index appears more than once in the proof.
    #[error("duplicate index in proof")]
    DuplicateIndices,

    /// Two sibling subtrees fail to collide on their digit.
    ///
    /// Every height-`i` subtree's XOR must start with `i*n` zero bits;
    /// one of the per-level collision checks found a nonzero digit.
    #[error("proof subtrees do not collide on the digit")]
    Collision,

    /// The XOR over all leaf hashes is not the all-zero vector.
    #[error("root XOR of the proof is nonzero")]
    NonZeroRoot,
}
