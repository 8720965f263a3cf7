#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cast_lossless)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::unwrap_used)]

mod arena;
mod blake;
mod collision;
mod err;
mod minimal;
mod node;
mod params;
mod solution;
mod solver;
mod verify;

pub use blake::nonce_bytes;
pub use err::Error;
pub use params::{Params, N144K5, N200K9, N96K5};
pub use solution::{Solution, SolutionArray, MAXSOLS};
pub use solver::{DigitStats, RunStats, Solver};
pub use verify::verify_indices;

/// Solve one `(input, nonce)` seed with a throwaway solver.
///
/// Allocates the solver arena for a single run. Callers solving many nonces
/// should construct a [`Solver`] once and reuse it.
pub fn solve<P: Params>(
    input: &[u8],
    nonce: u32,
    nthreads: usize,
) -> Result<SolutionArray, Error> {
    let mut solver = Solver::<P>::new(nthreads)?;
    solver.set_nonce(input, nonce);
    Ok(solver.run())
}

/// Check a [`Solution`] against a seed.
///
/// The solution's structural well-formedness was checked when it was built;
/// this validates the hash tree for this particular `(input, nonce)`.
pub fn verify<P: Params>(input: &[u8], nonce: &[u8], solution: &Solution) -> Result<(), Error> {
    verify_indices::<P>(input, nonce, solution.indices())
}

/// Check a minimal-encoded proof against a seed.
pub fn verify_minimal<P: Params>(input: &[u8], nonce: &[u8], bytes: &[u8]) -> Result<(), Error> {
    verify::<P>(input, nonce, &Solution::try_from_minimal::<P>(bytes)?)
}
