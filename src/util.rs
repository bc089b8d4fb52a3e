//! Utility functions
//!
//! Functions not large enough to warrant their own crate or module, but flexible enough to be used
//! in multiple disjunct places in the library.

use std::fmt;

use hex_fmt::HexFmt;
use tiny_keccak::{Hasher, Sha3};

/// A 128-bit content digest, used wherever message bodies are identified by hash.
pub type Digest = [u8; 16];

/// Prints a byte slice as shortened hexadecimal in debug output.
pub fn fmt_hex<T: AsRef<[u8]>>(bytes: T, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:10}", HexFmt(bytes))
}

/// Hashes a byte slice with SHA3-256 and truncates the result to a 128-bit digest.
pub fn digest(data: &[u8]) -> Digest {
    let mut sha3 = Sha3::v256();
    sha3.update(data);
    let mut full = [0; 32];
    sha3.finalize(&mut full);
    let mut out = [0; 16];
    out.copy_from_slice(&full[..16]);
    out
}

/// Given a number of nodes, returns the maximum number of faulty nodes that can be tolerated: the
/// greatest number less than one third of `n`.
///
/// # Panics
///
/// Panics if `n == 0`.
#[inline]
pub fn max_faulty(n: usize) -> usize {
    assert!(n > 0, "A valid network requires at least one node.");
    (n - 1) / 3
}
