//! Instance identifiers and common-coin seeds.
//!
//! Every protocol run is disambiguated by a 128-bit instance identifier. Sub-instances, such as
//! the binary agreement run for one proposer's slot within a common subset, derive their
//! identifier deterministically from the parent's, so that all participants agree on the identity
//! of every nested instance without further communication.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use rand::distributions::{Distribution, Standard};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::util;

/// A 128-bit identifier of one protocol instance.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct InstanceId([u8; 16]);

impl InstanceId {
    /// The length of an instance identifier in bytes.
    pub const BYTES: usize = 16;

    /// Creates an instance identifier from its raw byte representation.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        InstanceId(bytes)
    }

    /// Returns the raw byte representation.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Derives the identifier of a sub-instance from a parent identifier and distinguishing
    /// material, by hashing the parent's bytes followed by the material.
    ///
    /// The derivation is deterministic: participants that agree on the parent instance and the
    /// material agree on the derived identifier.
    pub fn derive(parent: &InstanceId, material: &[u8]) -> Self {
        let mut input = Vec::with_capacity(Self::BYTES + material.len());
        input.extend_from_slice(&parent.0);
        input.extend_from_slice(material);
        InstanceId(util::digest(&input))
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InstanceId(")?;
        util::fmt_hex(&self.0, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        util::fmt_hex(&self.0, f)
    }
}

impl Distribution<InstanceId> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> InstanceId {
        let mut bytes = [0; 16];
        rng.fill_bytes(&mut bytes);
        InstanceId(bytes)
    }
}

/// The seed identifying one common-coin toss: the requesting instance's identifier followed by
/// the little-endian round number, 18 bytes in total.
///
/// The byte layout is part of the protocol: the coin oracle returns the same bit to every correct
/// participant per distinct seed, so all participants must construct byte-identical seeds for the
/// same instance and round.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoinSeed([u8; 18]);

impl CoinSeed {
    /// The length of a coin seed in bytes.
    pub const BYTES: usize = 18;

    /// Constructs the seed for the given instance and round.
    pub fn new(instance_id: InstanceId, round: u16) -> Self {
        let mut bytes = [0; 18];
        bytes[..16].copy_from_slice(instance_id.as_bytes());
        LittleEndian::write_u16(&mut bytes[16..], round);
        CoinSeed(bytes)
    }

    /// The identifier of the instance that requested the toss.
    pub fn instance_id(&self) -> InstanceId {
        let mut id = [0; 16];
        id.copy_from_slice(&self.0[..16]);
        InstanceId::from_bytes(id)
    }

    /// The agreement round the toss belongs to.
    pub fn round(&self) -> u16 {
        LittleEndian::read_u16(&self.0[16..])
    }

    /// Returns the seed's wire representation.
    pub fn as_bytes(&self) -> &[u8; 18] {
        &self.0
    }
}

impl fmt::Debug for CoinSeed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CoinSeed({}, round {})", self.instance_id(), self.round())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_seed_layout() {
        let id = InstanceId::from_bytes([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ]);
        let seed = CoinSeed::new(id, 0x0102);
        // Identifier bytes verbatim, then the round in little-endian order.
        assert_eq!(
            seed.as_bytes(),
            &[
                0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
                0x0d, 0x0e, 0x0f, 0x02, 0x01,
            ]
        );
        assert_eq!(seed.instance_id(), id);
        assert_eq!(seed.round(), 0x0102);
    }

    #[test]
    fn derivation_is_deterministic() {
        let parent = InstanceId::from_bytes([7; 16]);
        let derived = InstanceId::derive(&parent, b"proposer-0");
        assert_eq!(derived, InstanceId::derive(&parent, b"proposer-0"));
        assert_ne!(derived, InstanceId::derive(&parent, b"proposer-1"));
        assert_ne!(derived, InstanceId::derive(&InstanceId::from_bytes([8; 16]), b"proposer-0"));
        assert_ne!(derived, parent);
    }
}
