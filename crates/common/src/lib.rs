//! Contains the chain types shared by the Wayfarer crates.
//!
//! These are produced by block import, finality and the runtime, and consumed by the RPC layer.
//! Encoding is owned by the producers, which is why a [Header] carries its own precomputed
//! [BlockHash].
use serde::{Deserialize, Serialize};

mod header;
mod macros;
pub mod runtime;
pub mod storage;
pub mod transaction;

pub use header::{DigestItem, Header, HeaderBuilder};
pub use runtime::{ApiItem, RuntimeVersion};
pub use storage::{KeyValue, StorageChange, StorageKey};
pub use transaction::TransactionStatus;

macros::hash_newtypes!(BlockHash, StateRoot, ExtrinsicsRoot);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockNumber(u64);

impl BlockNumber {
    pub const GENESIS: BlockNumber = BlockNumber(0);

    pub const fn new(val: u64) -> Self {
        Self(val)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the parent's [BlockNumber] or [None] if the current number is genesis.
    pub fn parent(&self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// Big-endian bytes with leading zeros stripped, keeping at least one byte.
    pub fn to_be_bytes_trimmed(&self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        let first = bytes
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(bytes.len() - 1);
        bytes[first..].to_vec()
    }
}

impl std::fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::ops::Add<u64> for BlockNumber {
    type Output = BlockNumber;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl std::ops::AddAssign<u64> for BlockNumber {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

/// An opaque, encoded extrinsic as submitted by a client and stored in block bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Extrinsic(pub Vec<u8>);

impl AsRef<[u8]> for Extrinsic {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Extrinsic {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub header: Header,
    pub body: Vec<Extrinsic>,
}

impl Block {
    /// Byte-exact search of the block body.
    pub fn has_extrinsic(&self, extrinsic: &Extrinsic) -> bool {
        self.body.iter().any(|x| x == extrinsic)
    }
}

/// A finalised header together with the GRANDPA round and authority set which finalised it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FinalisationInfo {
    pub header: Header,
    pub round: u64,
    pub set_id: u64,
}
