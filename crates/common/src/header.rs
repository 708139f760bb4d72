use crate::{BlockHash, BlockNumber, ExtrinsicsRoot, StateRoot};

/// An encoded digest log item. The encoding is owned by consensus and treated as opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigestItem(pub Vec<u8>);

impl AsRef<[u8]> for DigestItem {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    /// Hash of the encoded header, computed by the block producer.
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub number: BlockNumber,
    pub state_root: StateRoot,
    pub extrinsics_root: ExtrinsicsRoot,
    pub digest: Vec<DigestItem>,
}

pub struct HeaderBuilder(Header);

impl Header {
    /// Creates a [builder](HeaderBuilder) with all fields initialized to default values.
    pub fn builder() -> HeaderBuilder {
        HeaderBuilder(Header::default())
    }

    /// Creates a [builder](HeaderBuilder) with an incremented block number and parent hash set
    /// to this header's hash.
    pub fn child_builder(&self) -> HeaderBuilder {
        HeaderBuilder(Header::default())
            .with_number(self.number + 1)
            .with_parent_hash(self.hash)
    }
}

impl HeaderBuilder {
    pub fn with_number(mut self, number: BlockNumber) -> Self {
        self.0.number = number;
        self
    }

    pub fn with_parent_hash(mut self, parent_hash: BlockHash) -> Self {
        self.0.parent_hash = parent_hash;
        self
    }

    pub fn with_state_root(mut self, state_root: StateRoot) -> Self {
        self.0.state_root = state_root;
        self
    }

    pub fn with_extrinsics_root(mut self, extrinsics_root: ExtrinsicsRoot) -> Self {
        self.0.extrinsics_root = extrinsics_root;
        self
    }

    pub fn with_digest_item(mut self, item: DigestItem) -> Self {
        self.0.digest.push(item);
        self
    }

    pub fn finalize_with_hash(mut self, hash: BlockHash) -> Header {
        self.0.hash = hash;
        self.0
    }
}
