//! Public JSON shapes of the values carried by subscription notifications.

use serde::Serialize;
use serde_with::{serde_as, Same};
use wayfarer_common::{
    BlockHash,
    ExtrinsicsRoot,
    Header,
    RuntimeVersion,
    StateRoot,
    StorageChange,
};
use wayfarer_serde::HexBytes;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderReply {
    pub parent_hash: BlockHash,
    /// Big-endian bytes of the block number without leading zero bytes.
    pub number: String,
    pub state_root: StateRoot,
    pub extrinsics_root: ExtrinsicsRoot,
    pub digest: DigestReply,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestReply {
    #[serde_as(as = "Vec<HexBytes>")]
    pub logs: Vec<Vec<u8>>,
}

impl From<&Header> for HeaderReply {
    fn from(header: &Header) -> Self {
        Self {
            parent_hash: header.parent_hash,
            number: wayfarer_serde::encode_prefixed(header.number.to_be_bytes_trimmed()),
            state_root: header.state_root,
            extrinsics_root: header.extrinsics_root,
            digest: DigestReply {
                logs: header.digest.iter().map(|item| item.0.clone()).collect(),
            },
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersionReply {
    pub spec_name: String,
    pub impl_name: String,
    pub authoring_version: u32,
    pub spec_version: u32,
    pub impl_version: u32,
    pub transaction_version: u32,
    #[serde_as(as = "Vec<(HexBytes, Same)>")]
    pub apis: Vec<([u8; 8], u32)>,
}

impl From<&RuntimeVersion> for RuntimeVersionReply {
    fn from(version: &RuntimeVersion) -> Self {
        Self {
            spec_name: version.spec_name.clone(),
            impl_name: version.impl_name.clone(),
            authoring_version: version.authoring_version,
            spec_version: version.spec_version,
            impl_version: version.impl_version,
            transaction_version: version.transaction_version,
            apis: version
                .apis
                .iter()
                .map(|api| (api.name, api.version))
                .collect(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageChangeReply {
    /// `[key, value]` pairs in write order, the value being `null` for removed keys.
    #[serde_as(as = "Vec<(HexBytes, Option<HexBytes>)>")]
    pub changes: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    pub block: BlockHash,
}

impl From<&StorageChange> for StorageChangeReply {
    fn from(change: &StorageChange) -> Self {
        Self {
            changes: change
                .changes
                .iter()
                .map(|kv| (kv.key.0.clone(), kv.value.clone()))
                .collect(),
            block: change.block,
        }
    }
}

/// Block inclusion and finality of a watched extrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtrinsicUpdate {
    #[serde(rename = "inBlock")]
    InBlock(BlockHash),
    #[serde(rename = "finalised")]
    Finalised(BlockHash),
}
