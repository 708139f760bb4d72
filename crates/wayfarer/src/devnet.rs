//! A development block producer which drives the in-memory event hub.
//!
//! Every tick seals the pooled extrinsics into a child of the current head, imports it, and
//! finalises the previous head together with a justification. Finality therefore trails the
//! best block by one. Each block also writes its number to [HEAD_NUMBER_KEY] so storage
//! subscriptions have something to watch.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use sha3::{Digest, Keccak256};
use tokio::task::JoinHandle;
use wayfarer_common::{
    Block,
    BlockHash,
    BlockNumber,
    Extrinsic,
    ExtrinsicsRoot,
    FinalisationInfo,
    Header,
    KeyValue,
    StateRoot,
    StorageChange,
    StorageKey,
};
use wayfarer_rpc::source::memory::ChainEvents;

/// Storage key holding the little-endian number of the latest block.
pub const HEAD_NUMBER_KEY: &[u8] = b":devnet:head";

/// Number of most recently finalised blocks whose justifications are kept.
pub const JUSTIFICATION_WINDOW: usize = 256;

pub struct BlockProducer {
    events: Arc<ChainEvents>,
    head: Header,
    justified: VecDeque<BlockHash>,
}

impl BlockProducer {
    pub fn new(events: Arc<ChainEvents>) -> Self {
        let mut genesis = Header::builder().finalize_with_hash(BlockHash::ZERO);
        genesis.hash = seal(&genesis);
        Self {
            events,
            head: genesis,
            justified: VecDeque::with_capacity(JUSTIFICATION_WINDOW + 1),
        }
    }

    pub fn head(&self) -> &Header {
        &self.head
    }

    /// Produces, imports and announces the next block.
    pub fn produce(&mut self) -> Block {
        let body = self.events.drain_pool();
        let number = self.head.number + 1;

        let mut header = self
            .head
            .child_builder()
            .with_extrinsics_root(extrinsics_root(&body))
            .with_state_root(state_root(self.head.state_root, number))
            .finalize_with_hash(BlockHash::ZERO);
        header.hash = seal(&header);

        let block = Block { header, body };
        self.events.import_block(block.clone());

        let parent = std::mem::replace(&mut self.head, block.header.clone());
        self.events
            .insert_justification(parent.hash, justification(&parent));
        self.justified.push_back(parent.hash);
        if self.justified.len() > JUSTIFICATION_WINDOW {
            if let Some(oldest) = self.justified.pop_front() {
                self.events.remove_justification(&oldest);
            }
        }
        self.events.finalise(FinalisationInfo {
            round: parent.number.get(),
            set_id: 0,
            header: parent,
        });

        self.events.change_storage(&StorageChange {
            block: block.header.hash,
            changes: vec![KeyValue {
                key: StorageKey(HEAD_NUMBER_KEY.to_vec()),
                value: Some(number.get().to_le_bytes().to_vec()),
            }],
        });

        tracing::debug!(
            %number,
            hash=%block.header.hash,
            extrinsics=block.body.len(),
            "Produced block"
        );

        block
    }
}

/// Produces a block every `block_time` until the returned task is aborted.
pub fn spawn(events: Arc<ChainEvents>, block_time: Duration) -> JoinHandle<()> {
    let mut producer = BlockProducer::new(events);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(block_time);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            producer.produce();
        }
    })
}

fn keccak(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Hashes every header field except the hash itself.
fn seal(header: &Header) -> BlockHash {
    let digest = header
        .digest
        .iter()
        .flat_map(|item| item.0.iter().copied())
        .collect::<Vec<_>>();

    BlockHash::from_bytes(keccak(&[
        header.parent_hash.as_bytes(),
        &header.number.get().to_be_bytes()[..],
        header.state_root.as_bytes(),
        header.extrinsics_root.as_bytes(),
        digest.as_slice(),
    ]))
}

fn extrinsics_root(body: &[Extrinsic]) -> ExtrinsicsRoot {
    let leaves = body
        .iter()
        .map(|extrinsic| keccak(&[extrinsic.as_ref()]))
        .collect::<Vec<_>>();
    let leaves = leaves.iter().map(|x| x.as_slice()).collect::<Vec<_>>();

    ExtrinsicsRoot::from_bytes(keccak(&leaves))
}

fn state_root(parent: StateRoot, number: BlockNumber) -> StateRoot {
    StateRoot::from_bytes(keccak(&[
        parent.as_bytes(),
        HEAD_NUMBER_KEY,
        &number.get().to_le_bytes()[..],
    ]))
}

fn justification(header: &Header) -> Vec<u8> {
    let mut justification = header.number.get().to_le_bytes().to_vec();
    justification.extend_from_slice(header.hash.as_bytes());
    justification
}
