//! Event sources consumed by the subscription listeners.
//!
//! Block import, finality, storage, the runtime and the transaction pool live outside of this
//! crate. They are reached through the traits below, which hand out bounded channels per
//! subscription and take them back by id. Implementations are shared by every connection and
//! must support concurrent registration and deregistration.
//!
//! [memory::ChainEvents] is an in-memory implementation of all of them.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use wayfarer_common::{
    Block,
    BlockHash,
    Extrinsic,
    FinalisationInfo,
    RuntimeVersion,
    StorageChange,
    StorageKey,
    TransactionStatus,
};

pub mod memory;

/// Identifies a channel handed out by an event source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotifierId(pub u64);

/// Identifies a registered [StorageObserve].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

/// A registered delivery channel. The id must be handed back to the source to deregister.
#[derive(Debug)]
pub struct Notifier<T> {
    pub id: NotifierId,
    pub receiver: mpsc::Receiver<T>,
}

pub trait BlockApi: Send + Sync {
    fn imported_block_notifier(&self) -> Notifier<Arc<Block>>;

    fn free_imported_block_notifier(&self, id: NotifierId);

    fn finalised_notifier(&self) -> Notifier<Arc<FinalisationInfo>>;

    fn free_finalised_notifier(&self, id: NotifierId);

    fn runtime_version_notifier(&self) -> anyhow::Result<Notifier<Arc<RuntimeVersion>>>;

    fn free_runtime_version_notifier(&self, id: NotifierId);

    /// Encoded GRANDPA justification of a finalised block.
    fn justification(&self, hash: BlockHash) -> anyhow::Result<Vec<u8>>;
}

/// Receives storage changes pushed synchronously by the storage subsystem.
pub trait StorageObserve: Send + Sync {
    /// Keys this observer is interested in. An empty filter means every key.
    fn filter(&self) -> &BTreeSet<StorageKey>;

    /// Called with the changes of a block, already narrowed down to [filter](Self::filter).
    /// May be called concurrently and must not block.
    fn update(&self, change: &StorageChange);
}

pub trait StorageApi: Send + Sync {
    fn register_storage_observer(&self, observer: Arc<dyn StorageObserve>) -> ObserverId;

    fn unregister_storage_observer(&self, id: ObserverId);
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The extrinsic is structurally invalid.
    #[error("invalid transaction")]
    Invalid,
    /// The validity of the extrinsic could not be determined.
    #[error("unknown transaction validity")]
    Unknown,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg_attr(test, mockall::automock)]
pub trait CoreApi: Send + Sync {
    fn runtime_version(&self) -> anyhow::Result<RuntimeVersion>;

    /// Validates the extrinsic and adds it to the transaction pool.
    fn handle_submitted_extrinsic(&self, extrinsic: &Extrinsic) -> Result<(), SubmitError>;
}

pub trait TransactionStateApi: Send + Sync {
    /// Pool status changes of the given extrinsic.
    fn status_notifier(&self, extrinsic: &Extrinsic) -> Notifier<TransactionStatus>;

    fn free_status_notifier(&self, id: NotifierId);
}
