//! An in-memory event source hub.
//!
//! Producers publish through the inherent methods of [ChainEvents], which fan the events out to
//! every registered notifier. Delivery never blocks the producer: a notifier whose buffer is full
//! misses the event and a warning is logged.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::Context;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use wayfarer_common::{
    Block,
    BlockHash,
    Extrinsic,
    FinalisationInfo,
    RuntimeVersion,
    StorageChange,
    TransactionStatus,
};

use super::{
    BlockApi,
    CoreApi,
    Notifier,
    NotifierId,
    ObserverId,
    StorageApi,
    StorageObserve,
    SubmitError,
    TransactionStateApi,
};

/// Buffer size of every notifier channel.
pub const DEFAULT_NOTIFIER_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(x) => x,
    None => panic!("Invalid constant"),
};

pub struct ChainEvents {
    capacity: NonZeroUsize,
    next_id: AtomicU64,
    imported: DashMap<NotifierId, mpsc::Sender<Arc<Block>>>,
    finalised: DashMap<NotifierId, mpsc::Sender<Arc<FinalisationInfo>>>,
    runtime_updates: DashMap<NotifierId, mpsc::Sender<Arc<RuntimeVersion>>>,
    statuses: DashMap<NotifierId, (Extrinsic, mpsc::Sender<TransactionStatus>)>,
    observers: DashMap<ObserverId, Arc<dyn StorageObserve>>,
    justifications: DashMap<BlockHash, Vec<u8>>,
    runtime_version: RwLock<RuntimeVersion>,
    pool: Mutex<Vec<Extrinsic>>,
}

impl Default for ChainEvents {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFIER_CAPACITY)
    }
}

impl ChainEvents {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            next_id: AtomicU64::new(0),
            imported: Default::default(),
            finalised: Default::default(),
            runtime_updates: Default::default(),
            statuses: Default::default(),
            observers: Default::default(),
            justifications: Default::default(),
            runtime_version: Default::default(),
            pool: Default::default(),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register<T>(&self, senders: &DashMap<NotifierId, mpsc::Sender<T>>) -> Notifier<T> {
        let (tx, receiver) = mpsc::channel(self.capacity.get());
        let id = NotifierId(self.next_id());
        senders.insert(id, tx);
        Notifier { id, receiver }
    }

    pub fn import_block(&self, block: Block) {
        tracing::trace!(number=%block.header.number, hash=%block.header.hash, "Block imported");
        broadcast(&self.imported, Arc::new(block), "imported block");
    }

    pub fn finalise(&self, info: FinalisationInfo) {
        tracing::trace!(number=%info.header.number, hash=%info.header.hash, "Block finalised");
        broadcast(&self.finalised, Arc::new(info), "finalised block");
    }

    pub fn update_runtime(&self, version: RuntimeVersion) {
        *self
            .runtime_version
            .write()
            .unwrap_or_else(PoisonError::into_inner) = version.clone();
        broadcast(&self.runtime_updates, Arc::new(version), "runtime version");
    }

    /// Pushes the change to every observer with a matching filter.
    pub fn change_storage(&self, change: &StorageChange) {
        for observer in self.observers.iter() {
            let filtered = change.filtered(observer.filter());
            if !filtered.is_empty() {
                observer.update(&filtered);
            }
        }
    }

    pub fn set_transaction_status(&self, extrinsic: &Extrinsic, status: TransactionStatus) {
        for entry in self.statuses.iter() {
            let (watched, sender) = entry.value();
            if watched == extrinsic {
                try_deliver(sender, status, "transaction status");
            }
        }
    }

    pub fn insert_justification(&self, hash: BlockHash, justification: Vec<u8>) {
        self.justifications.insert(hash, justification);
    }

    pub fn remove_justification(&self, hash: &BlockHash) {
        self.justifications.remove(hash);
    }

    /// Removes and returns the extrinsics waiting in the pool.
    pub fn drain_pool(&self) -> Vec<Extrinsic> {
        std::mem::take(&mut *self.pool.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn imported_notifier_count(&self) -> usize {
        self.imported.len()
    }

    pub fn finalised_notifier_count(&self) -> usize {
        self.finalised.len()
    }

    pub fn runtime_notifier_count(&self) -> usize {
        self.runtime_updates.len()
    }

    pub fn status_notifier_count(&self) -> usize {
        self.statuses.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

fn broadcast<T: Clone>(senders: &DashMap<NotifierId, mpsc::Sender<T>>, item: T, kind: &str) {
    for sender in senders.iter() {
        try_deliver(sender.value(), item.clone(), kind);
    }
}

fn try_deliver<T>(sender: &mpsc::Sender<T>, item: T, kind: &str) {
    match sender.try_send(item) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            tracing::warn!(%kind, "Notifier buffer full, dropping event");
        }
        // The receiving listener is shutting down and will free the notifier.
        Err(TrySendError::Closed(_)) => {}
    }
}

impl BlockApi for ChainEvents {
    fn imported_block_notifier(&self) -> Notifier<Arc<Block>> {
        self.register(&self.imported)
    }

    fn free_imported_block_notifier(&self, id: NotifierId) {
        self.imported.remove(&id);
    }

    fn finalised_notifier(&self) -> Notifier<Arc<FinalisationInfo>> {
        self.register(&self.finalised)
    }

    fn free_finalised_notifier(&self, id: NotifierId) {
        self.finalised.remove(&id);
    }

    fn runtime_version_notifier(&self) -> anyhow::Result<Notifier<Arc<RuntimeVersion>>> {
        Ok(self.register(&self.runtime_updates))
    }

    fn free_runtime_version_notifier(&self, id: NotifierId) {
        self.runtime_updates.remove(&id);
    }

    fn justification(&self, hash: BlockHash) -> anyhow::Result<Vec<u8>> {
        self.justifications
            .get(&hash)
            .map(|x| x.value().clone())
            .with_context(|| format!("No justification for block {hash}"))
    }
}

impl StorageApi for ChainEvents {
    fn register_storage_observer(&self, observer: Arc<dyn StorageObserve>) -> ObserverId {
        let id = ObserverId(self.next_id());
        self.observers.insert(id, observer);
        id
    }

    fn unregister_storage_observer(&self, id: ObserverId) {
        self.observers.remove(&id);
    }
}

impl CoreApi for ChainEvents {
    fn runtime_version(&self) -> anyhow::Result<RuntimeVersion> {
        Ok(self
            .runtime_version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn handle_submitted_extrinsic(&self, extrinsic: &Extrinsic) -> Result<(), SubmitError> {
        if extrinsic.0.is_empty() {
            return Err(SubmitError::Invalid);
        }

        {
            let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
            if pool.contains(extrinsic) {
                return Err(SubmitError::Other(anyhow::anyhow!(
                    "transaction already imported"
                )));
            }
            pool.push(extrinsic.clone());
        }

        self.set_transaction_status(extrinsic, TransactionStatus::Ready);
        Ok(())
    }
}

impl TransactionStateApi for ChainEvents {
    fn status_notifier(&self, extrinsic: &Extrinsic) -> Notifier<TransactionStatus> {
        let (tx, receiver) = mpsc::channel(self.capacity.get());
        let id = NotifierId(self.next_id());
        self.statuses.insert(id, (extrinsic.clone(), tx));
        Notifier { id, receiver }
    }

    fn free_status_notifier(&self, id: NotifierId) {
        self.statuses.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions_sorted::assert_eq;
    use wayfarer_common::{Header, KeyValue, StorageKey};

    use super::*;

    struct Recorder {
        filter: BTreeSet<StorageKey>,
        changes: Mutex<Vec<StorageChange>>,
    }

    impl StorageObserve for Recorder {
        fn filter(&self) -> &BTreeSet<StorageKey> {
            &self.filter
        }

        fn update(&self, change: &StorageChange) {
            self.changes.lock().unwrap().push(change.clone());
        }
    }

    #[tokio::test]
    async fn blocks_are_fanned_out() {
        let events = ChainEvents::default();
        let mut first = events.imported_block_notifier();
        let mut second = events.imported_block_notifier();

        let block = Block {
            header: Header::builder().finalize_with_hash(BlockHash::from_bytes([1; 32])),
            body: vec![],
        };
        events.import_block(block.clone());

        assert_eq!(*first.receiver.recv().await.unwrap(), block);
        assert_eq!(*second.receiver.recv().await.unwrap(), block);
    }

    #[tokio::test]
    async fn freed_notifier_is_closed() {
        let events = ChainEvents::default();
        let mut notifier = events.finalised_notifier();
        assert_eq!(events.finalised_notifier_count(), 1);

        events.free_finalised_notifier(notifier.id);

        assert_eq!(events.finalised_notifier_count(), 0);
        assert!(notifier.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_notifier_drops_events() {
        let events = ChainEvents::new(NonZeroUsize::new(1).unwrap());
        let mut notifier = events.imported_block_notifier();

        events.import_block(Block::default());
        events.import_block(Block::default());

        assert!(notifier.receiver.recv().await.is_some());
        assert!(notifier.receiver.try_recv().is_err());
    }

    #[test]
    fn storage_changes_are_filtered_per_observer() {
        let events = ChainEvents::default();
        let everything = Arc::new(Recorder {
            filter: BTreeSet::new(),
            changes: Default::default(),
        });
        let narrow = Arc::new(Recorder {
            filter: BTreeSet::from([StorageKey(vec![0xff])]),
            changes: Default::default(),
        });
        events.register_storage_observer(everything.clone());
        let narrow_id = events.register_storage_observer(narrow.clone());

        let change = StorageChange {
            block: BlockHash::from_bytes([2; 32]),
            changes: vec![KeyValue {
                key: StorageKey(vec![0x26, 0xaa]),
                value: Some(vec![1]),
            }],
        };
        events.change_storage(&change);

        assert_eq!(*everything.changes.lock().unwrap(), vec![change]);
        assert!(narrow.changes.lock().unwrap().is_empty());

        events.unregister_storage_observer(narrow_id);
        assert_eq!(events.observer_count(), 1);
    }

    #[tokio::test]
    async fn submission_marks_extrinsic_ready() {
        let events = ChainEvents::default();
        let extrinsic = Extrinsic(vec![1, 2, 3]);
        let mut statuses = events.status_notifier(&extrinsic);

        events.handle_submitted_extrinsic(&extrinsic).unwrap();

        assert_eq!(statuses.receiver.recv().await, Some(TransactionStatus::Ready));
        assert_eq!(events.drain_pool(), vec![extrinsic.clone()]);
        assert!(events.drain_pool().is_empty());
    }

    #[test]
    fn empty_extrinsic_is_invalid() {
        let events = ChainEvents::default();
        assert!(matches!(
            events.handle_submitted_extrinsic(&Extrinsic::default()),
            Err(SubmitError::Invalid)
        ));
    }

    #[test]
    fn missing_justification_is_an_error() {
        let events = ChainEvents::default();
        let hash = BlockHash::from_bytes([3; 32]);
        assert!(events.justification(hash).is_err());

        events.insert_justification(hash, vec![1, 2]);
        assert_eq!(events.justification(hash).unwrap(), vec![1, 2]);
    }
}
