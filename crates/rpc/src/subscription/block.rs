use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use wayfarer_common::{Block, FinalisationInfo, Header};

use super::task::ListenerTask;
use super::{
    Listener,
    Subscription,
    SubscriptionId,
    ALL_HEAD_METHOD,
    FINALIZED_HEAD_METHOD,
    NEW_HEAD_METHOD,
};
use crate::error::{SetupError, StopError};
use crate::source::{BlockApi, Notifier};
use crate::types::HeaderReply;
use crate::websocket::connection::Connection;
use crate::websocket::sender::FrameSender;

/// Sends a `chain_newHead` notification for every imported block.
pub struct BlockListener {
    task: ListenerTask,
}

impl BlockListener {
    pub fn new(
        id: SubscriptionId,
        api: Arc<dyn BlockApi>,
        notifier: Notifier<Arc<Block>>,
        sender: FrameSender,
        cancel_timeout: Duration,
    ) -> Self {
        let notifier_id = notifier.id;
        let consume = forward_headers(notifier.receiver, sender, NEW_HEAD_METHOD, id, block_header);
        let deregister = move || api.free_imported_block_notifier(notifier_id);

        Self {
            task: ListenerTask::new(consume, deregister, cancel_timeout),
        }
    }
}

#[async_trait]
impl Listener for BlockListener {
    fn listen(&self) {
        self.task.start();
    }

    async fn stop(&self) -> Result<(), StopError> {
        self.task.stop().await
    }
}

/// Sends a `chain_finalizedHead` notification for every finalised block.
pub struct BlockFinalizedListener {
    task: ListenerTask,
}

impl BlockFinalizedListener {
    pub fn new(
        id: SubscriptionId,
        api: Arc<dyn BlockApi>,
        notifier: Notifier<Arc<FinalisationInfo>>,
        sender: FrameSender,
        cancel_timeout: Duration,
    ) -> Self {
        let notifier_id = notifier.id;
        let consume = forward_headers(
            notifier.receiver,
            sender,
            FINALIZED_HEAD_METHOD,
            id,
            finalised_header,
        );
        let deregister = move || api.free_finalised_notifier(notifier_id);

        Self {
            task: ListenerTask::new(consume, deregister, cancel_timeout),
        }
    }
}

#[async_trait]
impl Listener for BlockFinalizedListener {
    fn listen(&self) {
        self.task.start();
    }

    async fn stop(&self) -> Result<(), StopError> {
        self.task.stop().await
    }
}

/// Merges imported and finalised blocks into one `chain_allHead` stream, in arrival order.
pub struct AllBlocksListener {
    task: ListenerTask,
}

impl AllBlocksListener {
    pub fn new(
        id: SubscriptionId,
        api: Arc<dyn BlockApi>,
        imported: Notifier<Arc<Block>>,
        finalised: Notifier<Arc<FinalisationInfo>>,
        sender: FrameSender,
        cancel_timeout: Duration,
    ) -> Self {
        let (imported_id, finalised_id) = (imported.id, finalised.id);
        let consume = merge_headers(imported.receiver, finalised.receiver, sender, id);
        let deregister = move || {
            api.free_imported_block_notifier(imported_id);
            api.free_finalised_notifier(finalised_id);
        };

        Self {
            task: ListenerTask::new(consume, deregister, cancel_timeout),
        }
    }
}

#[async_trait]
impl Listener for AllBlocksListener {
    fn listen(&self) {
        self.task.start();
    }

    async fn stop(&self) -> Result<(), StopError> {
        self.task.stop().await
    }
}

fn block_header(block: &Block) -> &Header {
    &block.header
}

fn finalised_header(info: &FinalisationInfo) -> &Header {
    &info.header
}

async fn forward_headers<T: Send + Sync + 'static>(
    mut rx: mpsc::Receiver<Arc<T>>,
    sender: FrameSender,
    method: &'static str,
    id: SubscriptionId,
    header: fn(&T) -> &Header,
) {
    while let Some(item) = rx.recv().await {
        let reply = HeaderReply::from(header(&item));
        if sender.notify(method, id, &reply).await.is_err() {
            tracing::debug!(subscription_id=%id, %method, "Connection closed, stopping listener");
            return;
        }
    }
    tracing::trace!(subscription_id=%id, %method, "Block notifier closed");
}

async fn merge_headers(
    mut imported: mpsc::Receiver<Arc<Block>>,
    mut finalised: mpsc::Receiver<Arc<FinalisationInfo>>,
    sender: FrameSender,
    id: SubscriptionId,
) {
    loop {
        let reply = tokio::select! {
            block = imported.recv() => match block {
                Some(block) => HeaderReply::from(&block.header),
                None => break,
            },
            info = finalised.recv() => match info {
                Some(info) => HeaderReply::from(&info.header),
                None => break,
            },
        };

        if sender.notify(ALL_HEAD_METHOD, id, &reply).await.is_err() {
            tracing::debug!(subscription_id=%id, "Connection closed, stopping listener");
            return;
        }
    }
    tracing::trace!(subscription_id=%id, "Block notifier closed");
}

pub(super) fn setup_new_heads(conn: &Connection, _: &Value) -> Result<Subscription, SetupError> {
    let api = conn.context().block_api()?.clone();
    let notifier = api.imported_block_notifier();
    let id = conn.allocate_id();
    let listener = BlockListener::new(
        id,
        api,
        notifier,
        conn.sender().clone(),
        conn.cancel_timeout(),
    );
    Ok(conn.insert(id, Arc::new(listener)))
}

pub(super) fn setup_finalized_heads(
    conn: &Connection,
    _: &Value,
) -> Result<Subscription, SetupError> {
    let api = conn.context().block_api()?.clone();
    let notifier = api.finalised_notifier();
    let id = conn.allocate_id();
    let listener = BlockFinalizedListener::new(
        id,
        api,
        notifier,
        conn.sender().clone(),
        conn.cancel_timeout(),
    );
    Ok(conn.insert(id, Arc::new(listener)))
}

pub(super) fn setup_all_heads(conn: &Connection, _: &Value) -> Result<Subscription, SetupError> {
    let api = conn.context().block_api()?.clone();
    let imported = api.imported_block_notifier();
    let finalised = api.finalised_notifier();
    let id = conn.allocate_id();
    let listener = AllBlocksListener::new(
        id,
        api,
        imported,
        finalised,
        conn.sender().clone(),
        conn.cancel_timeout(),
    );
    Ok(conn.insert(id, Arc::new(listener)))
}
