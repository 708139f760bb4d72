use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use wayfarer_common::FinalisationInfo;

use super::task::ListenerTask;
use super::{Listener, Subscription, SubscriptionId, JUSTIFICATIONS_METHOD};
use crate::error::{SetupError, StopError};
use crate::source::{BlockApi, Notifier};
use crate::websocket::connection::Connection;
use crate::websocket::sender::FrameSender;

/// Sends the hex encoded GRANDPA justification of every finalised block.
///
/// Blocks whose justification cannot be fetched are skipped.
pub struct GrandpaJustificationListener {
    task: ListenerTask,
}

impl GrandpaJustificationListener {
    pub fn new(
        id: SubscriptionId,
        api: Arc<dyn BlockApi>,
        notifier: Notifier<Arc<FinalisationInfo>>,
        sender: FrameSender,
        cancel_timeout: Duration,
    ) -> Self {
        let notifier_id = notifier.id;
        let consume = forward_justifications(api.clone(), notifier.receiver, sender, id);
        let deregister = move || api.free_finalised_notifier(notifier_id);

        Self {
            task: ListenerTask::new(consume, deregister, cancel_timeout),
        }
    }
}

#[async_trait]
impl Listener for GrandpaJustificationListener {
    fn listen(&self) {
        self.task.start();
    }

    async fn stop(&self) -> Result<(), StopError> {
        self.task.stop().await
    }
}

async fn forward_justifications(
    api: Arc<dyn BlockApi>,
    mut rx: mpsc::Receiver<Arc<FinalisationInfo>>,
    sender: FrameSender,
    id: SubscriptionId,
) {
    while let Some(info) = rx.recv().await {
        let hash = info.header.hash;
        let fetch = {
            let api = api.clone();
            tokio::task::spawn_blocking(move || api.justification(hash))
        };

        let justification = match fetch.await {
            Ok(Ok(justification)) => justification,
            Ok(Err(e)) => {
                tracing::debug!(subscription_id=%id, block=%hash, error=%e, "Fetching justification failed");
                continue;
            }
            Err(e) => {
                tracing::debug!(subscription_id=%id, block=%hash, error=%e, "Justification task failed");
                continue;
            }
        };

        let justification = wayfarer_serde::encode_prefixed(justification);
        if sender
            .notify(JUSTIFICATIONS_METHOD, id, &justification)
            .await
            .is_err()
        {
            tracing::debug!(subscription_id=%id, "Connection closed, stopping listener");
            return;
        }
    }
    tracing::trace!(subscription_id=%id, "Finalised block notifier closed");
}

pub(super) fn setup(conn: &Connection, _: &Value) -> Result<Subscription, SetupError> {
    let api = conn.context().block_api()?.clone();
    let notifier = api.finalised_notifier();
    let id = conn.allocate_id();
    let listener = GrandpaJustificationListener::new(
        id,
        api,
        notifier,
        conn.sender().clone(),
        conn.cancel_timeout(),
    );
    Ok(conn.insert(id, Arc::new(listener)))
}
