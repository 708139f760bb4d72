use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use wayfarer_common::RuntimeVersion;

use super::task::ListenerTask;
use super::{Listener, Subscription, SubscriptionId, RUNTIME_VERSION_METHOD};
use crate::error::{SetupError, StopError};
use crate::source::{BlockApi, CoreApi, Notifier};
use crate::types::RuntimeVersionReply;
use crate::websocket::connection::Connection;
use crate::websocket::sender::FrameSender;

/// Sends the current runtime version as soon as it starts listening, then the full version on
/// every runtime upgrade.
pub struct RuntimeVersionListener {
    task: ListenerTask,
}

impl RuntimeVersionListener {
    pub fn new(
        id: SubscriptionId,
        core_api: Arc<dyn CoreApi>,
        block_api: Arc<dyn BlockApi>,
        notifier: Notifier<Arc<RuntimeVersion>>,
        sender: FrameSender,
        cancel_timeout: Duration,
    ) -> Self {
        let notifier_id = notifier.id;
        let consume = forward_versions(core_api, notifier.receiver, sender, id);
        let deregister = move || block_api.free_runtime_version_notifier(notifier_id);

        Self {
            task: ListenerTask::new(consume, deregister, cancel_timeout),
        }
    }
}

#[async_trait]
impl Listener for RuntimeVersionListener {
    fn listen(&self) {
        self.task.start();
    }

    async fn stop(&self) -> Result<(), StopError> {
        self.task.stop().await
    }
}

async fn forward_versions(
    core_api: Arc<dyn CoreApi>,
    mut rx: mpsc::Receiver<Arc<RuntimeVersion>>,
    sender: FrameSender,
    id: SubscriptionId,
) {
    match core_api.runtime_version() {
        Ok(version) => {
            let reply = RuntimeVersionReply::from(&version);
            if sender.notify(RUNTIME_VERSION_METHOD, id, &reply).await.is_err() {
                tracing::debug!(subscription_id=%id, "Connection closed, stopping listener");
                return;
            }
        }
        Err(e) => {
            tracing::warn!(subscription_id=%id, error=%e, "Fetching current runtime version failed");
        }
    }

    while let Some(version) = rx.recv().await {
        let reply = RuntimeVersionReply::from(version.as_ref());
        if sender.notify(RUNTIME_VERSION_METHOD, id, &reply).await.is_err() {
            tracing::debug!(subscription_id=%id, "Connection closed, stopping listener");
            return;
        }
    }
    tracing::trace!(subscription_id=%id, "Runtime version notifier closed");
}

pub(super) fn setup(conn: &Connection, _: &Value) -> Result<Subscription, SetupError> {
    let core_api = conn.context().core_api()?.clone();
    let block_api = conn.context().block_api()?.clone();
    let notifier = block_api.runtime_version_notifier()?;
    let id = conn.allocate_id();
    let listener = RuntimeVersionListener::new(
        id,
        core_api,
        block_api,
        notifier,
        conn.sender().clone(),
        conn.cancel_timeout(),
    );
    Ok(conn.insert(id, Arc::new(listener)))
}
