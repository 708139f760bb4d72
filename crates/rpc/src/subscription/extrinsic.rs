use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use wayfarer_common::{Block, BlockHash, Extrinsic, FinalisationInfo, TransactionStatus};

use super::task::ListenerTask;
use super::{Listener, Subscription, SubscriptionId, EXTRINSIC_UPDATE_METHOD};
use crate::error::{SetupError, StopError};
use crate::source::{BlockApi, Notifier, SubmitError, TransactionStateApi};
use crate::types::ExtrinsicUpdate;
use crate::websocket::connection::Connection;
use crate::websocket::sender::{ConnectionClosed, FrameSender};

/// Channels consumed by an [ExtrinsicSubmitListener].
pub struct ExtrinsicNotifiers {
    pub imported: Notifier<Arc<Block>>,
    pub finalised: Notifier<Arc<FinalisationInfo>>,
    pub status: Notifier<TransactionStatus>,
}

/// Follows a submitted extrinsic through the transaction pool, block inclusion and finality.
///
/// Pool statuses are forwarded as they arrive. Every imported block containing the extrinsic
/// latches its hash and produces an `inBlock` update; a finalised block with the latched hash
/// produces a `finalised` update. The listener keeps running after finality until it is
/// stopped.
pub struct ExtrinsicSubmitListener {
    task: ListenerTask,
}

impl ExtrinsicSubmitListener {
    pub fn new(
        id: SubscriptionId,
        extrinsic: Extrinsic,
        block_api: Arc<dyn BlockApi>,
        state_api: Arc<dyn TransactionStateApi>,
        notifiers: ExtrinsicNotifiers,
        sender: FrameSender,
        cancel_timeout: Duration,
    ) -> Self {
        let ExtrinsicNotifiers {
            imported,
            finalised,
            status,
        } = notifiers;
        let (imported_id, finalised_id, status_id) = (imported.id, finalised.id, status.id);

        let watch = Watch {
            id,
            extrinsic,
            sender,
            imported_hash: None,
        };
        let consume = watch.run(imported.receiver, finalised.receiver, status.receiver);
        let deregister = move || {
            block_api.free_imported_block_notifier(imported_id);
            block_api.free_finalised_notifier(finalised_id);
            state_api.free_status_notifier(status_id);
        };

        Self {
            task: ListenerTask::new(consume, deregister, cancel_timeout),
        }
    }

    /// Releases the channels of a listener which will never be started.
    pub fn discard(&self) {
        self.task.discard();
    }
}

#[async_trait]
impl Listener for ExtrinsicSubmitListener {
    fn listen(&self) {
        self.task.start();
    }

    async fn stop(&self) -> Result<(), StopError> {
        self.task.stop().await
    }
}

struct Watch {
    id: SubscriptionId,
    extrinsic: Extrinsic,
    sender: FrameSender,
    imported_hash: Option<BlockHash>,
}

impl Watch {
    async fn run(
        mut self,
        mut imported: mpsc::Receiver<Arc<Block>>,
        mut finalised: mpsc::Receiver<Arc<FinalisationInfo>>,
        mut status: mpsc::Receiver<TransactionStatus>,
    ) {
        let mut status_open = true;

        loop {
            let sent = tokio::select! {
                block = imported.recv() => match block {
                    Some(block) => self.on_imported(&block).await,
                    None => break,
                },
                info = finalised.recv() => match info {
                    Some(info) => self.on_finalised(&info).await,
                    None => break,
                },
                update = status.recv(), if status_open => match update {
                    Some(update) => {
                        self.sender.notify(EXTRINSIC_UPDATE_METHOD, self.id, &update).await
                    }
                    None => {
                        status_open = false;
                        Ok(())
                    }
                },
            };

            if sent.is_err() {
                tracing::debug!(subscription_id=%self.id, "Connection closed, stopping listener");
                return;
            }
        }
        tracing::trace!(subscription_id=%self.id, "Block notifier closed");
    }

    async fn on_imported(&mut self, block: &Block) -> Result<(), ConnectionClosed> {
        if !block.has_extrinsic(&self.extrinsic) {
            return Ok(());
        }

        let hash = block.header.hash;
        self.imported_hash = Some(hash);
        self.sender
            .notify(EXTRINSIC_UPDATE_METHOD, self.id, &ExtrinsicUpdate::InBlock(hash))
            .await
    }

    async fn on_finalised(&self, info: &FinalisationInfo) -> Result<(), ConnectionClosed> {
        let hash = info.header.hash;
        if self.imported_hash != Some(hash) {
            return Ok(());
        }

        self.sender
            .notify(EXTRINSIC_UPDATE_METHOD, self.id, &ExtrinsicUpdate::Finalised(hash))
            .await
    }
}

fn parse_extrinsic(params: &Value) -> Result<Extrinsic, SetupError> {
    let params = params
        .as_array()
        .ok_or_else(|| SetupError::unexpected_type(params, "array"))?;
    let [extrinsic] = params.as_slice() else {
        return Err(SetupError::ParamCount {
            expected: 1,
            actual: params.len(),
        });
    };
    let extrinsic = extrinsic
        .as_str()
        .ok_or_else(|| SetupError::unexpected_type(extrinsic, "string"))?;

    Ok(Extrinsic(wayfarer_serde::decode_prefixed(extrinsic)?))
}

pub(super) fn setup(conn: &Connection, params: &Value) -> Result<Subscription, SetupError> {
    let extrinsic = parse_extrinsic(params)?;

    let context = conn.context();
    let block_api = context.block_api()?.clone();
    let core_api = context.core_api()?.clone();
    let state_api = context.transaction_state_api()?.clone();

    let notifiers = ExtrinsicNotifiers {
        imported: block_api.imported_block_notifier(),
        finalised: block_api.finalised_notifier(),
        status: state_api.status_notifier(&extrinsic),
    };

    let id = conn.allocate_id();
    let listener = Arc::new(ExtrinsicSubmitListener::new(
        id,
        extrinsic.clone(),
        block_api,
        state_api,
        notifiers,
        conn.sender().clone(),
        conn.cancel_timeout(),
    ));
    let subscription = conn.insert(id, listener.clone());

    match core_api.handle_submitted_extrinsic(&extrinsic) {
        Ok(()) => Ok(subscription),
        Err(reason @ (SubmitError::Invalid | SubmitError::Unknown)) => {
            // The entry stays so the client can still unwatch it, but nothing will be consumed.
            listener.discard();
            Err(SetupError::ExtrinsicRejected {
                subscription_id: id,
                reason,
            })
        }
        Err(SubmitError::Other(e)) => {
            conn.remove(id);
            listener.discard();
            Err(SetupError::Internal(e))
        }
    }
}
