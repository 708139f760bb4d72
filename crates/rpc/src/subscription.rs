//! Subscription listeners and the registry of subscribe methods.
//!
//! Every subscribe method maps to a setup function which validates the parameters, registers
//! with the event source, allocates the subscription id and stores the [Listener] in the
//! connection's table. The connection then acknowledges the subscription and calls
//! [Listener::listen].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{SetupError, StopError};
use crate::websocket::connection::Connection;

mod block;
mod extrinsic;
mod justification;
mod runtime_version;
mod storage;
pub(crate) mod task;

pub use block::{AllBlocksListener, BlockFinalizedListener, BlockListener};
pub use extrinsic::ExtrinsicSubmitListener;
pub use justification::GrandpaJustificationListener;
pub use runtime_version::RuntimeVersionListener;
pub use storage::{parse_filter, StorageObserver};

/// Identifies a subscription within a single connection. Allocated in increasing order and never
/// reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(pub u32);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Converts chain events into notifications for one subscription.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Starts consuming events. Returns immediately.
    fn listen(&self);

    /// Stops consuming events and releases the event source registration.
    ///
    /// Idempotent. Returns an error if the consumption task did not exit within the
    /// cancellation timeout, in which case it was aborted.
    async fn stop(&self) -> Result<(), StopError>;
}

pub const NEW_HEAD_METHOD: &str = "chain_newHead";
pub const FINALIZED_HEAD_METHOD: &str = "chain_finalizedHead";
pub const ALL_HEAD_METHOD: &str = "chain_allHead";
pub const STORAGE_METHOD: &str = "state_storage";
pub const EXTRINSIC_UPDATE_METHOD: &str = "author_extrinsicUpdate";
pub const RUNTIME_VERSION_METHOD: &str = "state_runtimeVersion";
pub const JUSTIFICATIONS_METHOD: &str = "grandpa_justifications";

/// A listener stored in a connection's subscription table.
pub(crate) struct Subscription {
    pub id: SubscriptionId,
    pub listener: Arc<dyn Listener>,
}

pub(crate) type SetupFn = fn(&Connection, &Value) -> Result<Subscription, SetupError>;

const SUBSCRIBE_METHODS: &[(&str, SetupFn)] = &[
    ("chain_subscribeNewHeads", block::setup_new_heads),
    ("chain_subscribeNewHead", block::setup_new_heads),
    ("chain_subscribeFinalizedHeads", block::setup_finalized_heads),
    ("chain_subscribeFinalisedHeads", block::setup_finalized_heads),
    ("chain_subscribeAllHeads", block::setup_all_heads),
    ("state_subscribeStorage", storage::setup),
    ("author_submitAndWatchExtrinsic", extrinsic::setup),
    ("state_subscribeRuntimeVersion", runtime_version::setup),
    ("chain_subscribeRuntimeVersion", runtime_version::setup),
    ("grandpa_subscribeJustifications", justification::setup),
];

/// The registered name and setup function of a subscribe method, if `method` is one.
pub(crate) fn setup_for(method: &str) -> Option<(&'static str, SetupFn)> {
    SUBSCRIBE_METHODS
        .iter()
        .find(|(name, _)| *name == method)
        .copied()
}

/// Whether `method` cancels a subscription.
pub(crate) fn is_unsubscribe(method: &str) -> bool {
    method.contains("_unsubscribe") || method.contains("_unwatch")
}
