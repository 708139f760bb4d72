use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::{MethodNotFoundDispatcher, RpcDispatcher};
use crate::error::SetupError;
use crate::source::memory::ChainEvents;
use crate::source::{BlockApi, CoreApi, StorageApi, TransactionStateApi};

/// Default [WebsocketConfig::cancel_timeout].
pub const DEFAULT_CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsocketConfig {
    /// How long stopping a listener waits for its task to exit.
    pub cancel_timeout: Duration,
    /// Outbound frames queued per connection.
    pub socket_buffer_capacity: NonZeroUsize,
    pub max_message_size: usize,
    /// Accept connections from non-loopback peers.
    pub external: bool,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            cancel_timeout: DEFAULT_CANCEL_TIMEOUT,
            socket_buffer_capacity: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
            max_message_size: 10 * 1024 * 1024,
            external: false,
        }
    }
}

/// Everything a connection needs to serve requests. Shared by all connections.
///
/// Event sources are optional: subscriptions which need a missing source fail with
/// [SetupError::NotConfigured].
#[derive(Clone)]
pub struct RpcContext {
    pub block_api: Option<Arc<dyn BlockApi>>,
    pub storage_api: Option<Arc<dyn StorageApi>>,
    pub core_api: Option<Arc<dyn CoreApi>>,
    pub transaction_state_api: Option<Arc<dyn TransactionStateApi>>,
    pub dispatcher: Arc<dyn RpcDispatcher>,
    pub config: WebsocketConfig,
}

impl Default for RpcContext {
    fn default() -> Self {
        Self::new(Arc::new(MethodNotFoundDispatcher))
    }
}

impl RpcContext {
    /// A context without event sources.
    pub fn new(dispatcher: Arc<dyn RpcDispatcher>) -> Self {
        Self {
            block_api: None,
            storage_api: None,
            core_api: None,
            transaction_state_api: None,
            dispatcher,
            config: WebsocketConfig::default(),
        }
    }

    /// Uses the in-memory hub for every event source.
    pub fn with_chain_events(self, events: Arc<ChainEvents>) -> Self {
        Self {
            block_api: Some(events.clone()),
            storage_api: Some(events.clone()),
            core_api: Some(events.clone()),
            transaction_state_api: Some(events),
            ..self
        }
    }

    pub fn with_block_api(self, api: Arc<dyn BlockApi>) -> Self {
        Self {
            block_api: Some(api),
            ..self
        }
    }

    pub fn with_storage_api(self, api: Arc<dyn StorageApi>) -> Self {
        Self {
            storage_api: Some(api),
            ..self
        }
    }

    pub fn with_core_api(self, api: Arc<dyn CoreApi>) -> Self {
        Self {
            core_api: Some(api),
            ..self
        }
    }

    pub fn with_transaction_state_api(self, api: Arc<dyn TransactionStateApi>) -> Self {
        Self {
            transaction_state_api: Some(api),
            ..self
        }
    }

    pub fn with_config(self, config: WebsocketConfig) -> Self {
        Self { config, ..self }
    }

    pub(crate) fn block_api(&self) -> Result<&Arc<dyn BlockApi>, SetupError> {
        self.block_api
            .as_ref()
            .ok_or(SetupError::NotConfigured("BlockAPI"))
    }

    pub(crate) fn storage_api(&self) -> Result<&Arc<dyn StorageApi>, SetupError> {
        self.storage_api
            .as_ref()
            .ok_or(SetupError::NotConfigured("StorageAPI"))
    }

    pub(crate) fn core_api(&self) -> Result<&Arc<dyn CoreApi>, SetupError> {
        self.core_api
            .as_ref()
            .ok_or(SetupError::NotConfigured("CoreAPI"))
    }

    pub(crate) fn transaction_state_api(
        &self,
    ) -> Result<&Arc<dyn TransactionStateApi>, SetupError> {
        self.transaction_state_api
            .as_ref()
            .ok_or(SetupError::NotConfigured("TransactionStateAPI"))
    }
}
