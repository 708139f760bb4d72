use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use serde_json::Value;
use wayfarer_common::{StorageChange, StorageKey};

use super::{Listener, Subscription, SubscriptionId, STORAGE_METHOD};
use crate::error::{SetupError, StopError};
use crate::source::{ObserverId, StorageApi, StorageObserve};
use crate::types::StorageChangeReply;
use crate::websocket::connection::Connection;
use crate::websocket::sender::FrameSender;

/// Parses the key filter of a storage subscription.
///
/// Accepts a single hex key, an array of hex keys, or an array of arrays of hex keys, which may
/// also be mixed. An empty filter matches every key.
pub fn parse_filter(params: &Value) -> Result<BTreeSet<StorageKey>, SetupError> {
    let mut filter = BTreeSet::new();

    match params {
        Value::String(key) => {
            filter.insert(decode_key(key)?);
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(key) => {
                        filter.insert(decode_key(key)?);
                    }
                    Value::Array(keys) => {
                        for key in keys {
                            let key = key
                                .as_str()
                                .ok_or_else(|| SetupError::unexpected_type(key, "string"))?;
                            filter.insert(decode_key(key)?);
                        }
                    }
                    other => return Err(SetupError::unexpected_type(other, "string")),
                }
            }
        }
        other => return Err(SetupError::unexpected_type(other, "array")),
    }

    Ok(filter)
}

fn decode_key(key: &str) -> Result<StorageKey, SetupError> {
    Ok(StorageKey(wayfarer_serde::decode_prefixed(key)?))
}

enum Registration {
    Pending,
    Registered(ObserverId),
    Stopped,
}

/// Receives storage changes pushed by the storage subsystem and sends them as `state_storage`
/// notifications.
///
/// Unlike the other listeners there is no consumption task: the observer is registered with
/// the storage subsystem on [listen](Listener::listen) and unregistered on
/// [stop](Listener::stop).
pub struct StorageObserver {
    id: SubscriptionId,
    filter: BTreeSet<StorageKey>,
    sender: FrameSender,
    api: Arc<dyn StorageApi>,
    this: Weak<StorageObserver>,
    registration: Mutex<Registration>,
}

impl StorageObserver {
    pub fn new(
        id: SubscriptionId,
        filter: BTreeSet<StorageKey>,
        api: Arc<dyn StorageApi>,
        sender: FrameSender,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            filter,
            sender,
            api,
            this: this.clone(),
            registration: Mutex::new(Registration::Pending),
        })
    }
}

impl StorageObserve for StorageObserver {
    fn filter(&self) -> &BTreeSet<StorageKey> {
        &self.filter
    }

    fn update(&self, change: &StorageChange) {
        let reply = StorageChangeReply::from(change);
        if self.sender.try_notify(STORAGE_METHOD, self.id, &reply).is_err() {
            tracing::debug!(subscription_id=%self.id, "Connection closed, dropping storage change");
        }
    }
}

#[async_trait]
impl Listener for StorageObserver {
    fn listen(&self) {
        let mut registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !matches!(*registration, Registration::Pending) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };

        let observer_id = self.api.register_storage_observer(this);
        *registration = Registration::Registered(observer_id);
    }

    async fn stop(&self) -> Result<(), StopError> {
        let registration = std::mem::replace(
            &mut *self
                .registration
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            Registration::Stopped,
        );

        if let Registration::Registered(observer_id) = registration {
            self.api.unregister_storage_observer(observer_id);
        }
        Ok(())
    }
}

pub(super) fn setup(conn: &Connection, params: &Value) -> Result<Subscription, SetupError> {
    let api = conn.context().storage_api()?.clone();
    let filter = parse_filter(params)?;
    let id = conn.allocate_id();
    let observer = StorageObserver::new(id, filter, api, conn.sender().clone());
    Ok(conn.insert(id, observer))
}
