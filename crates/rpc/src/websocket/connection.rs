use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use wayfarer_common::TransactionStatus;

use super::sender::{ConnectionClosed, FrameSender};
use crate::context::RpcContext;
use crate::error::SetupError;
use crate::jsonrpc::{RequestId, RpcError, RpcRequest, RpcResponse};
use crate::subscription::{
    self,
    Listener,
    SetupFn,
    Subscription,
    SubscriptionId,
    EXTRINSIC_UPDATE_METHOD,
};

/// One client connection: its subscription table and the loop dispatching its requests.
pub struct Connection {
    context: RpcContext,
    sender: FrameSender,
    next_id: AtomicU32,
    subscriptions: DashMap<SubscriptionId, Arc<dyn Listener>>,
}

impl Connection {
    pub fn new(context: RpcContext, sender: FrameSender) -> Self {
        Self {
            context,
            sender,
            next_id: AtomicU32::new(1),
            subscriptions: Default::default(),
        }
    }

    pub fn context(&self) -> &RpcContext {
        &self.context
    }

    pub fn sender(&self) -> &FrameSender {
        &self.sender
    }

    pub fn cancel_timeout(&self) -> Duration {
        self.context.config.cancel_timeout
    }

    /// Allocates the next subscription id. The first id is 1.
    pub(crate) fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn insert(&self, id: SubscriptionId, listener: Arc<dyn Listener>) -> Subscription {
        self.subscriptions.insert(id, listener.clone());
        Subscription { id, listener }
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> Option<Arc<dyn Listener>> {
        self.subscriptions.remove(&id).map(|(_, listener)| listener)
    }

    pub fn get(&self, id: SubscriptionId) -> Option<Arc<dyn Listener>> {
        self.subscriptions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Serves requests until the client disconnects or the socket fails.
    pub async fn run(&self, mut rx: mpsc::Receiver<Result<Message, axum::Error>>) {
        loop {
            let frame = match rx.recv().await {
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Binary(bytes))) => bytes,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Ping and pong messages are handled automatically by axum.
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::trace!("Client disconnected");
                    return;
                }
                Some(Err(e)) => {
                    tracing::trace!(error=%e, "Client disconnected");
                    return;
                }
            };

            if let Err(e) = self.handle_frame(frame).await {
                tracing::debug!(error=%e, "Failed to reply");
                return;
            }
        }
    }

    /// Stops every remaining listener. Listeners which fail to stop in time are removed
    /// regardless.
    pub async fn close(&self) {
        let ids = self
            .subscriptions
            .iter()
            .map(|entry| *entry.key())
            .collect::<Vec<_>>();
        let listeners = ids
            .into_iter()
            .filter_map(|id| self.subscriptions.remove(&id))
            .collect::<Vec<_>>();

        let results = futures::future::join_all(
            listeners
                .iter()
                .map(|(id, listener)| async move { (*id, listener.stop().await) }),
        )
        .await;

        for (id, result) in results {
            if let Err(e) = result {
                tracing::warn!(subscription_id=%id, error=%e, "Failed to cancel listener");
            }
        }
    }

    async fn handle_frame(&self, frame: Vec<u8>) -> Result<(), ConnectionClosed> {
        let request = match RpcRequest::parse(&frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error=%e, "Invalid request");
                return self.sender.respond(&RpcResponse::invalid_request(e.id)).await;
            }
        };

        tracing::debug!(method=%request.method, params=%request.params, "Websocket method called");

        if subscription::is_unsubscribe(&request.method) {
            metrics::increment_counter!("rpc_unsubscribe_calls_total");
            return self.unsubscribe(request).await;
        }

        match subscription::setup_for(&request.method) {
            Some((method, setup)) => self.subscribe(method, setup, request).await,
            None => {
                self.forward(request.id, frame);
                Ok(())
            }
        }
    }

    async fn subscribe(
        &self,
        method: &'static str,
        setup: SetupFn,
        request: RpcRequest,
    ) -> Result<(), ConnectionClosed> {
        metrics::increment_counter!("rpc_subscribe_calls_total", "method" => method);

        match setup(self, &request.params) {
            Ok(Subscription { id, listener }) => {
                self.sender
                    .respond(&RpcResponse::subscribed(id, request.id))
                    .await?;
                listener.listen();
                Ok(())
            }
            Err(SetupError::ExtrinsicRejected {
                subscription_id,
                reason,
            }) => {
                metrics::increment_counter!("rpc_subscribe_calls_failed_total", "method" => method);
                tracing::warn!(%method, %subscription_id, error=%reason, "Extrinsic rejected");
                self.sender
                    .notify(
                        EXTRINSIC_UPDATE_METHOD,
                        subscription_id,
                        &TransactionStatus::Invalid,
                    )
                    .await
            }
            Err(e) => {
                metrics::increment_counter!("rpc_subscribe_calls_failed_total", "method" => method);
                tracing::warn!(%method, error=%e, "Failed to create listener");
                let error = RpcError::Custom(e.to_string());
                self.sender
                    .respond(&RpcResponse::error(error, request.id))
                    .await
            }
        }
    }

    async fn unsubscribe(&self, request: RpcRequest) -> Result<(), ConnectionClosed> {
        let first = match &request.params {
            Value::Array(params) => params.first(),
            _ => None,
        };
        let Some(first) = first else {
            tracing::debug!(method=%request.method, "Missing subscription id");
            let response = RpcResponse::error(RpcError::InvalidRequest, request.id);
            return self.sender.respond(&response).await;
        };

        let Some(listener) = parse_subscription_id(first).and_then(|id| self.remove(id)) else {
            return self
                .sender
                .respond(&RpcResponse::boolean(false, request.id))
                .await;
        };

        let stopped = match listener.stop().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(method=%request.method, error=%e, "Failed to cancel listener");
                false
            }
        };

        self.sender
            .respond(&RpcResponse::boolean(stopped, request.id))
            .await
    }

    /// Hands a unary call to the dispatcher and writes its reply once it completes. Replies to
    /// concurrent calls may be written out of order.
    fn forward(&self, id: RequestId, frame: Vec<u8>) {
        let dispatcher = self.context.dispatcher.clone();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            match dispatcher.dispatch(&id, frame).await {
                Ok(reply) => {
                    if let Err(e) = sender.send_raw(&reply).await {
                        tracing::debug!(error=%e, "Failed to send reply");
                    }
                }
                Err(e) => {
                    tracing::warn!(request_id=?id, error=%e, "Forwarding request failed");
                }
            }
        });
    }
}

/// A subscription id given either as a number or as a numeric string.
fn parse_subscription_id(value: &Value) -> Option<SubscriptionId> {
    let id = match value {
        Value::Number(number) => number.as_u64()?,
        Value::String(text) => text.parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(id).ok().map(SubscriptionId)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use pretty_assertions_sorted::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use tokio::task::JoinHandle;
    use wayfarer_common::{Extrinsic, KeyValue, StorageChange, StorageKey};

    use super::*;
    use crate::source::memory::ChainEvents;
    use crate::test_utils::{block, finalisation, frame_channel, hash, wait_for, Frames};

    struct Client {
        connection: Arc<Connection>,
        frames: Frames,
        tx: mpsc::Sender<Result<Message, axum::Error>>,
        handle: JoinHandle<()>,
    }

    impl Client {
        fn connect(context: RpcContext) -> Self {
            let (sender, frames) = frame_channel();
            let (tx, rx) = mpsc::channel(10);
            let connection = Arc::new(Connection::new(context, sender));
            let handle = {
                let connection = connection.clone();
                tokio::spawn(async move {
                    connection.run(rx).await;
                    connection.close().await;
                })
            };

            Self {
                connection,
                frames,
                tx,
                handle,
            }
        }

        fn with_events() -> (Self, Arc<ChainEvents>) {
            let events = Arc::new(ChainEvents::default());
            let context = RpcContext::default().with_chain_events(events.clone());
            (Self::connect(context), events)
        }

        async fn send(&self, frame: impl ToString) {
            self.tx
                .send(Ok(Message::Text(frame.to_string())))
                .await
                .unwrap();
        }

        async fn disconnect(self) {
            drop(self.tx);
            tokio::time::timeout(std::time::Duration::from_secs(2), self.handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn new_heads_subscription() {
        let (mut client, events) = Client::with_events();

        client
            .send(r#"{"id":8,"method":"chain_subscribeNewHeads","params":[]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":1,"id":8}"#
        );

        events.import_block(block(1, 0x01, vec![]));
        let notification = client.frames.next().await;
        assert_eq!(notification["method"], "chain_newHead");
        assert_eq!(notification["params"]["subscription"], 1);
        assert_eq!(notification["params"]["result"]["number"], "0x01");
    }

    #[tokio::test]
    async fn subscription_ids_increase() {
        let (mut client, _events) = Client::with_events();

        client
            .send(json!({"id": "a", "method": "chain_subscribeFinalizedHeads", "params": []}))
            .await;
        client
            .send(json!({"id": 2.5, "method": "chain_subscribeAllHeads"}))
            .await;
        client
            .send(json!({"id": null, "method": "chain_subscribeNewHead", "params": []}))
            .await;

        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":1,"id":"a"}"#
        );
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":2,"id":2.5}"#
        );
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":3,"id":null}"#
        );
        assert_eq!(client.connection.subscription_count(), 3);
    }

    #[rstest]
    #[case::empty_method(r#"{"method":"","params":[]}"#, "0")]
    #[case::empty_method_with_id(r#"{"id":5,"method":"","params":[]}"#, "5")]
    #[case::missing_method(r#"{"id":"x","params":[]}"#, r#""x""#)]
    #[case::malformed(r#"{"id":5,"method":"#, "0")]
    #[case::not_an_object(r#"[1,2,3]"#, "0")]
    #[case::wrong_version(r#"{"jsonrpc":"1.0","id":5,"method":"chain_getHeader"}"#, "5")]
    #[case::bad_id(r#"{"id":[1],"method":"chain_getHeader"}"#, "0")]
    #[tokio::test]
    async fn invalid_requests(#[case] frame: &str, #[case] id: &str) {
        let (mut client, _events) = Client::with_events();

        client.send(frame).await;

        assert_eq!(
            client.frames.next_text().await,
            format!(
                r#"{{"jsonrpc":"2.0","error":{{"code":-32600,"message":"Invalid request"}},"id":{id}}}"#
            )
        );

        // The connection keeps serving requests.
        client
            .send(r#"{"id":1,"method":"chain_subscribeNewHeads","params":[]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":1,"id":1}"#
        );
    }

    #[tokio::test]
    async fn unsubscribe() {
        let (mut client, events) = Client::with_events();

        client
            .send(r#"{"id":1,"method":"chain_subscribeNewHeads","params":[]}"#)
            .await;
        client.frames.next().await;
        assert!(client.connection.get(SubscriptionId(1)).is_some());

        client
            .send(r#"{"id":2,"method":"chain_unsubscribeNewHeads","params":[7]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":false,"id":2}"#
        );

        client
            .send(r#"{"id":3,"method":"chain_unsubscribeNewHeads","params":[1]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":true,"id":3}"#
        );
        assert!(client.connection.get(SubscriptionId(1)).is_none());
        assert_eq!(events.imported_notifier_count(), 0);

        client
            .send(r#"{"id":4,"method":"chain_unsubscribeNewHeads","params":[1]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":false,"id":4}"#
        );
    }

    #[tokio::test]
    async fn unsubscribe_by_numeric_string() {
        let (mut client, _events) = Client::with_events();

        client
            .send(r#"{"id":1,"method":"chain_subscribeAllHeads","params":[]}"#)
            .await;
        client.frames.next().await;

        client
            .send(r#"{"id":2,"method":"chain_unsubscribeAllHeads","params":["1"]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":true,"id":2}"#
        );
    }

    #[rstest]
    #[case::params_object(json!({"id": 6, "method": "state_unsubscribeStorage", "params": {}}))]
    #[case::params_missing(json!({"id": 6, "method": "state_unsubscribeStorage"}))]
    #[case::params_empty(json!({"id": 6, "method": "state_unsubscribeStorage", "params": []}))]
    #[tokio::test]
    async fn unsubscribe_without_id(#[case] frame: Value) {
        let (mut client, _events) = Client::with_events();

        client.send(frame).await;

        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"Invalid request"},"id":6}"#
        );
    }

    #[rstest]
    #[case::not_numeric(json!(["abc"]))]
    #[case::object(json!([{"id": 1}]))]
    #[case::negative(json!([-1]))]
    #[tokio::test]
    async fn unsubscribe_unparseable_id(#[case] params: Value) {
        let (mut client, _events) = Client::with_events();

        client
            .send(json!({"id": 6, "method": "author_unwatchExtrinsic", "params": params}))
            .await;

        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":false,"id":6}"#
        );
    }

    #[tokio::test]
    async fn missing_event_source() {
        let events = Arc::new(ChainEvents::default());
        let context = RpcContext::default().with_storage_api(events.clone());
        let mut client = Client::connect(context);

        client
            .send(r#"{"id":3,"method":"chain_subscribeNewHeads","params":[]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","error":{"code":null,"message":"error BlockAPI not set"},"id":3}"#
        );

        client
            .send(r#"{"id":4,"method":"author_submitAndWatchExtrinsic","params":["0x01"]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","error":{"code":null,"message":"error BlockAPI not set"},"id":4}"#
        );

        client
            .send(r#"{"id":5,"method":"state_subscribeRuntimeVersion","params":[]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","error":{"code":null,"message":"error CoreAPI not set"},"id":5}"#
        );

        // Failed setups do not consume subscription ids.
        client
            .send(r#"{"id":6,"method":"state_subscribeStorage","params":[]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":1,"id":6}"#
        );
    }

    #[tokio::test]
    async fn invalid_storage_filter() {
        let (mut client, events) = Client::with_events();

        client
            .send(r#"{"id":1,"method":"state_subscribeStorage","params":[1]}"#)
            .await;
        assert_eq!(
            client.frames.next().await,
            json!({
                "jsonrpc": "2.0",
                "error": {"code": null, "message": "unexpected type: number, expected type string"},
                "id": 1,
            })
        );
        assert_eq!(client.connection.subscription_count(), 0);
        assert_eq!(events.observer_count(), 0);
    }

    #[tokio::test]
    async fn storage_subscription() {
        let (mut client, events) = Client::with_events();

        client
            .send(r#"{"id":1,"method":"state_subscribeStorage","params":[["0x26aa"]]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":1,"id":1}"#
        );

        events.change_storage(&StorageChange {
            block: hash(0x01),
            changes: vec![KeyValue {
                key: StorageKey(vec![0x26, 0xaa]),
                value: None,
            }],
        });

        let notification = client.frames.next().await;
        assert_eq!(notification["method"], "state_storage");
        assert_eq!(
            notification["params"]["result"]["changes"],
            json!([["0x26aa", null]])
        );

        client.disconnect().await;
        assert_eq!(events.observer_count(), 0);
    }

    #[tokio::test]
    async fn runtime_version_ack_comes_first() {
        let (mut client, _events) = Client::with_events();

        client
            .send(r#"{"id":1,"method":"state_subscribeRuntimeVersion","params":[]}"#)
            .await;

        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":1,"id":1}"#
        );
        let notification = client.frames.next().await;
        assert_eq!(notification["method"], "state_runtimeVersion");
        assert_eq!(notification["params"]["subscription"], 1);
    }

    #[tokio::test]
    async fn extrinsic_lifecycle() {
        let (mut client, events) = Client::with_events();
        let extrinsic = Extrinsic(vec![0x01, 0x02]);

        client
            .send(r#"{"id":1,"method":"author_submitAndWatchExtrinsic","params":["0x0102"]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":1,"id":1}"#
        );
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","method":"author_extrinsicUpdate","params":{"result":"ready","subscription":1}}"#
        );
        assert_eq!(events.drain_pool(), vec![extrinsic.clone()]);

        events.import_block(block(1, 0x0a, vec![extrinsic]));
        let in_block = client.frames.next().await;
        assert_eq!(
            in_block["params"]["result"],
            json!({"inBlock": hash(0x0a).to_string()})
        );

        events.finalise(finalisation(1, 0x0b));
        client.frames.expect_none().await;
        events.finalise(finalisation(1, 0x0a));
        let finalised = client.frames.next().await;
        assert_eq!(
            finalised["params"]["result"],
            json!({"finalised": hash(0x0a).to_string()})
        );

        client
            .send(r#"{"id":2,"method":"author_unwatchExtrinsic","params":[1]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":true,"id":2}"#
        );
        assert_eq!(events.imported_notifier_count(), 0);
        assert_eq!(events.finalised_notifier_count(), 0);
        assert_eq!(events.status_notifier_count(), 0);
    }

    #[tokio::test]
    async fn rejected_extrinsic_is_reported_as_invalid() {
        let (mut client, events) = Client::with_events();

        client
            .send(r#"{"id":1,"method":"author_submitAndWatchExtrinsic","params":["0x"]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","method":"author_extrinsicUpdate","params":{"result":"invalid","subscription":1}}"#
        );
        client.frames.expect_none().await;
        assert!(client.connection.get(SubscriptionId(1)).is_some());
        assert_eq!(events.imported_notifier_count(), 0);
        assert_eq!(events.finalised_notifier_count(), 0);
        assert_eq!(events.status_notifier_count(), 0);

        // Blocks keep arriving while the rejected subscription sits in the table.
        for number in 0..150 {
            events.import_block(block(number, 1, vec![]));
        }

        client
            .send(r#"{"id":2,"method":"author_unwatchExtrinsic","params":[1]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":true,"id":2}"#
        );
        assert_eq!(events.status_notifier_count(), 0);
    }

    #[tokio::test]
    async fn failed_submission_removes_the_subscription() {
        let (mut client, events) = Client::with_events();

        client
            .send(r#"{"id":1,"method":"author_submitAndWatchExtrinsic","params":["0x01"]}"#)
            .await;
        client.frames.next().await;
        client.frames.next().await;

        client
            .send(r#"{"id":2,"method":"author_submitAndWatchExtrinsic","params":["0x01"]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","error":{"code":null,"message":"transaction already imported"},"id":2}"#
        );

        assert_eq!(client.connection.subscription_count(), 1);
        assert!(client.connection.get(SubscriptionId(2)).is_none());
        assert_eq!(events.status_notifier_count(), 1);
        assert_eq!(events.imported_notifier_count(), 1);
    }

    #[rstest]
    #[case::no_params(json!({"id": 1, "method": "author_submitAndWatchExtrinsic"}))]
    #[case::two_params(json!({"id": 1, "method": "author_submitAndWatchExtrinsic", "params": ["0x01", "0x02"]}))]
    #[case::bad_hex(json!({"id": 1, "method": "author_submitAndWatchExtrinsic", "params": ["0xzz"]}))]
    #[tokio::test]
    async fn malformed_extrinsic_watch(#[case] frame: Value) {
        let (mut client, events) = Client::with_events();

        client.send(frame).await;

        let reply = client.frames.next().await;
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["error"]["code"], Value::Null);
        assert_eq!(client.connection.subscription_count(), 0);
        assert_eq!(events.status_notifier_count(), 0);
    }

    #[tokio::test]
    async fn unary_calls_are_forwarded() {
        let (mut client, _events) = Client::with_events();

        client
            .send(r#"{"jsonrpc":"2.0","id":5,"method":"system_health","params":[]}"#)
            .await;

        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":5}"#
        );
    }

    #[tokio::test]
    async fn ping_frames_are_ignored() {
        let (mut client, _events) = Client::with_events();

        client
            .tx
            .send(Ok(Message::Ping(vec![1, 2, 3])))
            .await
            .unwrap();
        client.frames.expect_none().await;

        client
            .tx
            .send(Ok(Message::Binary(
                br#"{"id":1,"method":"chain_subscribeNewHeads"}"#.to_vec(),
            )))
            .await
            .unwrap();
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":1,"id":1}"#
        );
    }

    #[tokio::test]
    async fn disconnect_stops_every_listener() {
        let (mut client, events) = Client::with_events();

        for (id, method) in [
            (1, "chain_subscribeNewHeads"),
            (2, "chain_subscribeAllHeads"),
            (3, "grandpa_subscribeJustifications"),
            (4, "state_subscribeStorage"),
            // Sends its current version right after the ack, so it goes last.
            (5, "state_subscribeRuntimeVersion"),
        ] {
            client
                .send(json!({"id": id, "method": method, "params": []}))
                .await;
            let ack = client.frames.next().await;
            assert_eq!(ack["result"], id);
        }
        assert_eq!(events.imported_notifier_count(), 2);
        assert_eq!(events.finalised_notifier_count(), 2);
        assert_eq!(events.runtime_notifier_count(), 1);
        assert_eq!(events.observer_count(), 1);

        let connection = client.connection.clone();
        client.disconnect().await;

        assert_eq!(connection.subscription_count(), 0);
        assert_eq!(events.imported_notifier_count(), 0);
        assert_eq!(events.finalised_notifier_count(), 0);
        assert_eq!(events.runtime_notifier_count(), 0);
        assert_eq!(events.observer_count(), 0);
    }

    #[tokio::test]
    async fn read_error_ends_the_connection() {
        let (client, events) = Client::with_events();

        client
            .send(r#"{"id":1,"method":"chain_subscribeNewHeads","params":[]}"#)
            .await;
        wait_for(|| events.imported_notifier_count() == 1).await;

        client
            .tx
            .send(Err(axum::Error::new(std::io::Error::other("reset"))))
            .await
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), client.handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(events.imported_notifier_count(), 0);
    }

    /// A listener whose task never exits in time.
    struct Stuck;

    #[async_trait::async_trait]
    impl Listener for Stuck {
        fn listen(&self) {}

        async fn stop(&self) -> Result<(), crate::error::StopError> {
            Err(crate::error::StopError::Timeout(
                std::time::Duration::from_millis(1),
            ))
        }
    }

    #[tokio::test]
    async fn unsubscribe_reports_failed_stop() {
        let mut client = Client::connect(RpcContext::default());
        let id = client.connection.allocate_id();
        client.connection.insert(id, Arc::new(Stuck));

        client
            .send(r#"{"id":4,"method":"chain_unsubscribeNewHeads","params":[1]}"#)
            .await;
        assert_eq!(
            client.frames.next_text().await,
            r#"{"jsonrpc":"2.0","result":false,"id":4}"#
        );
        assert!(client.connection.get(id).is_none());
        assert_eq!(client.connection.subscription_count(), 0);
    }

    #[tokio::test]
    async fn slow_listeners_are_removed_on_close() {
        let (sender, _frames) = frame_channel();
        let connection = Connection::new(RpcContext::default(), sender);
        let id = connection.allocate_id();
        connection.insert(id, Arc::new(Stuck));

        connection.close().await;

        assert_eq!(connection.subscription_count(), 0);
    }

    #[rstest]
    #[case::number(json!(3), Some(SubscriptionId(3)))]
    #[case::string(json!("12"), Some(SubscriptionId(12)))]
    #[case::too_large(json!(u64::MAX), None)]
    #[case::fraction(json!(1.5), None)]
    #[case::text(json!("one"), None)]
    #[case::null(json!(null), None)]
    fn subscription_id_parsing(#[case] value: Value, #[case] expected: Option<SubscriptionId>) {
        assert_eq!(parse_subscription_id(&value), expected);
    }

    #[test]
    fn ids_start_at_one() {
        let (sender, _frames) = frame_channel();
        let connection = Connection::new(RpcContext::default(), sender);

        assert_eq!(connection.allocate_id(), SubscriptionId(1));
        assert_eq!(connection.allocate_id(), SubscriptionId(2));
        assert!(connection.get(SubscriptionId(1)).is_none());
    }

    #[test]
    fn default_buffer_capacity() {
        assert_eq!(
            RpcContext::default().config.socket_buffer_capacity,
            NonZeroUsize::new(100).unwrap()
        );
    }
}
