use serde::ser::SerializeStruct;
use serde::Serialize;
use serde_json::Value;

use crate::jsonrpc::{RequestId, RpcError};
use crate::subscription::SubscriptionId;

#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub output: Result<Value, RpcError>,
    pub id: RequestId,
}

impl RpcResponse {
    /// Reply to a frame which could not be parsed as a request. Uses id `0` unless the frame's
    /// id was recovered.
    pub fn invalid_request(id: Option<RequestId>) -> Self {
        Self::error(RpcError::InvalidRequest, id.unwrap_or_else(RequestId::zero))
    }

    pub fn error(error: RpcError, id: RequestId) -> Self {
        Self {
            output: Err(error),
            id,
        }
    }

    pub fn subscribed(subscription_id: SubscriptionId, id: RequestId) -> Self {
        Self {
            output: Ok(Value::from(subscription_id.0)),
            id,
        }
    }

    pub fn boolean(value: bool, id: RequestId) -> Self {
        Self {
            output: Ok(Value::Bool(value)),
            id,
        }
    }
}

impl Serialize for RpcResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut obj = serializer.serialize_struct("RpcResponse", 3)?;
        obj.serialize_field("jsonrpc", "2.0")?;

        match &self.output {
            Ok(x) => obj.serialize_field("result", x)?,
            Err(e) => obj.serialize_field("error", e)?,
        };

        obj.serialize_field("id", &self.id)?;
        obj.end()
    }
}

/// An id-less frame pushed to the client for an active subscription.
#[derive(Debug)]
pub struct RpcNotification<'a, T> {
    pub method: &'static str,
    pub params: SubscriptionResult<'a, T>,
}

#[derive(Debug)]
pub struct SubscriptionResult<'a, T> {
    pub result: &'a T,
    pub subscription: SubscriptionId,
}

impl<'a, T> RpcNotification<'a, T> {
    pub fn new(method: &'static str, subscription: SubscriptionId, result: &'a T) -> Self {
        Self {
            method,
            params: SubscriptionResult {
                result,
                subscription,
            },
        }
    }
}

impl<T: Serialize> Serialize for RpcNotification<'_, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut obj = serializer.serialize_struct("RpcNotification", 3)?;
        obj.serialize_field("jsonrpc", "2.0")?;
        obj.serialize_field("method", self.method)?;
        obj.serialize_field("params", &self.params)?;
        obj.end()
    }
}

impl<T: Serialize> Serialize for SubscriptionResult<'_, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut obj = serializer.serialize_struct("SubscriptionResult", 2)?;
        obj.serialize_field("result", self.result)?;
        obj.serialize_field("subscription", &self.subscription)?;
        obj.end()
    }
}
