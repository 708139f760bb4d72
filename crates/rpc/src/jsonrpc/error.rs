use std::borrow::Cow;

use serde::ser::SerializeStruct;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    InvalidRequest,
    MethodNotFound,
    /// An error without a JSON-RPC code. It is reported with a `null` code and the message as is.
    Custom(String),
}

impl RpcError {
    pub fn code(&self) -> Option<i32> {
        // From the json-rpc specification: https://www.jsonrpc.org/specification#error_object
        match self {
            RpcError::InvalidRequest => Some(-32600),
            RpcError::MethodNotFound => Some(-32601),
            RpcError::Custom(_) => None,
        }
    }

    pub fn message(&self) -> Cow<'_, str> {
        match self {
            RpcError::InvalidRequest => "Invalid request".into(),
            RpcError::MethodNotFound => "Method not found".into(),
            RpcError::Custom(message) => message.as_str().into(),
        }
    }
}

impl Serialize for RpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut obj = serializer.serialize_struct("RpcError", 2)?;
        obj.serialize_field("code", &self.code())?;
        obj.serialize_field("message", self.message().as_ref())?;
        obj.end()
    }
}
