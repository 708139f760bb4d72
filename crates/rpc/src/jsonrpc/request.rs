use serde::Serialize;
use serde_json::{Number, Value};

/// The `id` of a request, echoed back verbatim in the reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestId {
    Number(Number),
    String(String),
    Null,
}

impl RequestId {
    /// The id used for replies to requests whose id could not be recovered.
    pub fn zero() -> Self {
        Self::Number(Number::from(0u8))
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            RequestId::Number(x) => x.serialize(serializer),
            RequestId::String(x) => serializer.serialize_str(x),
            RequestId::Null => serializer.serialize_unit(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("request must be a JSON object")]
    NotAnObject,
    #[error("method must be a non-empty string")]
    MissingMethod,
    #[error("jsonrpc version must be 2.0")]
    Version,
    #[error("id must be a number, string or null")]
    Id,
}

/// A frame which is not a valid request.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct InvalidRequest {
    /// The id of the frame, if it carried a number or string id.
    pub id: Option<RequestId>,
    pub kind: RequestError,
}

impl From<RequestError> for InvalidRequest {
    fn from(kind: RequestError) -> Self {
        Self { id: None, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub id: RequestId,
    pub method: String,
    /// `null` when the request carries no params.
    pub params: Value,
}

impl RpcRequest {
    pub fn parse(frame: &[u8]) -> Result<Self, InvalidRequest> {
        let Value::Object(mut object) =
            serde_json::from_slice::<Value>(frame).map_err(RequestError::from)?
        else {
            return Err(RequestError::NotAnObject.into());
        };

        let id = match object.remove("id") {
            None | Some(Value::Null) => RequestId::Null,
            Some(Value::Number(x)) => RequestId::Number(x),
            Some(Value::String(x)) => RequestId::String(x),
            Some(_) => return Err(RequestError::Id.into()),
        };
        let invalid = |kind| InvalidRequest {
            id: match &id {
                RequestId::Null => None,
                recovered => Some(recovered.clone()),
            },
            kind,
        };

        match object.get("jsonrpc") {
            None => {}
            Some(Value::String(version)) if version == "2.0" => {}
            Some(_) => return Err(invalid(RequestError::Version)),
        }

        let method = match object.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            _ => return Err(invalid(RequestError::MissingMethod)),
        };

        let params = object.remove("params").unwrap_or_default();

        Ok(Self { id, method, params })
    }
}
