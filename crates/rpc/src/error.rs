use std::time::Duration;

use wayfarer_serde::HexError;

use crate::source::SubmitError;
use crate::subscription::SubscriptionId;

/// Errors which prevent a subscription from being created.
///
/// All of these are reported to the client as a single error frame with a `null` code, except
/// [SetupError::ExtrinsicRejected] which has already been reported as an `"invalid"` update.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The event source required by the subscription is not configured on this node.
    #[error("error {0} not set")]
    NotConfigured(&'static str),
    #[error("unexpected type: {found}, expected type {expected}")]
    UnexpectedType {
        found: &'static str,
        expected: &'static str,
    },
    #[error("expected {expected} params, got {actual}")]
    ParamCount { expected: usize, actual: usize },
    #[error(transparent)]
    InvalidHex(#[from] HexError),
    /// The subscription exists, but the extrinsic was refused by the transaction pool.
    #[error("extrinsic rejected: {reason}")]
    ExtrinsicRejected {
        subscription_id: SubscriptionId,
        reason: SubmitError,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SetupError {
    pub(crate) fn unexpected_type(found: &serde_json::Value, expected: &'static str) -> Self {
        Self::UnexpectedType {
            found: json_type_name(found),
            expected,
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StopError {
    #[error("cannot cancel listening task within {0:?}")]
    Timeout(Duration),
}
