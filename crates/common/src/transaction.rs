use serde::{Deserialize, Serialize};

/// Transaction pool status of a submitted extrinsic.
///
/// Block inclusion and finality are not pool states, they are reported by matching imported
/// and finalised blocks against the extrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Future,
    Ready,
    Broadcast,
    Retracted,
    Dropped,
    Invalid,
    Usurped,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Future => "future",
            TransactionStatus::Ready => "ready",
            TransactionStatus::Broadcast => "broadcast",
            TransactionStatus::Retracted => "retracted",
            TransactionStatus::Dropped => "dropped",
            TransactionStatus::Invalid => "invalid",
            TransactionStatus::Usurped => "usurped",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
