use crate::api::ApiError;
use crate::model::{SlotKey, SlotStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The slot the operation targeted is not in the cache.
    SlotNotFound(SlotKey),
    /// Batched fetch or mutation failure from a collaborator.
    Api(ApiError),
    /// Another submission on the same workflow is still in flight.
    Busy(&'static str),
    /// The client-side safety timeout fired; the request may still land
    /// server-side and is reconciled by the next forced refresh.
    Timeout(&'static str),
    InvalidTransition {
        from: SlotStatus,
        to: SlotStatus,
    },
    InvalidDraft(&'static str),
    /// Admin-only operation attempted without the admin flag.
    NotAdmin,
    /// The slot's status offers the viewer no action.
    NotActionable(SlotStatus),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::SlotNotFound(key) => {
                write!(f, "slot not found: {} {:?}", key.date, key.kind)
            }
            EngineError::Api(e) => write!(f, "{e}"),
            EngineError::Busy(what) => write!(f, "{what} already in flight"),
            EngineError::Timeout(what) => write!(f, "network timeout during {what}"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {from:?} -> {to:?}")
            }
            EngineError::InvalidDraft(msg) => write!(f, "invalid draft: {msg}"),
            EngineError::NotAdmin => write!(f, "admin privileges required"),
            EngineError::NotActionable(status) => {
                write!(f, "no action available for status {status:?}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ApiError> for EngineError {
    fn from(e: ApiError) -> Self {
        EngineError::Api(e)
    }
}
