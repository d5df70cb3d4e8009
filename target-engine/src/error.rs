use thiserror::Error;
use crate::entitlement::{GatedOperation, LockReason};

/// A gated operation attempted while the gate is locked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} requires an active premium plan ({reason})")]
pub struct GateError {
    pub operation: GatedOperation,
    pub reason: LockReason,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("A valid email address is required")]
    InvalidEmail,

    #[error("Filtered subscriptions need at least one selected service, region or address")]
    EmptyFilter,
}

/// Failures talking to the external collaborators.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Request rejected: {0}")]
    Rejected(String),
}
