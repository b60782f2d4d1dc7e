//! # Dispatch Errors
//!
//! The failures a caller can observe from [`crate::client::Client::request`] and the
//! shape-specific entry points.
//!
//! * Validation failures (`InvalidCardinality`, `NotFound`, argument shape errors) are
//!   raised by the dispatcher before any call is performed.
//! * Transport failures (deadline exceeded, connection lost, remote error status) are
//!   carried unchanged in [`DispatchError::Transport`].
//!
//! A serializer lookup miss is not an error: it only makes the dispatcher move on to the
//! next stub, and ends up as `NotFound` if no stub owns the call.
use crate::{cardinality::Cardinality, grpc::client::CallError, stub::SerializeError};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Method '{method}' is {actual} but was invoked as {expected}")]
    InvalidCardinality {
        method: String,
        expected: Cardinality,
        actual: Cardinality,
    },
    #[error("'{group}' object has no method '{method}'")]
    NotFound { group: String, method: String },
    #[error("Invalid arguments for '{method}': '{source}'")]
    InvalidArguments {
        method: String,
        #[source]
        source: SerializeError,
    },
    #[error("Method '{method}' takes request fields, not a stream of messages")]
    UnexpectedStream { method: String },
    #[error("Method '{method}' takes a stream of request messages")]
    ExpectedStream { method: String },
    #[error("Method '{method}' answered with a response that is not {expected}")]
    ResponseShape {
        method: String,
        expected: Cardinality,
    },
    #[error(transparent)]
    Transport(#[from] CallError),
}

impl DispatchError {
    /// The gRPC status returned by the server, if this is one.
    pub fn status(&self) -> Option<&tonic::Status> {
        match self {
            DispatchError::Transport(CallError::Status(status)) => Some(status),
            _ => None,
        }
    }
}
