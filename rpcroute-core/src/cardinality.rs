//! # Cardinality
//!
//! The invocation shape of an RPC call: whether the request and the response are a
//! single message or a stream of messages.
use prost_reflect::MethodDescriptor;
use std::fmt;

/// One of the four gRPC invocation shapes.
///
/// The variants carry no ordering; two cardinalities match only when they are the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Single request, single response.
    UnaryUnary,
    /// Single request, stream of responses.
    UnaryStream,
    /// Stream of requests, single response.
    StreamUnary,
    /// Stream of requests, stream of responses.
    StreamStream,
}

impl Cardinality {
    /// Builds the cardinality from the streaming flags of each side of the call.
    pub fn from_streaming(client_streaming: bool, server_streaming: bool) -> Self {
        match (client_streaming, server_streaming) {
            (false, false) => Cardinality::UnaryUnary,
            (false, true) => Cardinality::UnaryStream,
            (true, false) => Cardinality::StreamUnary,
            (true, true) => Cardinality::StreamStream,
        }
    }

    pub fn matches(self, other: Cardinality) -> bool {
        self == other
    }

    /// Whether the caller sends a stream of pre-built messages instead of a single one.
    pub fn streams_requests(self) -> bool {
        matches!(self, Cardinality::StreamUnary | Cardinality::StreamStream)
    }

    /// Whether the call answers with a lazy stream instead of a single message.
    pub fn streams_responses(self) -> bool {
        matches!(self, Cardinality::UnaryStream | Cardinality::StreamStream)
    }

    pub fn name(self) -> &'static str {
        match self {
            Cardinality::UnaryUnary => "UNARY_UNARY",
            Cardinality::UnaryStream => "UNARY_STREAM",
            Cardinality::StreamUnary => "STREAM_UNARY",
            Cardinality::StreamStream => "STREAM_STREAM",
        }
    }
}

impl From<&MethodDescriptor> for Cardinality {
    fn from(method: &MethodDescriptor) -> Self {
        Cardinality::from_streaming(method.is_client_streaming(), method.is_server_streaming())
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
