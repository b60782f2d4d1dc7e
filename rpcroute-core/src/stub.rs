//! # Service Stubs
//!
//! A [`Stub`] is the client-side proxy for one service group (one Protobuf `service`)
//! bound to a channel. It carries three tables, all built once at construction:
//!
//! 1. **Cardinalities**: call name -> [`Cardinality`].
//! 2. **Serializers**: `(service group, call name)` -> [`Serializer`], the constructor of the
//!    request message for calls that take a single request.
//! 3. **Dispatch table**: call name -> [`Invocable`], the closure performing the call.
//!
//! Stubs for real services are built from a `ServiceDescriptor` (see [`descriptor`]).
//! Hand-made stubs (fakes in tests, adapters over other transports) are built with
//! [`Stub::builder`].
pub mod descriptor;

use crate::{cardinality::Cardinality, grpc::client::CallError};
use futures_util::{Stream, future::BoxFuture};
use prost_reflect::{DynamicMessage, MessageDescriptor};
use std::{collections::HashMap, fmt, pin::Pin, sync::Arc, time::Duration};

/// A caller-supplied stream of pre-built request messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = DynamicMessage> + Send + 'static>>;

/// A lazy, single-pass stream of response messages.
///
/// Each item is pulled from the transport as it is polled. Once consumed the stream cannot
/// be restarted.
pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<DynamicMessage, tonic::Status>> + Send + 'static>>;

/// Errors raised while building a request message from the caller's fields.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("Fields for '{message}' must be a JSON object, got: {got}")]
    NotAnObject { message: String, got: String },
    #[error("Fields do not match the '{message}' schema: '{source}'")]
    Schema {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Builds the wire-level request message of a call from keyword-style fields.
///
/// The fields are a JSON object whose keys are the message's field names. `null` is
/// accepted as "no fields" and produces the default message.
#[derive(Clone)]
pub struct Serializer(Arc<dyn Fn(&serde_json::Value) -> Result<DynamicMessage, SerializeError> + Send + Sync>);

impl Serializer {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<DynamicMessage, SerializeError> + Send + Sync + 'static,
    {
        Self(Arc::new(build))
    }

    /// A serializer producing instances of the given message type.
    pub fn for_message(desc: MessageDescriptor) -> Self {
        Self::new(move |fields| {
            let fields = match fields {
                serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
                serde_json::Value::Object(_) => fields.clone(),
                other => {
                    return Err(SerializeError::NotAnObject {
                        message: desc.full_name().to_string(),
                        got: other.to_string(),
                    });
                }
            };

            DynamicMessage::deserialize(desc.clone(), fields).map_err(|source| {
                SerializeError::Schema {
                    message: desc.full_name().to_string(),
                    source,
                }
            })
        })
    }

    pub fn build(&self, fields: &serde_json::Value) -> Result<DynamicMessage, SerializeError> {
        (self.0)(fields)
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Serializer")
    }
}

/// The outbound payload of a call.
pub enum Payload {
    /// A single request message, built by the call's serializer.
    Message(DynamicMessage),
    /// The caller's stream of pre-built request messages, passed through untouched.
    Stream(MessageStream),
}

/// The result of a successful call.
pub enum Response {
    /// A single response message (for `*_UNARY` calls).
    Unary(DynamicMessage),
    /// A lazy stream of response messages (for `*_STREAM` calls).
    Streaming(ResponseStream),
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Unary(msg) => f.debug_tuple("Unary").field(msg).finish(),
            Response::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Per-call parameters handed to an [`Invocable`].
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Deadline for the call, enforced by the transport.
    pub timeout: Duration,
    /// Custom gRPC metadata (headers) to attach to the request.
    pub headers: Vec<(String, String)>,
}

type InvokeFn =
    dyn Fn(Payload, CallContext) -> BoxFuture<'static, Result<Response, CallError>> + Send + Sync;

/// A stored closure performing one RPC call.
#[derive(Clone)]
pub struct Invocable(Arc<InvokeFn>);

impl Invocable {
    pub fn new<F>(call: F) -> Self
    where
        F: Fn(Payload, CallContext) -> BoxFuture<'static, Result<Response, CallError>>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(call))
    }

    pub fn call(
        &self,
        payload: Payload,
        ctx: CallContext,
    ) -> BoxFuture<'static, Result<Response, CallError>> {
        (self.0)(payload, ctx)
    }
}

impl fmt::Debug for Invocable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invocable")
    }
}

/// The client-side proxy of one service group.
#[derive(Clone)]
pub struct Stub {
    group: String,
    cardinalities: HashMap<String, Cardinality>,
    serializers: HashMap<(String, String), Serializer>,
    calls: HashMap<String, Invocable>,
}

impl Stub {
    /// Starts building a stub for the given service group (e.g. `routeguide.RouteGuide`).
    pub fn builder(group: impl Into<String>) -> StubBuilder {
        StubBuilder {
            stub: Stub {
                group: group.into(),
                cardinalities: HashMap::new(),
                serializers: HashMap::new(),
                calls: HashMap::new(),
            },
        }
    }

    /// The fully qualified name of the service group this stub is bound to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The true cardinality of `method`, or `None` if this stub does not own it.
    pub fn cardinality(&self, method: &str) -> Option<Cardinality> {
        self.cardinalities.get(method).copied()
    }

    /// Resolves the request serializer for `(group, method)`.
    ///
    /// `None` means the key is not in this stub's table, which is the signal to try the
    /// next stub.
    pub fn serializer(&self, group: &str, method: &str) -> Option<&Serializer> {
        self.serializers
            .get(&(group.to_string(), method.to_string()))
    }

    pub fn invocable(&self, method: &str) -> Option<&Invocable> {
        self.calls.get(method)
    }

    /// Names of all calls owned by this stub, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.cardinalities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("group", &self.group)
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Builder for hand-made [`Stub`]s.
pub struct StubBuilder {
    stub: Stub,
}

impl StubBuilder {
    /// Registers a call with its cardinality and the closure performing it.
    pub fn method(
        mut self,
        name: impl Into<String>,
        cardinality: Cardinality,
        invocable: Invocable,
    ) -> Self {
        let name = name.into();
        self.stub.cardinalities.insert(name.clone(), cardinality);
        self.stub.calls.insert(name, invocable);
        self
    }

    /// Registers the request serializer of a call under this stub's service group.
    pub fn serializer(mut self, name: impl Into<String>, serializer: Serializer) -> Self {
        let key = (self.stub.group.clone(), name.into());
        self.stub.serializers.insert(key, serializer);
        self
    }

    pub fn build(self) -> Stub {
        self.stub
    }
}
