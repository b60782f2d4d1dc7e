//! # Dispatcher
//!
//! Routes one named call across the ordered stubs of a [`StubRegistry`].
//!
//! For each stub in registry order:
//!
//! 1. A stub with no cardinality for the call does not own it; try the next one.
//! 2. A caller-declared cardinality that differs from the true one is a programming error
//!    and fails immediately with [`DispatchError::InvalidCardinality`].
//! 3. Calls taking a single request build it with the serializer resolved for
//!    `(stub group, call)`; a missing serializer means "try the next stub". Calls taking a
//!    stream of requests pass the caller's stream through untouched.
//! 4. The call is invoked with the effective timeout and its response returned as-is.
//!
//! If no stub owns the call the dispatch fails with [`DispatchError::NotFound`]. An empty
//! registry is not an error: nothing is dispatched and `None` is returned.
use crate::{
    cardinality::Cardinality,
    error::DispatchError,
    registry::StubRegistry,
    stub::{CallContext, Invocable, MessageStream, Payload, Response},
};
use futures_util::Stream;
use prost_reflect::DynamicMessage;
use std::time::Duration;

/// Timeout applied to calls that do not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The arguments of a call.
pub enum Args {
    /// Keyword-style fields of the request message, as a JSON object (`null` for none).
    Fields(serde_json::Value),
    /// Pre-built request messages for calls streaming their requests.
    Stream(MessageStream),
}

impl Args {
    /// No fields: the request message is built with its default values.
    pub fn none() -> Self {
        Args::Fields(serde_json::Value::Null)
    }

    pub fn stream(messages: impl Stream<Item = DynamicMessage> + Send + 'static) -> Self {
        Args::Stream(Box::pin(messages))
    }

    pub fn iter<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = DynamicMessage>,
        I::IntoIter: Send + 'static,
    {
        Args::stream(tokio_stream::iter(messages))
    }
}

impl From<serde_json::Value> for Args {
    fn from(fields: serde_json::Value) -> Self {
        Args::Fields(fields)
    }
}

/// Caller-side options of a call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the client's default timeout for this call.
    pub timeout: Option<Duration>,
    /// Custom gRPC metadata (headers) to attach to the request.
    pub headers: Vec<(String, String)>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Everything the dispatcher needs to route one call.
pub struct RequestDescriptor {
    /// Name of the call (e.g. `SayHello`).
    pub name: String,
    /// The shape the caller expects, if it declared one.
    pub cardinality: Option<Cardinality>,
    pub args: Args,
    pub options: CallOptions,
}

/// The stub selected for a call, with its request message when the call takes one.
struct Selected {
    invocable: Invocable,
    cardinality: Cardinality,
    message: Option<DynamicMessage>,
}

/// Dispatches `request` to the first stub of `registry` that owns it.
///
/// # Returns
///
/// * `Ok(None)` - The registry is empty.
/// * `Ok(Some(Response))` - The call was performed.
/// * `Err(DispatchError)` - Validation failed or the transport reported an error.
pub async fn dispatch(
    registry: &StubRegistry,
    default_timeout: Duration,
    request: RequestDescriptor,
) -> Result<Option<Response>, DispatchError> {
    if registry.is_empty() {
        tracing::debug!(method = %request.name, "no stubs loaded, skipping call");
        return Ok(None);
    }

    let RequestDescriptor {
        name,
        cardinality: expected,
        args,
        options,
    } = request;

    let selected = select(registry, &name, expected, &args)?;

    let payload = match (selected.message, args) {
        (Some(message), _) => Payload::Message(message),
        (None, Args::Stream(messages)) => Payload::Stream(messages),
        (None, Args::Fields(_)) => return Err(DispatchError::ExpectedStream { method: name }),
    };

    let ctx = CallContext {
        timeout: options.timeout.unwrap_or(default_timeout),
        headers: options.headers,
    };

    tracing::debug!(
        method = %name,
        cardinality = %selected.cardinality,
        timeout = ?ctx.timeout,
        "invoking call"
    );

    let response = selected.invocable.call(payload, ctx).await?;
    Ok(Some(response))
}

fn select(
    registry: &StubRegistry,
    name: &str,
    expected: Option<Cardinality>,
    args: &Args,
) -> Result<Selected, DispatchError> {
    let mut last_group = "";

    for stub in registry.stubs() {
        last_group = stub.group();

        let Some(actual) = stub.cardinality(name) else {
            tracing::trace!(group = stub.group(), method = name, "method not owned");
            continue;
        };

        if let Some(expected) = expected
            && !expected.matches(actual)
        {
            return Err(DispatchError::InvalidCardinality {
                method: name.to_string(),
                expected,
                actual,
            });
        }

        let Some(invocable) = stub.invocable(name) else {
            continue;
        };

        let message = if actual.streams_requests() {
            match args {
                Args::Stream(_) => None,
                Args::Fields(_) => {
                    return Err(DispatchError::ExpectedStream {
                        method: name.to_string(),
                    });
                }
            }
        } else {
            let Some(serializer) = stub.serializer(stub.group(), name) else {
                tracing::trace!(group = stub.group(), method = name, "no serializer");
                continue;
            };

            let fields = match args {
                Args::Fields(fields) => fields,
                Args::Stream(_) => {
                    return Err(DispatchError::UnexpectedStream {
                        method: name.to_string(),
                    });
                }
            };

            let message =
                serializer
                    .build(fields)
                    .map_err(|source| DispatchError::InvalidArguments {
                        method: name.to_string(),
                        source,
                    })?;
            Some(message)
        };

        return Ok(Selected {
            invocable: invocable.clone(),
            cardinality: actual,
            message,
        });
    }

    Err(DispatchError::NotFound {
        group: last_group.to_string(),
        method: name.to_string(),
    })
}
