//! # Dynamic gRPC Transport Client
//!
//! [`GrpcClient`] performs calls on any `tonic` service (a `Channel` in production, an
//! in-process server in tests) without compile-time knowledge of the message types.
//! Every call is described by its `MethodDescriptor`: the descriptor gives the HTTP/2
//! path (`/package.Service/Method`) and the schemas handed to the
//! [`super::codec::DynamicCodec`].
//!
//! The [`CallContext`] of a call becomes request metadata. Its timeout is sent as the
//! `grpc-timeout` header and enforced by the transport; its headers are validated and
//! copied into the `MetadataMap`.
//!
//! Calls return `Result<Result<T, Status>, GrpcRequestError>`: the outer error means the
//! request never left the client, the inner one is the status answered by the server.
use super::codec::DynamicCodec;
use crate::{BoxError, stub::CallContext};
use futures_util::Stream;
use http::uri::PathAndQuery;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::str::FromStr;
use tonic::{
    Status, Streaming,
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};

/// Failures that prevent a request from being sent.
#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("The channel is not ready to accept requests: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

/// Any failure raised while performing a call on the transport.
///
/// Either the request never made it out ([`GrpcRequestError`]) or the server (or the
/// transport on its behalf, e.g. on deadline expiry) answered with a [`tonic::Status`].
#[derive(thiserror::Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Status(#[from] Status),
    #[error(transparent)]
    Request(#[from] GrpcRequestError),
}

type CallResult<T> = Result<Result<T, Status>, GrpcRequestError>;

/// A gRPC client exchanging `DynamicMessage` values over a shared service.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    inner: tonic::client::Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            inner: tonic::client::Grpc::new(service),
        }
    }

    /// One request message, one response message.
    pub async fn unary(
        &mut self,
        method: MethodDescriptor,
        message: DynamicMessage,
        ctx: CallContext,
    ) -> CallResult<DynamicMessage> {
        let (path, codec) = self.prepare(&method).await?;
        let request = build_request(message, ctx)?;

        Ok(self
            .inner
            .unary(request, path, codec)
            .await
            .map(tonic::Response::into_inner))
    }

    /// One request message, a stream of responses.
    ///
    /// The returned [`Streaming`] pulls each message from the wire as it is polled.
    pub async fn server_streaming(
        &mut self,
        method: MethodDescriptor,
        message: DynamicMessage,
        ctx: CallContext,
    ) -> CallResult<Streaming<DynamicMessage>> {
        let (path, codec) = self.prepare(&method).await?;
        let request = build_request(message, ctx)?;

        Ok(self
            .inner
            .server_streaming(request, path, codec)
            .await
            .map(tonic::Response::into_inner))
    }

    /// A stream of request messages, one response once the stream ends.
    pub async fn client_streaming(
        &mut self,
        method: MethodDescriptor,
        messages: impl Stream<Item = DynamicMessage> + Send + 'static,
        ctx: CallContext,
    ) -> CallResult<DynamicMessage> {
        let (path, codec) = self.prepare(&method).await?;
        let request = build_request(messages, ctx)?;

        Ok(self
            .inner
            .client_streaming(request, path, codec)
            .await
            .map(tonic::Response::into_inner))
    }

    /// Streams in both directions.
    pub async fn bidirectional_streaming(
        &mut self,
        method: MethodDescriptor,
        messages: impl Stream<Item = DynamicMessage> + Send + 'static,
        ctx: CallContext,
    ) -> CallResult<Streaming<DynamicMessage>> {
        let (path, codec) = self.prepare(&method).await?;
        let request = build_request(messages, ctx)?;

        Ok(self
            .inner
            .streaming(request, path, codec)
            .await
            .map(tonic::Response::into_inner))
    }

    /// Waits for the service to accept a request and derives the call's path and codec.
    async fn prepare(
        &mut self,
        method: &MethodDescriptor,
    ) -> Result<(PathAndQuery, DynamicCodec), GrpcRequestError> {
        self.inner
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        Ok((
            method_path(method),
            DynamicCodec::new(method.input(), method.output()),
        ))
    }
}

fn method_path(method: &MethodDescriptor) -> PathAndQuery {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    PathAndQuery::from_str(&path).expect("valid gRPC path")
}

fn build_request<T>(payload: T, ctx: CallContext) -> Result<tonic::Request<T>, GrpcRequestError> {
    let mut request = tonic::Request::new(payload);

    let metadata = request.metadata_mut();
    for (key, value) in ctx.headers {
        let value = MetadataValue::from_str(&value).map_err(|source| {
            GrpcRequestError::InvalidMetadataValue {
                key: key.clone(),
                source,
            }
        })?;
        let key = MetadataKey::from_str(&key)
            .map_err(|source| GrpcRequestError::InvalidMetadataKey { key, source })?;
        metadata.insert(key, value);
    }

    // Set last so a caller header cannot override the deadline.
    request.set_timeout(ctx.timeout);

    Ok(request)
}
