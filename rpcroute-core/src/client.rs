//! # rpcroute Client
//!
//! The [`Client`] binds service stubs to one channel and dispatches named calls to them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rpcroute_core::client::{Client, ClientConfig};
//! use rpcroute_core::dispatch::CallOptions;
//! use rpcroute_core::registry::DescriptorModule;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = Client::connect(ClientConfig::new("localhost", 50051)).await?;
//!
//! let bytes = std::fs::read("descriptor.bin")?;
//! let module = DescriptorModule::decode(&bytes)?;
//! client.load(&module, Some("helloworld"));
//!
//! let reply = client
//!     .unary_unary("SayHello", serde_json::json!({ "name": "you" }), CallOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```
pub mod config;

pub use config::{ClientConfig, Credentials};

use crate::{
    BoxError,
    cardinality::Cardinality,
    dispatch::{self, Args, CallOptions, DEFAULT_TIMEOUT, RequestDescriptor},
    error::DispatchError,
    grpc::client::GrpcClient,
    registry::{ServiceModule, StubRegistry},
    stub::{Response, ResponseStream, Stub},
};
use futures_util::Stream;
use http_body::Body as HttpBody;
use prost_reflect::DynamicMessage;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Invalid TLS configuration for '{0}': {1}")]
    InvalidTlsConfig(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// A client routing named calls across the stubs loaded over one channel.
#[derive(Debug, Clone)]
pub struct Client<S = Channel> {
    grpc_client: GrpcClient<S>,
    registry: StubRegistry,
    default_timeout: Duration,
}

impl Client<Channel> {
    /// Connects to the server described by `config`.
    ///
    /// Without credentials the channel is plaintext; with credentials it is secured with TLS.
    ///
    /// # Returns
    ///
    /// * `Ok(Client)` - The connected client, with no stubs loaded.
    /// * `Err(ClientConnectError)` - If the URL or the TLS settings are invalid, or the
    ///   connection fails.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientConnectError> {
        let addr = config.uri();

        let mut endpoint = Endpoint::new(addr.clone())
            .map_err(|e| ClientConnectError::InvalidUrl(addr.clone(), e))?;

        if let Some(timeout) = config.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        if let Some(credentials) = &config.credentials {
            endpoint = endpoint
                .tls_config(credentials.tls_config())
                .map_err(|e| ClientConnectError::InvalidTlsConfig(addr.clone(), e))?;
        }

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ClientConnectError::ConnectionFailed(addr.clone(), e))?;

        tracing::debug!(%addr, secure = config.credentials.is_some(), "connected");

        Ok(Self::from_service(channel).with_default_timeout(config.default_timeout))
    }
}

impl<S> Client<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a client from an existing Tonic service/channel.
    pub fn from_service(service: S) -> Self {
        Self {
            grpc_client: GrpcClient::new(service),
            registry: StubRegistry::new(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl<S> Client<S> {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Binds the service groups exported by `module` to this client's channel.
    ///
    /// Replaces every stub loaded before. When `package` is given only the service groups
    /// of that Protobuf package are bound.
    pub fn load<M>(&mut self, module: &M, package: Option<&str>)
    where
        S: Clone,
        M: ServiceModule<S> + ?Sized,
    {
        self.registry.load(module, package, &self.grpc_client);
    }

    pub fn stubs(&self) -> &[Stub] {
        self.registry.stubs()
    }

    /// Replaces the loaded stubs directly.
    pub fn set_stubs(&mut self, stubs: Vec<Stub>) {
        self.registry.set_stubs(stubs);
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    /// Performs the call `name`, inferring its shape from the stub that owns it.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No stubs are loaded.
    /// * `Ok(Some(Response))` - A single message or a lazy stream, per the call's shape.
    /// * `Err(DispatchError)` - No stub owns `name`, the arguments do not fit, or the
    ///   transport failed.
    pub async fn request(
        &self,
        name: &str,
        args: impl Into<Args>,
        options: CallOptions,
    ) -> Result<Option<Response>, DispatchError> {
        self.dispatch(name, None, args.into(), options).await
    }

    /// A simple RPC: one request built from `fields`, one response.
    pub async fn unary_unary(
        &self,
        name: &str,
        fields: serde_json::Value,
        options: CallOptions,
    ) -> Result<Option<DynamicMessage>, DispatchError> {
        let response = self
            .dispatch(
                name,
                Some(Cardinality::UnaryUnary),
                Args::Fields(fields),
                options,
            )
            .await?;
        unary(name, Cardinality::UnaryUnary, response)
    }

    /// A response-streaming RPC: one request built from `fields`, a lazy stream back.
    pub async fn unary_stream(
        &self,
        name: &str,
        fields: serde_json::Value,
        options: CallOptions,
    ) -> Result<Option<ResponseStream>, DispatchError> {
        let response = self
            .dispatch(
                name,
                Some(Cardinality::UnaryStream),
                Args::Fields(fields),
                options,
            )
            .await?;
        streaming(name, Cardinality::UnaryStream, response)
    }

    /// A request-streaming RPC: the caller's messages are sent as they are produced, one
    /// response comes back once the stream ends.
    pub async fn stream_unary(
        &self,
        name: &str,
        messages: impl Stream<Item = DynamicMessage> + Send + 'static,
        options: CallOptions,
    ) -> Result<Option<DynamicMessage>, DispatchError> {
        let response = self
            .dispatch(
                name,
                Some(Cardinality::StreamUnary),
                Args::stream(messages),
                options,
            )
            .await?;
        unary(name, Cardinality::StreamUnary, response)
    }

    /// A bidirectionally-streaming RPC.
    pub async fn stream_stream(
        &self,
        name: &str,
        messages: impl Stream<Item = DynamicMessage> + Send + 'static,
        options: CallOptions,
    ) -> Result<Option<ResponseStream>, DispatchError> {
        let response = self
            .dispatch(
                name,
                Some(Cardinality::StreamStream),
                Args::stream(messages),
                options,
            )
            .await?;
        streaming(name, Cardinality::StreamStream, response)
    }

    async fn dispatch(
        &self,
        name: &str,
        cardinality: Option<Cardinality>,
        args: Args,
        options: CallOptions,
    ) -> Result<Option<Response>, DispatchError> {
        let request = RequestDescriptor {
            name: name.to_string(),
            cardinality,
            args,
            options,
        };
        dispatch::dispatch(&self.registry, self.default_timeout, request).await
    }
}

fn unary(
    name: &str,
    expected: Cardinality,
    response: Option<Response>,
) -> Result<Option<DynamicMessage>, DispatchError> {
    match response {
        None => Ok(None),
        Some(Response::Unary(msg)) => Ok(Some(msg)),
        Some(Response::Streaming(_)) => Err(DispatchError::ResponseShape {
            method: name.to_string(),
            expected,
        }),
    }
}

fn streaming(
    name: &str,
    expected: Cardinality,
    response: Option<Response>,
) -> Result<Option<ResponseStream>, DispatchError> {
    match response {
        None => Ok(None),
        Some(Response::Streaming(stream)) => Ok(Some(stream)),
        Some(Response::Unary(_)) => Err(DispatchError::ResponseShape {
            method: name.to_string(),
            expected,
        }),
    }
}
