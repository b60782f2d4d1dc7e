//! # Stub Registry
//!
//! Stubs are discovered from an explicit manifest rather than by scanning names: a
//! [`ServiceModule`] lists the [`StubFactory`] of each service group it defines, and
//! [`StubRegistry::load`] invokes every factory with the bound channel.
//!
//! Two modules are provided:
//!
//! * [`DescriptorModule`]: every service of a decoded `FileDescriptorSet`, in pool order.
//! * [`Manifest`]: a hand-registered list of factories.
//!
//! Loading always replaces the registry's stubs wholesale. The order of the resulting
//! list is the order in which the dispatcher tries stubs.
use crate::{BoxError, grpc::client::GrpcClient, stub::Stub};
use http_body::Body as HttpBody;
use prost_reflect::{DescriptorError, DescriptorPool, DynamicMessage, ServiceDescriptor};
use tonic::client::GrpcService;

/// Creates the stub of one service group over a channel.
pub trait StubFactory<S> {
    /// Fully qualified name of the service group (e.g. `helloworld.Greeter`).
    fn service_group(&self) -> &str;

    /// Protobuf package the service group belongs to (e.g. `helloworld`).
    fn package(&self) -> &str;

    fn create(&self, client: GrpcClient<S>) -> Stub;
}

/// A schema module: the statically declared list of stub factories it exports.
pub trait ServiceModule<S> {
    fn stub_factories(&self) -> Vec<&dyn StubFactory<S>>;
}

/// Errors raised while building a message from a [`DescriptorModule`].
#[derive(Debug, thiserror::Error)]
pub enum MessageBuildError {
    #[error("Message '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Serialize(#[from] crate::stub::SerializeError),
}

/// A module backed by the services of a Protobuf descriptor pool.
#[derive(Debug, Clone)]
pub struct DescriptorModule {
    pool: DescriptorPool,
    factories: Vec<ServiceStubFactory>,
}

impl DescriptorModule {
    /// Decodes a module from the bytes of an encoded `FileDescriptorSet`.
    pub fn decode(file_descriptor_set: &[u8]) -> Result<Self, DescriptorError> {
        Ok(Self::from_pool(DescriptorPool::decode(file_descriptor_set)?))
    }

    pub fn from_pool(pool: DescriptorPool) -> Self {
        let factories = pool.services().map(ServiceStubFactory).collect();
        Self { pool, factories }
    }

    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Fully qualified names of the service groups defined by this module, in load order.
    pub fn service_groups(&self) -> Vec<String> {
        self.factories
            .iter()
            .map(|f| f.0.full_name().to_string())
            .collect()
    }

    /// Builds an instance of the message type `full_name` from JSON fields.
    ///
    /// This is how callers produce the pre-built messages of streaming requests.
    pub fn message(
        &self,
        full_name: &str,
        fields: serde_json::Value,
    ) -> Result<DynamicMessage, MessageBuildError> {
        let desc = self
            .pool
            .get_message_by_name(full_name)
            .ok_or_else(|| MessageBuildError::NotFound(full_name.to_string()))?;

        Ok(crate::stub::Serializer::for_message(desc).build(&fields)?)
    }
}

impl<S> ServiceModule<S> for DescriptorModule
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    fn stub_factories(&self) -> Vec<&dyn StubFactory<S>> {
        self.factories
            .iter()
            .map(|f| f as &dyn StubFactory<S>)
            .collect()
    }
}

/// Factory of the stub of one service found in a descriptor pool.
#[derive(Debug, Clone)]
pub struct ServiceStubFactory(ServiceDescriptor);

impl<S> StubFactory<S> for ServiceStubFactory
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    fn service_group(&self) -> &str {
        self.0.full_name()
    }

    fn package(&self) -> &str {
        self.0.package_name()
    }

    fn create(&self, client: GrpcClient<S>) -> Stub {
        Stub::from_service_descriptor(&self.0, client)
    }
}

/// A hand-registered list of factories.
pub struct Manifest<S> {
    factories: Vec<Box<dyn StubFactory<S>>>,
}

impl<S> Manifest<S> {
    pub fn new() -> Self {
        Self { factories: vec![] }
    }

    pub fn register(mut self, factory: impl StubFactory<S> + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }
}

impl<S> Default for Manifest<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ServiceModule<S> for Manifest<S> {
    fn stub_factories(&self) -> Vec<&dyn StubFactory<S>> {
        self.factories.iter().map(|f| f.as_ref()).collect()
    }
}

/// The ordered set of stubs a client dispatches to.
#[derive(Debug, Default, Clone)]
pub struct StubRegistry {
    stubs: Vec<Stub>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the stubs exported by `module` over `client` and replaces the current set.
    ///
    /// When `package` is given only the service groups of that Protobuf package are bound.
    /// A module exporting no (matching) factories leaves the registry empty.
    pub fn load<S, M>(&mut self, module: &M, package: Option<&str>, client: &GrpcClient<S>)
    where
        S: Clone,
        M: ServiceModule<S> + ?Sized,
    {
        let stubs: Vec<Stub> = module
            .stub_factories()
            .into_iter()
            .filter(|factory| package.is_none_or(|package| factory.package() == package))
            .map(|factory| {
                tracing::debug!(group = factory.service_group(), "binding stub");
                factory.create(client.clone())
            })
            .collect();

        tracing::debug!(count = stubs.len(), ?package, "stub registry loaded");
        self.stubs = stubs;
    }

    pub fn stubs(&self) -> &[Stub] {
        &self.stubs
    }

    /// Replaces the stubs directly, bypassing module loading.
    pub fn set_stubs(&mut self, stubs: Vec<Stub>) {
        self.stubs = stubs;
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// Every `(service group, call name)` pair owned by the loaded stubs, in trial order.
    pub fn call_names(&self) -> Vec<(String, String)> {
        self.stubs
            .iter()
            .flat_map(|stub| {
                stub.method_names()
                    .into_iter()
                    .map(|name| (stub.group().to_string(), name.to_string()))
            })
            .collect()
    }
}
