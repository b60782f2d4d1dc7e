//! # rpcroute Core
//!
//! `rpcroute-core` is a client-side dispatch layer for gRPC. A single [`client::Client`]
//! holds an ordered set of service stubs bound to one channel and routes named calls to
//! whichever stub owns them, without the caller needing to know which service group
//! defines which call.
//!
//! ## Key Components
//!
//! * **[`Cardinality`]:** The four invocation shapes of an RPC call.
//! * **[`registry::StubRegistry`]:** The ordered stub list, filled from a [`registry::ServiceModule`]
//!   manifest such as a [`registry::DescriptorModule`] decoded from a `FileDescriptorSet`.
//! * **[`stub::Stub`]:** One service group's cardinality table, serializer table and
//!   dispatch table.
//! * **[`client::Client`]:** The dispatcher. It validates the caller's declared shape,
//!   resolves the serializer, and invokes the call with a timeout.
//! * **[`DispatchError`]:** The failure taxonomy surfaced to callers.
//!
//! ## Transport
//!
//! Descriptor-backed stubs perform their calls through [`grpc::client::GrpcClient`], a
//! generic `tonic` client exchanging `prost_reflect::DynamicMessage` values through
//! [`grpc::codec::DynamicCodec`].
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod cardinality;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod grpc;
pub mod registry;
pub mod stub;

pub use cardinality::Cardinality;
pub use error::DispatchError;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
