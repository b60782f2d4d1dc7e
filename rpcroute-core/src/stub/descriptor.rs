//! # Descriptor-backed Stubs
//!
//! Builds a [`Stub`] from a Protobuf `ServiceDescriptor`: one table entry per method,
//! with a [`Serializer`] over the method's input type and an [`Invocable`] that performs
//! the call through a shared [`GrpcClient`].
use super::{CallContext, Invocable, Payload, Response, Serializer, Stub};
use crate::{
    BoxError,
    cardinality::Cardinality,
    grpc::client::{CallError, GrpcClient},
};
use http_body::Body as HttpBody;
use prost_reflect::{MethodDescriptor, ServiceDescriptor};
use tonic::client::GrpcService;

impl Stub {
    /// Builds the stub of `service`, performing every call through `client`.
    pub fn from_service_descriptor<S>(service: &ServiceDescriptor, client: GrpcClient<S>) -> Self
    where
        S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
        S::Future: Send,
        S::Error: Into<BoxError> + Send,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        service
            .methods()
            .fold(Stub::builder(service.full_name()), |builder, method| {
                let name = method.name().to_string();
                let builder = builder.method(
                    name.clone(),
                    Cardinality::from(&method),
                    method_invocable(client.clone(), method.clone()),
                );

                // Streaming requests are made of caller-built messages and need no serializer.
                if method.is_client_streaming() {
                    builder
                } else {
                    builder.serializer(name, Serializer::for_message(method.input()))
                }
            })
            .build()
    }
}

fn method_invocable<S>(client: GrpcClient<S>, method: MethodDescriptor) -> Invocable
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    Invocable::new(move |payload, ctx| Box::pin(invoke(client.clone(), method.clone(), payload, ctx)))
}

async fn invoke<S>(
    mut client: GrpcClient<S>,
    method: MethodDescriptor,
    payload: Payload,
    ctx: CallContext,
) -> Result<Response, CallError>
where
    S: GrpcService<tonic::body::Body> + Send,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    match (Cardinality::from(&method), payload) {
        (Cardinality::UnaryUnary, Payload::Message(msg)) => {
            let response = client
                .unary(method, msg, ctx)
                .await??;
            Ok(Response::Unary(response))
        }
        (Cardinality::UnaryStream, Payload::Message(msg)) => {
            let stream = client
                .server_streaming(method, msg, ctx)
                .await??;
            Ok(Response::Streaming(Box::pin(stream)))
        }
        (Cardinality::StreamUnary, Payload::Stream(messages)) => {
            let response = client
                .client_streaming(method, messages, ctx)
                .await??;
            Ok(Response::Unary(response))
        }
        (Cardinality::StreamStream, Payload::Stream(messages)) => {
            let stream = client
                .bidirectional_streaming(method, messages, ctx)
                .await??;
            Ok(Response::Streaming(Box::pin(stream)))
        }
        (cardinality, _) => Err(CallError::Status(tonic::Status::invalid_argument(
            format!(
                "Payload does not fit the {} call '{}'",
                cardinality,
                method.full_name()
            ),
        ))),
    }
}
