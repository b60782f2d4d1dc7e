use greeter_service_impl::GreeterImpl;
use rpcroute_core::{
    Cardinality, DispatchError,
    client::Client,
    dispatch::{Args, CallOptions},
    prost_reflect::{DynamicMessage, ReflectMessage},
    registry::DescriptorModule,
    stub::Response,
};
use sample_services::{FILE_DESCRIPTOR_SET, GreeterServer};


fn setup_client() -> Client<GreeterServer<GreeterImpl>> {
    let module = DescriptorModule::decode(FILE_DESCRIPTOR_SET).expect("Failed to decode module");

    let mut client = Client::from_service(GreeterServer::new(GreeterImpl));
    client.load(&module, Some("helloworld"));
    client
}

fn message_field(msg: &DynamicMessage) -> String {
    let value = serde_json::to_value(msg).unwrap();
    value["message"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_load_binds_greeter_stub() {
    let client = setup_client();

    assert_eq!(client.stubs().len(), 1);
    assert_eq!(client.stubs()[0].group(), "helloworld.Greeter");
    assert_eq!(
        client.stubs()[0].cardinality("SayHello"),
        Some(Cardinality::UnaryUnary)
    );
}

#[tokio::test]
async fn test_unary_unary() {
    let client = setup_client();

    let reply = client
        .unary_unary(
            "SayHello",
            serde_json::json!({ "name": "you" }),
            CallOptions::default(),
        )
        .await
        .unwrap()
        .expect("Stubs are loaded");
    assert_eq!(reply.descriptor().full_name(), "helloworld.HelloReply");
    assert_eq!(message_field(&reply), "Hello, you!");

    let reply = client
        .unary_unary("SayHello", serde_json::Value::Null, CallOptions::default())
        .await
        .unwrap()
        .expect("Stubs are loaded");
    assert_eq!(message_field(&reply), "Hello, !");
}

#[tokio::test]
async fn test_request_infers_cardinality() {
    let client = setup_client();

    let res = client
        .request(
            "SayHello",
            serde_json::json!({ "name": "world" }),
            CallOptions::default(),
        )
        .await
        .unwrap();

    match res {
        Some(Response::Unary(reply)) => assert_eq!(message_field(&reply), "Hello, world!"),
        other => panic!("Expected unary response, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wrong_entry_point_is_rejected() {
    let client = setup_client();

    let res = client
        .unary_stream(
            "SayHello",
            serde_json::json!({ "name": "you" }),
            CallOptions::default(),
        )
        .await;

    assert!(matches!(
        res,
        Err(DispatchError::InvalidCardinality {
            expected: Cardinality::UnaryStream,
            actual: Cardinality::UnaryUnary,
            ..
        })
    ));
}

#[tokio::test]
async fn test_unknown_method_is_not_found() {
    let client = setup_client();

    let res = client
        .request("SayGoodbye", Args::none(), CallOptions::default())
        .await;

    match res {
        Err(DispatchError::NotFound { group, method }) => {
            assert_eq!(group, "helloworld.Greeter");
            assert_eq!(method, "SayGoodbye");
        }
        other => panic!("Expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_module_loaded_returns_none() {
    let client = Client::from_service(GreeterServer::new(GreeterImpl));

    let res = client
        .unary_unary(
            "SayHello",
            serde_json::json!({ "name": "you" }),
            CallOptions::default(),
        )
        .await
        .unwrap();

    assert!(res.is_none());
}

#[tokio::test]
async fn test_loading_twice_owns_the_same_calls() {
    let module = DescriptorModule::decode(FILE_DESCRIPTOR_SET).unwrap();
    let mut client = Client::from_service(GreeterServer::new(GreeterImpl));

    client.load(&module, None);
    let first = client.registry().call_names();

    client.load(&module, None);
    let second = client.registry().call_names();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_invalid_headers_surface_as_transport_errors() {
    let client = setup_client();

    let res = client
        .unary_unary(
            "SayHello",
            serde_json::json!({ "name": "you" }),
            CallOptions::default().with_header("bad key", "value"),
        )
        .await;

    assert!(matches!(res, Err(DispatchError::Transport(_))));
}
