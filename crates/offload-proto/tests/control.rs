//! S5: a Control message updates the known engine roster; targeting an
//! engine outside that roster is a fatal condition for the client.

mod support;

use std::sync::Arc;
use std::time::Duration;

use offload_proto::domain::{EngineId, ToClient};
use offload_proto::{Client, FatalError, InputProducer};
use support::{next_endpoint, CountedFactory, MockServer, RecordingConsumer};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn s5_control_message_updates_the_known_engine_set() {
    let endpoint = next_endpoint();
    let mut server = MockServer::bind(&endpoint);

    let producer = Arc::new(InputProducer::new(
        "producer-1",
        Arc::new(CountedFactory::new(2)),
        vec![EngineId::new("0")],
    ));
    let consumer = RecordingConsumer::new();
    let client = Client::new(endpoint, vec![producer.clone()], Arc::new(consumer));

    let cancellation = CancellationToken::new();
    let launch_cancellation = cancellation.clone();
    let handle = tokio::spawn(async move { client.launch(launch_cancellation).await });

    let identity = server.recv_hello(Duration::from_secs(1)).await;
    server
        .send_message(
            &identity,
            &ToClient::Welcome {
                num_tokens_per_producer: 4,
                engine_ids: vec![EngineId::new("0")],
            },
        )
        .await;

    let first = server.recv_from_client(Duration::from_secs(1)).await.unwrap();
    assert_eq!(first.target_engine_ids, vec![EngineId::new("0")]);

    server
        .send_message(
            &identity,
            &ToClient::Control {
                engine_ids: vec![EngineId::new("0"), EngineId::new("1")],
            },
        )
        .await;
    producer.add_target_engine(EngineId::new("1")).await;

    let second = server
        .recv_from_client(Duration::from_secs(1))
        .await
        .expect("frame targeting the newly-known engine should send");
    assert!(second.target_engine_ids.contains(&EngineId::new("1")));

    cancellation.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn s5_targeting_an_unknown_engine_is_fatal() {
    let endpoint = next_endpoint();
    let mut server = MockServer::bind(&endpoint);

    let producer = Arc::new(InputProducer::new(
        "producer-1",
        Arc::new(CountedFactory::new(1)),
        vec![EngineId::new("2")],
    ));
    let consumer = RecordingConsumer::new();
    let client = Client::new(endpoint, vec![producer], Arc::new(consumer));

    let cancellation = CancellationToken::new();
    let launch_cancellation = cancellation.clone();
    let handle = tokio::spawn(async move { client.launch(launch_cancellation).await });

    let identity = server.recv_hello(Duration::from_secs(1)).await;
    server
        .send_message(
            &identity,
            &ToClient::Welcome {
                num_tokens_per_producer: 4,
                engine_ids: vec![EngineId::new("0")],
            },
        )
        .await;

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("launch should resolve once the unknown-engine send is attempted")
        .unwrap();
    assert!(matches!(result, Err(FatalError::UnknownEngine { .. })));
}
