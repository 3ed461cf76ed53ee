//! S6: pausing a producer blocks it before it ever touches a token or the
//! wire; resuming lets it continue with the frame id sequence unbroken.

mod support;

use std::sync::Arc;
use std::time::Duration;

use offload_proto::domain::{EngineId, ToClient};
use offload_proto::{Client, InputProducer};
use support::{next_endpoint, CountedFactory, MockServer, RecordingConsumer};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn s6_pause_blocks_sends_resume_continues_monotonically() {
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
    assert_eq!(first.frame_id, 1);

    producer.pause();
    assert!(!producer.is_running());

    // While paused, the driver never reaches its token-acquire/send path at
    // all, so no further frame should arrive.
    server
        .assert_silence_except_heartbeats(Duration::from_millis(500))
        .await;

    producer.resume();

    let second = server
        .recv_from_client(Duration::from_secs(1))
        .await
        .expect("production should continue once resumed");
    assert_eq!(second.frame_id, 2, "frame ids stay monotonic across a pause");

    cancellation.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
