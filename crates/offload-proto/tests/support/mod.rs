//! Shared helpers for the end-to-end scenario tests: a hand-driven ROUTER
//! standing in for the compute server, plus a few small `ProducerFactory`
//! implementations that behave predictably enough to assert against.

use std::pin::Pin;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tmq::router;
use tokio_util::sync::CancellationToken;

use offload_proto::codec;
use offload_proto::domain::{FrameResult, FromClient, InputFrame, ToClient};
use offload_proto::socket_config::{Multipart, ZmqContext};
use offload_proto::{Consumer, ProducerFactory};

static PORT: AtomicU16 = AtomicU16::new(19_500);

/// A fresh loopback endpoint, one per test, the same way the transport and
/// codec unit tests allocate theirs.
pub fn next_endpoint() -> String {
    let port = PORT.fetch_add(1, Ordering::SeqCst);
    format!("tcp://127.0.0.1:{port}")
}

type BoxedTx = Pin<Box<dyn Sink<Multipart, Error = tmq::TmqError> + Send>>;
type BoxedRx = Pin<Box<dyn Stream<Item = Result<Multipart, tmq::TmqError>> + Send>>;

/// A bare ROUTER socket standing in for the compute server, driven by hand
/// from each scenario.
pub struct MockServer {
    tx: BoxedTx,
    rx: BoxedRx,
}

impl MockServer {
    pub fn bind(endpoint: &str) -> Self {
        let ctx = ZmqContext::new();
        let socket = router(&ctx).set_linger(0).bind(endpoint).unwrap();
        let (tx, rx) = socket.split();
        Self {
            tx: Box::pin(tx),
            rx: Box::pin(rx),
        }
    }

    /// Wait for the next raw frame from any DEALER, returning its identity
    /// and payload.
    pub async fn recv(&mut self, timeout: Duration) -> Option<(Vec<u8>, Vec<u8>)> {
        match tokio::time::timeout(timeout, self.rx.next()).await {
            Ok(Some(Ok(multipart))) => {
                let mut frames: Vec<Vec<u8>> = multipart.into_iter().map(|m| m.to_vec()).collect();
                let identity = frames.remove(0);
                let payload = frames.into_iter().next().unwrap_or_default();
                Some((identity, payload))
            }
            Ok(Some(Err(e))) => panic!("mock server socket error: {e}"),
            Ok(None) => None,
            Err(_elapsed) => None,
        }
    }

    /// Like [`Self::recv`], but skips heartbeats and decodes the payload as
    /// a `FromClient` frame.
    pub async fn recv_from_client(&mut self, timeout: Duration) -> Option<FromClient> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.recv(remaining).await {
                Some((_, payload)) if codec::is_heartbeat(&payload) => continue,
                Some((_, payload)) => return Some(rmp_serde::from_slice(&payload).unwrap()),
                None => return None,
            }
        }
    }

    pub async fn send(&mut self, identity: &[u8], payload: Vec<u8>) {
        let multipart: Multipart = vec![identity.to_vec(), payload].into();
        self.tx.send(multipart).await.unwrap();
    }

    pub async fn send_message(&mut self, identity: &[u8], message: &ToClient) {
        let bytes = rmp_serde::to_vec_named(message).unwrap();
        self.send(identity, bytes).await;
    }

    /// Wait for the client's initial HELLO frame and return its identity.
    pub async fn recv_hello(&mut self, timeout: Duration) -> Vec<u8> {
        let (identity, payload) = self.recv(timeout).await.expect("expected a HELLO frame");
        assert_eq!(payload, codec::HELLO_MESSAGE, "first frame must be HELLO");
        identity
    }

    /// Assert that nothing but heartbeats arrives for `duration`.
    pub async fn assert_silence_except_heartbeats(&mut self, duration: Duration) {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            match self.recv(remaining).await {
                Some((_, payload)) => assert!(
                    codec::is_heartbeat(&payload),
                    "expected only heartbeats during this window, got a real frame"
                ),
                None => return,
            }
        }
    }
}

/// A [`Consumer`] that records every result it observes, for assertions.
#[derive(Clone, Default)]
pub struct RecordingConsumer {
    results: Arc<Mutex<Vec<FrameResult>>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<FrameResult> {
        self.results.lock().unwrap().clone()
    }
}

impl Consumer for RecordingConsumer {
    fn on_result(&self, result: FrameResult) {
        self.results.lock().unwrap().push(result);
    }
}

/// Emits a single frame, then idles until cancelled rather than spinning.
pub struct OnceFactory {
    emitted: AtomicUsize,
    payload: Vec<u8>,
}

impl OnceFactory {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            emitted: AtomicUsize::new(0),
            payload: payload.into(),
        }
    }
}

#[async_trait]
impl ProducerFactory for OnceFactory {
    async fn next_frame(&self, cancellation: CancellationToken) -> Option<InputFrame> {
        if self.emitted.fetch_add(1, Ordering::SeqCst) == 0 {
            return Some(InputFrame::new(self.payload.clone()));
        }
        cancellation.cancelled().await;
        None
    }
}

/// Emits up to `limit` frames, one per call, then idles until cancelled.
/// Used where a scenario needs more than one frame but must not free-run.
pub struct CountedFactory {
    emitted: AtomicUsize,
    limit: usize,
}

impl CountedFactory {
    pub fn new(limit: usize) -> Self {
        Self {
            emitted: AtomicUsize::new(0),
            limit,
        }
    }
}

#[async_trait]
impl ProducerFactory for CountedFactory {
    async fn next_frame(&self, cancellation: CancellationToken) -> Option<InputFrame> {
        let n = self.emitted.fetch_add(1, Ordering::SeqCst);
        if n < self.limit {
            return Some(InputFrame::new(format!("frame-{n}").into_bytes()));
        }
        cancellation.cancelled().await;
        None
    }
}

/// Emits a fresh non-empty frame on every call, as fast as the driver asks
/// for one, so it is always ready the instant a token frees up.
#[derive(Default)]
pub struct RapidFrameFactory {
    counter: AtomicUsize,
}

#[async_trait]
impl ProducerFactory for RapidFrameFactory {
    async fn next_frame(&self, _cancellation: CancellationToken) -> Option<InputFrame> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Some(InputFrame::new(format!("frame-{n}").into_bytes()))
    }
}
