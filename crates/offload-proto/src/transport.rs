//! Thin async duplex byte-frame socket abstraction over a ZMQ DEALER
//! socket: connect, send, recv-with-timeout, close. Message-preserving,
//! ordered within a connection, no guarantees across reconnects.
//!
//! The socket is split into independent send and receive halves so that
//! producer drivers can push frames concurrently with the Receiver's poll
//! loop, the same `Sink`/`Stream` split `hooteproto::garden_listener` uses
//! for its bound sockets. Both halves are boxed trait objects so callers
//! never have to name the opaque socket type `tmq::dealer` returns.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use futures::{Sink, SinkExt};
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::socket_config::{create_dealer_and_connect, Multipart, ZmqContext};

type BoxedSink = Pin<Box<dyn Sink<Multipart, Error = tmq::TmqError> + Send>>;
type BoxedStream = Pin<Box<dyn Stream<Item = Result<Multipart, tmq::TmqError>> + Send>>;

/// Shared handle onto the send half of a connection. Cloning is cheap (an
/// `Arc` bump). A reconnect builds a fresh `TransportSender` rather than
/// mutating this one in place; `ConnectionManager` holds the current one
/// behind its own lock and hands out clones of whichever is live.
#[derive(Clone)]
pub struct TransportSender {
    inner: Arc<Mutex<BoxedSink>>,
}

impl TransportSender {
    fn new(sink: BoxedSink) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Send a single opaque frame. The DEALER socket frames it as a
    /// one-part message; no envelope is added.
    pub async fn send(&self, bytes: Bytes) -> Result<(), TransportError> {
        let multipart: Multipart = vec![bytes.to_vec()].into();
        let mut sink = self.inner.lock().await;
        sink.send(multipart).await.map_err(TransportError::Zmq)
    }

    pub async fn close(&self) {
        let mut sink = self.inner.lock().await;
        let _ = sink.close().await;
    }
}

/// The receive half of a connection. Owned exclusively by the Receiver
/// task; never shared, so no locking is needed on this side.
pub struct TransportReceiver {
    inner: BoxedStream,
}

impl TransportReceiver {
    fn new(stream: BoxedStream) -> Self {
        Self { inner: stream }
    }

    /// Poll for the next frame, waiting at most `timeout`. Returns `Ok(None)`
    /// on a timeout (the SERVER_TIMEOUT suspension point), `Ok(Some(bytes))`
    /// on a message, and `Err` if the socket itself errored or closed.
    pub async fn recv_with_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Bytes>, TransportError> {
        match tokio::time::timeout(timeout, self.inner.next()).await {
            Ok(Some(Ok(multipart))) => {
                let frame = multipart
                    .into_iter()
                    .next()
                    .map(|msg| Bytes::from(msg.to_vec()))
                    .unwrap_or_default();
                Ok(Some(frame))
            }
            Ok(Some(Err(e))) => Err(TransportError::Zmq(e)),
            Ok(None) => Err(TransportError::StreamClosed),
            Err(_elapsed) => Ok(None),
        }
    }
}

/// Create a fresh connection to `endpoint`, returning its send and receive
/// halves. Configuration / setup failure here is fatal: it terminates `launch`.
pub fn connect(
    ctx: &ZmqContext,
    endpoint: &str,
    identity: &[u8],
    name: &str,
) -> Result<(TransportSender, TransportReceiver)> {
    let socket = create_dealer_and_connect(ctx, endpoint, identity, name)
        .with_context(|| format!("{name}: failed to create/connect DEALER socket"))?;
    let (tx, rx) = socket.split();
    Ok((
        TransportSender::new(Box::pin(tx)),
        TransportReceiver::new(Box::pin(rx)),
    ))
}
