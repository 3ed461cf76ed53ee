//! ProducerDriver: the per-[`InputProducer`] task. Acquires a token, pulls
//! one frame, tags it, sends it; handles pause, cancel-on-disconnect, and
//! heartbeat-on-idle so the link stays warm even when credit is exhausted.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::codec;
use crate::connection::ConnectionManager;
use crate::domain::{FromClient, ProducerId};
use crate::error::FatalError;
use crate::producer::InputProducer;

enum FrameOutcome {
    Frame(crate::domain::InputFrame),
    SequenceEnded,
    TimedOut,
}

pub struct ProducerDriver {
    producer: Arc<InputProducer>,
    connection: Arc<ConnectionManager>,
    frame_counter: Arc<AtomicI64>,
    token_acquire_timeout: Duration,
    frame_await_timeout: Duration,
}

impl ProducerDriver {
    pub fn new(
        producer: Arc<InputProducer>,
        connection: Arc<ConnectionManager>,
        frame_counter: Arc<AtomicI64>,
        token_acquire_timeout: Duration,
        frame_await_timeout: Duration,
    ) -> Self {
        Self {
            producer,
            connection,
            frame_counter,
            token_acquire_timeout,
            frame_await_timeout,
        }
    }

    pub async fn run(&self, cancellation: CancellationToken) -> Result<(), FatalError> {
        self.connection.wait_connected().await;

        let producer_id = ProducerId::new(self.producer.name.clone());
        let token_pool = self
            .connection
            .register_token_pool(producer_id.clone(), self.connection.num_tokens_per_producer())
            .await;

        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Ok(()),
                _ = self.producer.wait_for_running() => {}
            }

            if token_pool.acquire(self.token_acquire_timeout).await.is_err() {
                trace!(producer = %self.producer.name, "driver: token acquire timed out, pinging");
                self.connection.send_heartbeat(false).await?;
                continue;
            }

            if !self.connection.is_connected() {
                token_pool.release().await;
                debug!(producer = %self.producer.name, "driver: disconnected, waiting for reconnection");
                self.connection.wait_connected().await;
                continue;
            }

            let child = cancellation.child_token();
            let outcome = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    token_pool.release().await;
                    return Ok(());
                }
                frame = self.producer.next_frame(child.clone()) => match frame {
                    Some(frame) => FrameOutcome::Frame(frame),
                    None => FrameOutcome::SequenceEnded,
                },
                _ = tokio::time::sleep(self.frame_await_timeout) => FrameOutcome::TimedOut,
            };
            child.cancel();

            let frame = match outcome {
                FrameOutcome::TimedOut => {
                    token_pool.release().await;
                    self.connection.send_heartbeat(false).await?;
                    continue;
                }
                FrameOutcome::SequenceEnded => {
                    token_pool.release().await;
                    continue;
                }
                FrameOutcome::Frame(frame) => frame,
            };

            if frame.is_empty() {
                token_pool.release().await;
                continue;
            }

            let target_engine_ids = self.producer.target_engine_ids().await;
            if target_engine_ids.is_empty() {
                return Err(FatalError::NoTargetEngines {
                    producer: self.producer.name.clone(),
                });
            }

            let engine_snapshot = self.connection.engine_snapshot().await;
            for engine in &target_engine_ids {
                if !engine_snapshot.contains(engine) {
                    return Err(FatalError::UnknownEngine {
                        producer: self.producer.name.clone(),
                        engine: engine.to_string(),
                    });
                }
            }

            let frame_id = self.frame_counter.fetch_add(1, Ordering::SeqCst);
            let message = FromClient {
                frame_id,
                producer_id: producer_id.clone(),
                target_engine_ids,
                input_frame: frame,
            };
            let bytes = codec::encode_from_client(&message)?;

            let sender = self.connection.sender().await;
            sender
                .send(bytes)
                .await
                .map_err(|source| FatalError::Send {
                    what: "frame",
                    endpoint: self.connection.endpoint().to_string(),
                    source: source.into(),
                })?;

            trace!(producer = %self.producer.name, frame_id, "driver: frame sent");
            // Token is not released here: it is returned when the matching
            // ResultWrapper with return_token=true arrives (see receiver.rs).
        }
    }
}
