//! The Receiver task: the single consumer of the Transport's read side. It
//! drives the liveness timer, dispatches decoded messages, and is the only
//! place silence-timeout reconnection logic lives.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::codec;
use crate::connection::ConnectionManager;
use crate::consumer::Consumer;
use crate::domain::{ResultWrapper, StatusCode, ToClient};
use crate::error::FatalError;
use crate::transport::TransportReceiver;

pub struct Receiver {
    connection: Arc<ConnectionManager>,
    consumer: Arc<dyn Consumer>,
    server_timeout: Duration,
}

impl Receiver {
    pub fn new(connection: Arc<ConnectionManager>, consumer: Arc<dyn Consumer>, server_timeout: Duration) -> Self {
        Self {
            connection,
            consumer,
            server_timeout,
        }
    }

    /// Run the poll/dispatch loop until `cancellation` fires or a fatal
    /// condition is observed. `transport` is the receive half produced by
    /// [`ConnectionManager::open`].
    pub async fn run(
        &self,
        mut transport: TransportReceiver,
        cancellation: CancellationToken,
    ) -> Result<(), FatalError> {
        let mut awaiting_reconnect_confirmation = false;

        loop {
            let poll = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!("receiver: cancellation observed, shutting down");
                    return Ok(());
                }
                result = transport.recv_with_timeout(self.server_timeout) => result,
            };

            match poll {
                Ok(None) => {
                    warn!(
                        timeout_secs = self.server_timeout.as_secs(),
                        "receiver: silence timeout, reconnecting"
                    );
                    transport = self.connection.reconnect().await?;
                    awaiting_reconnect_confirmation = true;
                }
                Ok(Some(bytes)) => {
                    if awaiting_reconnect_confirmation {
                        info!("receiver: first frame after reconnect, confirming");
                        self.connection.mark_reconnected().await;
                        awaiting_reconnect_confirmation = false;
                    }

                    self.connection.clear_pending_heartbeat();

                    if codec::is_heartbeat(&bytes) {
                        trace!("receiver: heartbeat pong");
                        continue;
                    }

                    let message = codec::decode_to_client(&bytes)?;
                    self.dispatch(message).await?;
                }
                Err(transport_error) => {
                    error!(error = %transport_error, "receiver: transport error");
                    return Err(FatalError::Receive(transport_error));
                }
            }
        }
    }

    async fn dispatch(&self, message: ToClient) -> Result<(), FatalError> {
        match message {
            ToClient::Welcome {
                num_tokens_per_producer,
                engine_ids,
            } => {
                info!(
                    num_tokens_per_producer,
                    engine_count = engine_ids.len(),
                    "receiver: welcome"
                );
                self.connection
                    .process_welcome(num_tokens_per_producer, engine_ids)
                    .await;
                Ok(())
            }
            ToClient::Control { engine_ids } => {
                info!(engine_count = engine_ids.len(), "receiver: control");
                self.connection.process_control(engine_ids).await;
                Ok(())
            }
            ToClient::ResultWrapper(wrapper) => self.handle_result(wrapper).await,
        }
    }

    async fn handle_result(&self, wrapper: ResultWrapper) -> Result<(), FatalError> {
        let producer = wrapper.producer_id.to_string();
        let engine = wrapper.result.target_engine_id.to_string();

        let fatal = match &wrapper.result.status.code {
            StatusCode::Success => {
                debug!(producer = %producer, engine = %engine, "receiver: result success");
                self.consumer.on_result(wrapper.result.clone());
                None
            }
            StatusCode::NoEngineForInput => Some(FatalError::NoEngineForInput {
                producer: producer.clone(),
                engine: engine.clone(),
                message: wrapper.result.status.message.clone(),
            }),
            StatusCode::ServerDroppedFrame => {
                warn!(producer = %producer, engine = %engine, "receiver: server dropped frame");
                None
            }
            StatusCode::Other(code) => {
                error!(
                    producer = %producer,
                    engine = %engine,
                    code = %code,
                    message = %wrapper.result.status.message,
                    "receiver: server reported an error status"
                );
                None
            }
        };

        if wrapper.return_token {
            if let Some(pool) = self.connection.token_pool(&wrapper.producer_id).await {
                pool.release().await;
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
