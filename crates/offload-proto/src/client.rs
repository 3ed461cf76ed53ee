//! Composition root: wires a [`ConnectionManager`], a [`Receiver`], and one
//! [`ProducerDriver`] per registered producer, and exposes the single
//! `launch(cancellation)` entry point the rest of this crate builds toward.

use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use offload_config::TunablesConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::connection::ConnectionManager;
use crate::consumer::Consumer;
use crate::driver::ProducerDriver;
use crate::error::FatalError;
use crate::producer::InputProducer;
use crate::receiver::Receiver;

pub struct Client {
    connection: Arc<ConnectionManager>,
    producers: Vec<Arc<InputProducer>>,
    consumer: Arc<dyn Consumer>,
    frame_counter: Arc<AtomicI64>,
    tunables: TunablesConfig,
}

impl Client {
    /// Construct a client with spec-default tunables.
    pub fn new(
        endpoint: impl Into<String>,
        producers: Vec<Arc<InputProducer>>,
        consumer: Arc<dyn Consumer>,
    ) -> Self {
        Self::with_tunables(endpoint, producers, consumer, TunablesConfig::default())
    }

    pub fn with_tunables(
        endpoint: impl Into<String>,
        producers: Vec<Arc<InputProducer>>,
        consumer: Arc<dyn Consumer>,
        tunables: TunablesConfig,
    ) -> Self {
        let identity = Uuid::new_v4().as_bytes().to_vec();
        let connection = Arc::new(ConnectionManager::new(
            endpoint,
            identity,
            tunables.heartbeat_interval(),
        ));
        Self {
            connection,
            producers,
            consumer,
            frame_counter: Arc::new(AtomicI64::new(1)),
            tunables,
        }
    }

    /// Open the connection, spawn the Receiver and one ProducerDriver per
    /// registered producer, and run until `cancellation` fires or a fatal
    /// condition surfaces from any task. Resolves `Ok(())` on clean
    /// cancellation, `Err(FatalError)` on the first terminal condition any
    /// task observes, once every task has wound down.
    pub async fn launch(&self, cancellation: CancellationToken) -> Result<(), FatalError> {
        let transport_receiver = self.connection.open().await.map_err(|err| {
            error!(error = %err, "client: failed to open connection");
            err
        })?;

        info!(endpoint = %self.connection.endpoint(), "client: connection opened, hello sent");

        let receiver = Receiver::new(
            self.connection.clone(),
            self.consumer.clone(),
            self.tunables.server_timeout(),
        );

        let tasks: FuturesUnordered<JoinHandle<Result<(), FatalError>>> = FuturesUnordered::new();

        let receiver_cancellation = cancellation.clone();
        tasks.push(tokio::spawn(async move {
            receiver.run(transport_receiver, receiver_cancellation).await
        }));

        for producer in &self.producers {
            let driver = ProducerDriver::new(
                producer.clone(),
                self.connection.clone(),
                self.frame_counter.clone(),
                self.tunables.token_acquire_timeout(),
                self.tunables.frame_await_timeout(),
            );
            let driver_cancellation = cancellation.clone();
            tasks.push(tokio::spawn(async move { driver.run(driver_cancellation).await }));
        }

        let first_error = self.drain(tasks, &cancellation).await;

        self.connection.close().await;

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn drain(
        &self,
        mut tasks: FuturesUnordered<JoinHandle<Result<(), FatalError>>>,
        cancellation: &CancellationToken,
    ) -> Option<FatalError> {
        let mut first_error = None;
        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        error!(error = %err, "client: fatal error, cancelling remaining tasks");
                        cancellation.cancel();
                        first_error = Some(err);
                    }
                }
                Err(join_error) => {
                    warn!(error = %join_error, "client: a task panicked");
                }
            }
        }
        first_error
    }
}
