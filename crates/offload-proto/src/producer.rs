//! Named wrapper around a user-supplied frame factory, holding a mutable
//! target-engine set and a run/pause latch.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::domain::{EngineId, InputFrame};

/// User-supplied source of input frames for one producer.
///
/// This is the idiomatic rendering of "request next frame with a timeout":
/// rather than returning a channel the driver drains per cycle, the factory
/// hands back at most one frame per call. `cancellation` is a fresh
/// single-shot scope per call; implementations must stop promptly once it
/// fires and may treat that as a legitimate reason to return `None`.
#[async_trait]
pub trait ProducerFactory: Send + Sync {
    async fn next_frame(&self, cancellation: CancellationToken) -> Option<InputFrame>;
}

/// One named input source, with its own target-engine set and pause latch.
pub struct InputProducer {
    pub name: String,
    factory: Arc<dyn ProducerFactory>,
    target_engine_ids: RwLock<HashSet<EngineId>>,
    running_tx: watch::Sender<bool>,
    running_rx: watch::Receiver<bool>,
}

impl InputProducer {
    pub fn new(
        name: impl Into<String>,
        factory: Arc<dyn ProducerFactory>,
        initial_target_engine_ids: impl IntoIterator<Item = EngineId>,
    ) -> Self {
        let (running_tx, running_rx) = watch::channel(true);
        Self {
            name: name.into(),
            factory,
            target_engine_ids: RwLock::new(initial_target_engine_ids.into_iter().collect()),
            running_tx,
            running_rx,
        }
    }

    pub async fn next_frame(&self, cancellation: CancellationToken) -> Option<InputFrame> {
        self.factory.next_frame(cancellation).await
    }

    pub fn pause(&self) {
        let _ = self.running_tx.send(false);
    }

    pub fn resume(&self) {
        let _ = self.running_tx.send(true);
    }

    pub fn is_running(&self) -> bool {
        *self.running_rx.borrow()
    }

    /// Block while paused, a latch: consumes no tokens and returns as soon
    /// as `resume()` is observed. Built on `watch` rather than a bare
    /// `Notify`, so a `resume()` racing the check between `is_running` and
    /// registering the wait can never be missed.
    pub async fn wait_for_running(&self) {
        let mut rx = self.running_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub async fn add_target_engine(&self, id: EngineId) {
        self.target_engine_ids.write().await.insert(id);
    }

    pub async fn remove_target_engine(&self, id: &EngineId) {
        self.target_engine_ids.write().await.remove(id);
    }

    /// Named as if it replaces the target set; in fact it is additive, a
    /// deliberately preserved quirk rather than a silent fix.
    pub async fn change_target_engines(&self, ids: impl IntoIterator<Item = EngineId>) {
        let mut set = self.target_engine_ids.write().await;
        set.extend(ids);
    }

    pub async fn target_engine_ids(&self) -> Vec<EngineId> {
        self.target_engine_ids.read().await.iter().cloned().collect()
    }
}
