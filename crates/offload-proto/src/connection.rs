//! Connection state machine: `Disconnected -> HelloSent -> Connected`, the
//! shared TokenPool map, and the engine-id roster. This module also owns
//! the Transport itself and drives (re)connection; [`crate::receiver::Receiver`]
//! calls into it on silence-timeout and message receipt, and the
//! ProducerDrivers only ever read its shared state, never write it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{watch, Mutex, RwLock};

use crate::codec;
use crate::domain::EngineId;
use crate::domain::ProducerId;
use crate::error::FatalError;
use crate::socket_config::ZmqContext;
use crate::token_pool::TokenPool;
use crate::transport::{self, TransportReceiver, TransportSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    HelloSent,
    Connected,
}

pub struct ConnectionManager {
    endpoint: String,
    identity: Vec<u8>,
    ctx: ZmqContext,
    state: RwLock<ConnectionState>,
    connected_tx: watch::Sender<bool>,
    connected_rx: watch::Receiver<bool>,
    engine_ids: RwLock<HashSet<EngineId>>,
    token_pools: Mutex<HashMap<ProducerId, Arc<TokenPool>>>,
    num_tokens_per_producer: AtomicU32,
    pending_heartbeat: AtomicBool,
    last_heartbeat_at: Mutex<Instant>,
    heartbeat_interval: Duration,
    sender: RwLock<Option<TransportSender>>,
}

impl ConnectionManager {
    pub fn new(endpoint: impl Into<String>, identity: Vec<u8>, heartbeat_interval: Duration) -> Self {
        let (connected_tx, connected_rx) = watch::channel(false);
        Self {
            endpoint: endpoint.into(),
            identity,
            ctx: ZmqContext::new(),
            state: RwLock::new(ConnectionState::Disconnected),
            connected_tx,
            connected_rx,
            engine_ids: RwLock::new(HashSet::new()),
            token_pools: Mutex::new(HashMap::new()),
            num_tokens_per_producer: AtomicU32::new(0),
            pending_heartbeat: AtomicBool::new(false),
            last_heartbeat_at: Mutex::new(Instant::now() - heartbeat_interval),
            heartbeat_interval,
            sender: RwLock::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Block until the connection reaches `Connected`. Returns immediately
    /// if already connected; this is the barrier that guarantees no
    /// non-heartbeat send happens before a Welcome has been processed.
    pub async fn wait_connected(&self) {
        let mut rx = self.connected_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Open the initial connection: create the Transport, connect, and send
    /// HELLO. Setup failure here is fatal: it terminates `launch`.
    pub async fn open(&self) -> Result<TransportReceiver, FatalError> {
        let (sender, receiver) =
            transport::connect(&self.ctx, &self.endpoint, &self.identity, "offload-client").map_err(
                |source| FatalError::Connect {
                    endpoint: self.endpoint.clone(),
                    source,
                },
            )?;
        *self.sender.write().await = Some(sender);
        self.set_state(ConnectionState::HelloSent).await;
        self.send_hello().await?;
        Ok(receiver)
    }

    async fn send_hello(&self) -> Result<(), FatalError> {
        let sender = self.sender().await;
        sender
            .send(Bytes::from_static(codec::HELLO_MESSAGE))
            .await
            .map_err(|source| FatalError::Send {
                what: "hello",
                endpoint: self.endpoint.clone(),
                source: source.into(),
            })
    }

    /// Tear down the socket, open a fresh one, and force-send a heartbeat on
    /// it so the server's Welcome re-arrives promptly.
    pub async fn reconnect(&self) -> Result<TransportReceiver, FatalError> {
        self.mark_disconnected();
        self.set_state(ConnectionState::Disconnected).await;

        if let Some(old) = self.sender.read().await.clone() {
            old.close().await;
        }

        let (new_sender, receiver) =
            transport::connect(&self.ctx, &self.endpoint, &self.identity, "offload-client").map_err(
                |source| FatalError::Connect {
                    endpoint: self.endpoint.clone(),
                    source,
                },
            )?;

        {
            let mut slot = self.sender.write().await;
            *slot = Some(new_sender);
        }

        self.set_state(ConnectionState::HelloSent).await;
        self.send_heartbeat(true).await?;
        Ok(receiver)
    }

    /// `sender()` is only ever called after the first successful `open()`,
    /// which happens before any ProducerDriver or the Receiver can observe
    /// `Connected`; the slot is guaranteed populated by then.
    pub async fn sender(&self) -> TransportSender {
        self.sender
            .read()
            .await
            .clone()
            .expect("transport sender requested before the connection was ever opened")
    }

    /// Confirm reconnection on the first frame received after a silence
    /// timeout, whatever its content: a heartbeat pong proves the socket is
    /// live again just as well as a fresh Welcome, so the Receiver calls
    /// this before dispatching, not only on `ToClient::Welcome`.
    pub async fn mark_reconnected(&self) {
        self.set_state(ConnectionState::Connected).await;
        let _ = self.connected_tx.send(true);
        self.reset_all_token_pools().await;
    }

    /// Transition into `Connected`, populate the token budget, and wake all
    /// waiting ProducerDrivers. Call on both the initial Welcome and on any
    /// subsequent re-Welcome after a reconnect.
    pub async fn process_welcome(&self, num_tokens_per_producer: u32, engine_ids: Vec<EngineId>) {
        self.num_tokens_per_producer
            .store(num_tokens_per_producer, Ordering::SeqCst);
        {
            let mut set = self.engine_ids.write().await;
            set.extend(engine_ids);
        }
        self.set_state(ConnectionState::Connected).await;
        let _ = self.connected_tx.send(true);
        self.reset_all_token_pools().await;
    }

    /// Replace the known engine roster wholesale (`Control` message).
    pub async fn process_control(&self, engine_ids: Vec<EngineId>) {
        let mut set = self.engine_ids.write().await;
        *set = engine_ids.into_iter().collect();
    }

    pub async fn engine_snapshot(&self) -> HashSet<EngineId> {
        self.engine_ids.read().await.clone()
    }

    pub fn num_tokens_per_producer(&self) -> u32 {
        self.num_tokens_per_producer.load(Ordering::SeqCst)
    }

    /// Mark the connection lost. ProducerDrivers waiting on `wait_connected`
    /// will block again until the next Welcome.
    pub fn mark_disconnected(&self) {
        let _ = self.connected_tx.send(false);
    }

    /// Register a producer's TokenPool the first time its driver starts.
    /// Safe to call once per producer: later calls are no-ops so a driver
    /// restarting after a fatal condition doesn't clobber live accounting.
    pub async fn register_token_pool(&self, producer_id: ProducerId, max_tokens: u32) -> Arc<TokenPool> {
        let mut pools = self.token_pools.lock().await;
        pools
            .entry(producer_id)
            .or_insert_with(|| Arc::new(TokenPool::new(max_tokens as usize)))
            .clone()
    }

    pub async fn token_pool(&self, producer_id: &ProducerId) -> Option<Arc<TokenPool>> {
        self.token_pools.lock().await.get(producer_id).cloned()
    }

    /// Reset every registered TokenPool, invariant 7: exactly once per
    /// reconnect, before any producer sends its next frame on the new
    /// connection (callers invoke this from within `process_welcome`, which
    /// itself runs before `wait_connected` releases any driver).
    pub async fn reset_all_token_pools(&self) {
        let pools = self.token_pools.lock().await;
        for pool in pools.values() {
            pool.reset().await;
        }
    }

    /// `sendHeartbeat(force)`: no-op unless `force`, the interval has
    /// elapsed, and no heartbeat is already in flight. Returns `true` if the
    /// caller should actually emit the empty frame.
    async fn should_send_heartbeat(&self, force: bool) -> bool {
        if self.pending_heartbeat.swap(true, Ordering::SeqCst) && !force {
            return false;
        }
        let mut last = self.last_heartbeat_at.lock().await;
        if !force && last.elapsed() < self.heartbeat_interval {
            // The interval hasn't elapsed: undo the test-and-set above so a
            // later call isn't permanently blocked by a heartbeat that was
            // never actually sent.
            self.pending_heartbeat.store(false, Ordering::SeqCst);
            return false;
        }
        *last = Instant::now();
        true
    }

    /// Clear the pending flag: called on receipt of any message from the
    /// server, heartbeat or otherwise.
    pub fn clear_pending_heartbeat(&self) {
        self.pending_heartbeat.store(false, Ordering::SeqCst);
    }

    /// Send a heartbeat frame, honoring the coalescing policy above.
    pub async fn send_heartbeat(&self, force: bool) -> Result<(), FatalError> {
        if !self.should_send_heartbeat(force).await {
            return Ok(());
        }
        let sender = self.sender().await;
        sender
            .send(Bytes::from_static(codec::HEARTBEAT_MESSAGE))
            .await
            .map_err(|source| FatalError::Send {
                what: "heartbeat",
                endpoint: self.endpoint.clone(),
                source: source.into(),
            })
    }

    /// Close the transport for good, on `launch` cancellation.
    pub async fn close(&self) {
        if let Some(sender) = self.sender.read().await.clone() {
            sender.close().await;
        }
    }
}
