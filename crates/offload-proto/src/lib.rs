//! Client-side multiplexing engine for the cognitive-offload protocol:
//! fans multiple named input producers over one DEALER connection to a
//! compute server, enforces per-producer credit, and routes results back
//! to a consumer while keeping the link liveness-checked.

pub mod client;
pub mod codec;
pub mod connection;
pub mod consumer;
pub mod domain;
pub mod driver;
pub mod error;
pub mod producer;
pub mod receiver;
pub mod socket_config;
pub mod token_pool;
pub mod transport;

pub use client::Client;
pub use consumer::Consumer;
pub use domain::{
    EngineId, FrameId, FrameResult, FromClient, InputFrame, ProducerId, ResultWrapper, Status,
    StatusCode, ToClient,
};
pub use error::{CodecError, FatalError, TransportError};
pub use producer::{InputProducer, ProducerFactory};
