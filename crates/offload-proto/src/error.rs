//! Error taxonomy. Only conditions the spec calls "fatal" ever reach
//! [`FatalError`]; everything else (silence-timeout, `SERVER_DROPPED_FRAME`,
//! empty producer frames, unrecognized-but-non-fatal status codes) is
//! logged and handled inline where it occurs.

use thiserror::Error;

/// Errors from the codec layer: malformed bytes on the wire.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Errors from the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("zmq error: {0}")]
    Zmq(#[from] tmq::TmqError),
    #[error("transport stream ended unexpectedly")]
    StreamClosed,
}

/// Terminal conditions. `Client::launch` resolves to `Err(FatalError)` the
/// first time one of these is observed, once every task has wound down.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to send {what} to {endpoint}: {source}")]
    Send {
        what: &'static str,
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("transport receive error: {0}")]
    Receive(#[from] TransportError),

    #[error("codec error on the wire: {0}")]
    Codec(#[from] CodecError),

    #[error("producer {producer} targeted engine {engine} that is not known to the client")]
    UnknownEngine { producer: String, engine: String },

    #[error("producer {producer} attempted to send a frame with no target engines")]
    NoTargetEngines { producer: String },

    #[error("server rejected input from producer {producer} targeting engine {engine}: no engine for input ({message})")]
    NoEngineForInput {
        producer: String,
        engine: String,
        message: String,
    },
}
