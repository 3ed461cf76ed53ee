//! Wire-level data model: producer/engine identifiers, frames, and the
//! tagged union of server-to-client messages.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Non-empty identifier for a client-side input producer, unique within a
/// Client and immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProducerId(pub String);

impl ProducerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ProducerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-empty identifier for a server-side compute engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(pub String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing 64-bit counter, per Client, starting at 1.
/// Never reset across reconnects.
pub type FrameId = i64;

/// Opaque structured payload produced by the user. The client never
/// interprets its contents, only its length (a zero-length frame is
/// discarded rather than sent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFrame(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl InputFrame {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Client-to-server frame: one input, tagged with its producer, target
/// engines, and a globally monotonic frame id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FromClient {
    pub frame_id: FrameId,
    pub producer_id: ProducerId,
    pub target_engine_ids: Vec<EngineId>,
    pub input_frame: InputFrame,
}

/// Closed set of well-known result codes, plus an open tail for whatever
/// else the server reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    NoEngineForInput,
    ServerDroppedFrame,
    Other(String),
}

impl StatusCode {
    pub fn as_str(&self) -> &str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::NoEngineForInput => "NO_ENGINE_FOR_INPUT",
            StatusCode::ServerDroppedFrame => "SERVER_DROPPED_FRAME",
            StatusCode::Other(s) => s,
        }
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "SUCCESS" => StatusCode::Success,
            "NO_ENGINE_FOR_INPUT" => StatusCode::NoEngineForInput,
            "SERVER_DROPPED_FRAME" => StatusCode::ServerDroppedFrame,
            _ => StatusCode::Other(s),
        })
    }
}

/// `{Code, Message}` pair attached to every `FrameResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default)]
    pub message: String,
}

/// Per-frame outcome from an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResult {
    pub target_engine_id: EngineId,
    pub status: Status,
    #[serde(default, with = "serde_bytes")]
    pub payload: Vec<u8>,
}

/// Envelope carrying a `FrameResult` plus credit-return bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultWrapper {
    pub producer_id: ProducerId,
    pub return_token: bool,
    pub result: FrameResult,
}

/// Tagged union of every non-heartbeat message the server may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToClient {
    Welcome {
        num_tokens_per_producer: u32,
        engine_ids: Vec<EngineId>,
    },
    ResultWrapper(ResultWrapper),
    Control {
        engine_ids: Vec<EngineId>,
    },
}
