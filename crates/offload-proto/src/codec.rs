//! Pure encode/decode functions for the client-to-server wire contract.
//!
//! Two sentinels escape the schema entirely and must be checked for before
//! attempting a schema decode: [`HELLO_MESSAGE`] and [`HEARTBEAT_MESSAGE`].
//! Everything else is MessagePack, standing in for the schema-compiler
//! output the wire contract assumes is available.

use bytes::Bytes;

use crate::domain::{FromClient, ToClient};
use crate::error::CodecError;

/// First client->server frame after connect. No response is expected at the
/// byte level; the server answers with a Welcome.
pub const HELLO_MESSAGE: &[u8] = b"Hello message";

/// Empty-byte heartbeat, recognized both directions, bypassing schema decode.
pub const HEARTBEAT_MESSAGE: &[u8] = b"";

/// True if `bytes` is the heartbeat sentinel.
pub fn is_heartbeat(bytes: &[u8]) -> bool {
    bytes.is_empty()
}

/// Encode a `FromClient` frame to wire bytes.
pub fn encode_from_client(msg: &FromClient) -> Result<Bytes, CodecError> {
    let bytes = rmp_serde::to_vec_named(msg)?;
    Ok(Bytes::from(bytes))
}

/// Decode wire bytes into a `ToClient` tagged union. Callers must check
/// [`is_heartbeat`] first; this function does not special-case the empty
/// sentinel and will fail to decode it as a schema message.
pub fn decode_to_client(bytes: &[u8]) -> Result<ToClient, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}
