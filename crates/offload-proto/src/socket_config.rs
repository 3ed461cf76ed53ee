//! Centralized ZMQ DEALER socket configuration.
//!
//! All socket setup goes through [`create_dealer_and_connect`] so fixing a
//! bug here fixes it for every connection the client ever opens, including
//! across reconnects. This client only opens the DEALER side of the wire
//! contract (the server is the ROUTER), so no ROUTER/PUB/SUB helpers are
//! provided.
//!
//! ## Configuration applied
//!
//! - `LINGER` set to 0 for clean shutdown
//! - `RECONNECT_IVL` set to 1s for responsive reconnection
//! - `RECONNECT_IVL_MAX` capped at 60s to prevent runaway backoff
//!
//! No ZMTP-level heartbeat options are set: the heartbeat is an
//! application-level empty frame driven by [`crate::connection`], not
//! libzmq's own PING/PONG, so wiring up `HEARTBEAT_IVL`/`HEARTBEAT_TIMEOUT`
//! here would just be a second, uncoordinated liveness mechanism.

use anyhow::{Context, Result};
use tmq::dealer;

pub use tmq::Context as ZmqContext;
pub use tmq::Multipart;

/// Default reconnect interval in milliseconds.
pub const DEFAULT_RECONNECT_IVL_MS: i32 = 1000;

/// Maximum reconnect interval in milliseconds (60 seconds).
/// Caps exponential backoff to prevent hours-long delays.
pub const DEFAULT_RECONNECT_IVL_MAX_MS: i32 = 60_000;

/// Create a configured DEALER socket and connect to an endpoint.
///
/// Applies standard options: linger, reconnect intervals, a stable
/// identity. `name` is carried only for error messages.
pub fn create_dealer_and_connect(
    ctx: &ZmqContext,
    endpoint: &str,
    identity: &[u8],
    name: &str,
) -> Result<impl futures::Stream<Item = Result<Multipart, tmq::TmqError>>
       + futures::Sink<Multipart, Error = tmq::TmqError>
       + Unpin
       + Send> {
    dealer(ctx)
        .set_linger(0)
        .set_reconnect_ivl(DEFAULT_RECONNECT_IVL_MS)
        .set_reconnect_ivl_max(DEFAULT_RECONNECT_IVL_MAX_MS)
        .set_identity(identity)
        .connect(endpoint)
        .with_context(|| format!("{name}: failed to connect DEALER to {endpoint}"))
}
