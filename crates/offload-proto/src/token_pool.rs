//! Per-producer counting semaphore with a fixed maximum and a reset
//! operation. The server's credit grant is authoritative: on reconnect the
//! client forgets any in-flight accounting and adopts the server's fresh
//! budget via [`TokenPool::reset`], rather than crediting stale permits back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, Semaphore};

/// Returned by [`TokenPool::acquire`] when the deadline elapses before a
/// permit became available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireTimedOut;

pub struct TokenPool {
    max_tokens: usize,
    semaphore: RwLock<Arc<Semaphore>>,
}

impl TokenPool {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            semaphore: RwLock::new(Arc::new(Semaphore::new(max_tokens))),
        }
    }

    /// Block cooperatively until a permit is available or `deadline` elapses.
    /// On success the permit is consumed; it is returned to the pool later
    /// via [`TokenPool::release`] when the matching result arrives.
    pub async fn acquire(&self, deadline: Duration) -> Result<(), AcquireTimedOut> {
        let semaphore = self.semaphore.read().await.clone();
        match tokio::time::timeout(deadline, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                Ok(())
            }
            // The pool was reset mid-acquire and the old semaphore closed
            // under us; treat that as a spurious timeout so the caller retries
            // against the fresh generation.
            Ok(Err(_closed)) => Err(AcquireTimedOut),
            Err(_elapsed) => Err(AcquireTimedOut),
        }
    }

    /// Return one permit to the pool, clamped so a stray extra return can
    /// never push `available` past `max_tokens`.
    pub async fn release(&self) {
        let semaphore = self.semaphore.read().await;
        if semaphore.available_permits() < self.max_tokens {
            semaphore.add_permits(1);
        }
    }

    /// Atomically reset available permits to `max_tokens`, discarding any
    /// in-flight accounting from the prior connection generation.
    pub async fn reset(&self) {
        let mut guard = self.semaphore.write().await;
        *guard = Arc::new(Semaphore::new(self.max_tokens));
    }

    /// Current available permit count. Test/diagnostic use.
    pub async fn available(&self) -> usize {
        self.semaphore.read().await.available_permits()
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}
