//! Suspension between retry attempts.
//!
//! The retry loop never sleeps directly; it asks a [`Wait`] implementation,
//! so the same loop serves async callers ([`TokioSleep`]) and thread-blocking
//! callers ([`ThreadSleep`]).

use std::{
    fmt,
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{LedgerError, Result};

/// Suspends the current call for a backoff delay.
#[async_trait]
pub trait Wait: Send + Sync {
    /// Waits for `delay`, failing with [`LedgerError::Cancelled`] as soon as
    /// `cancellation` fires.
    async fn wait(&self, delay: Duration, cancellation: Option<&Cancellation>) -> Result<()>;
}

/// Cooperative wait: suspends only the task, never the worker thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleep;

#[async_trait]
impl Wait for TokioSleep {
    async fn wait(&self, delay: Duration, cancellation: Option<&Cancellation>) -> Result<()> {
        match cancellation {
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Some(cancellation) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(()),
                    _ = cancellation.cancelled() => Err(LedgerError::Cancelled),
                }
            }
        }
    }
}

/// Blocking wait: parks the calling thread only.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleep;

#[async_trait]
impl Wait for ThreadSleep {
    async fn wait(&self, delay: Duration, cancellation: Option<&Cancellation>) -> Result<()> {
        match cancellation {
            None => {
                std::thread::sleep(delay);
                Ok(())
            }
            Some(cancellation) => {
                if cancellation.block_for(delay) {
                    Err(LedgerError::Cancelled)
                } else {
                    Ok(())
                }
            }
        }
    }
}

struct CancelState {
    cancelled: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

/// Cloneable cancellation handle shared between a caller and its request.
#[derive(Clone)]
pub struct Cancellation {
    state: Arc<CancelState>,
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: Mutex::new(false),
                condvar: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancels every call holding this handle. Idempotent.
    pub fn cancel(&self) {
        let mut cancelled = self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        drop(cancelled);
        self.state.condvar.notify_all();
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel
            // cannot slip between the two.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Blocks the thread for up to `delay`; returns true if canceled.
    fn block_for(&self, delay: Duration) -> bool {
        let guard = self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .state
            .condvar
            .wait_timeout_while(guard, delay, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
