use std::time::Duration;

use crate::Cancellation;

/// Client-wide defaults for timeouts, retries, idempotency and validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Header used to carry an idempotency key on retried calls.
    /// No key is sent when `None`.
    pub idempotency_header: Option<String>,
    /// Whether decoded entities are asked to validate themselves.
    pub response_validation: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_retries: 2,
            idempotency_header: None,
            response_validation: true,
        }
    }
}

/// Per-call overrides. Unset fields fall back to [`ClientOptions`].
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub response_validation: Option<bool>,
    /// Once cancelled, abandons the in-flight attempt, backoff waits and
    /// further attempts.
    pub cancellation: Option<Cancellation>,
}

impl RequestOptions {
    /// Overrides nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-attempt timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Sets the retry budget; `0` means a single attempt.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Turns response validation on or off for this call.
    pub fn response_validation(mut self, enabled: bool) -> Self {
        self.response_validation = Some(enabled);
        self
    }

    /// Attaches a cancellation handle to this call.
    pub fn cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub(crate) fn resolve(&self, defaults: &ClientOptions) -> ResolvedOptions {
        ResolvedOptions {
            timeout: Duration::from_millis(self.timeout_ms.unwrap_or(defaults.timeout_ms)),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            response_validation: self
                .response_validation
                .unwrap_or(defaults.response_validation),
            cancellation: self.cancellation.clone(),
        }
    }
}

/// Effective settings for one logical call.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedOptions {
    pub timeout: Duration,
    pub max_retries: usize,
    pub response_validation: bool,
    pub cancellation: Option<Cancellation>,
}
