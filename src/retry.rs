//! Retry loop shared by the async and blocking clients.
//!
//! One call owns its attempt counter and last response; nothing here is
//! shared between concurrent calls.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
    StatusCode,
};

use crate::{
    options::ResolvedOptions, HttpRequest, HttpResponse, IdempotencyKeyGenerator, LedgerError,
    Result, Transport, TransportError, Wait,
};

/// Server hint that forces (`true`) or forbids (`false`) a retry.
pub const SHOULD_RETRY_HEADER: &str = "x-should-retry";

const INITIAL_BACKOFF_SECS: f64 = 0.5;
const MAX_BACKOFF_SECS: f64 = 2.0;
const MIN_RETRY_AFTER_SECS: i64 = 1;
const MAX_RETRY_AFTER_SECS: i64 = 60;

/// Collaborators the retry loop needs for one call.
pub(crate) struct RetryContext<'a> {
    pub transport: &'a dyn Transport,
    pub wait: &'a dyn Wait,
    pub keys: &'a dyn IdempotencyKeyGenerator,
    pub idempotency_header: Option<&'a HeaderName>,
}

/// Sends `request`, retrying transient failures up to the effective budget.
///
/// Returns the last response when retries run out; only transport failures
/// and cancellation surface as errors.
pub(crate) async fn execute(
    context: &RetryContext<'_>,
    mut request: HttpRequest,
    options: &ResolvedOptions,
) -> Result<HttpResponse> {
    let cancellation = options.cancellation.as_ref();
    ensure_not_cancelled(cancellation)?;

    if !request.is_repeatable() || options.max_retries == 0 {
        return send(context.transport, &request, options)
            .await?
            .map_err(|err| LedgerError::from_transport(err, 1));
    }

    if let Some(name) = context.idempotency_header {
        if !request.headers.contains_key(name) {
            let key = context.keys.generate();
            let value = HeaderValue::from_str(&key).map_err(|err| {
                LedgerError::InvalidRequest(format!("invalid idempotency key '{key}': {err}"))
            })?;
            request.headers.insert(name.clone(), value);
        }
    }

    let mut attempts = 0usize;
    loop {
        ensure_not_cancelled(cancellation)?;
        let outcome = send(context.transport, &request, options).await?;
        attempts += 1;

        let delay = match outcome {
            Ok(response) => {
                if attempts > options.max_retries
                    || !should_retry_response(response.status(), response.headers())
                {
                    return Ok(response);
                }
                let delay = backoff_delay(attempts, Some(response.headers()), Utc::now(), jitter());

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status().as_u16(),
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request after retryable response"
                );

                // Release the discarded response before waiting.
                drop(response);
                delay
            }
            Err(err) => {
                if attempts > options.max_retries || !should_retry_error(&err) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        method = %request.method,
                        url = %request.url,
                        attempts,
                        retryable = err.is_network(),
                        "request failed: {err}"
                    );
                    return Err(LedgerError::from_transport(err, attempts));
                }
                let delay = backoff_delay(attempts, None, Utc::now(), jitter());

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request after network failure: {err}"
                );

                delay
            }
        };

        context.wait.wait(delay, cancellation).await?;
    }
}

/// One attempt, abandoned as soon as the call is cancelled.
///
/// A blocking transport runs to completion before the race is polled again,
/// so its in-flight call is bounded only by the attempt timeout.
async fn send(
    transport: &dyn Transport,
    request: &HttpRequest,
    options: &ResolvedOptions,
) -> Result<std::result::Result<HttpResponse, TransportError>> {
    match options.cancellation.as_ref() {
        None => Ok(transport.execute(request, options.timeout).await),
        Some(cancellation) => tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(LedgerError::Cancelled),
            outcome = transport.execute(request, options.timeout) => Ok(outcome),
        },
    }
}

/// Uniform in `[0, 1)`.
fn jitter() -> f64 {
    rand::thread_rng().gen()
}

fn ensure_not_cancelled(cancellation: Option<&crate::Cancellation>) -> Result<()> {
    if cancellation.is_some_and(crate::Cancellation::is_cancelled) {
        return Err(LedgerError::Cancelled);
    }
    Ok(())
}

/// Whether a response warrants another attempt.
///
/// An `x-should-retry` hint wins over every status rule, including for
/// successful responses.
pub fn should_retry_response(status: StatusCode, headers: &HeaderMap) -> bool {
    match headers
        .get(SHOULD_RETRY_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some("true") => return true,
        Some("false") => return false,
        _ => {}
    }

    status == StatusCode::CONFLICT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.as_u16() >= 500
}

/// Only network I/O failures are retried.
pub fn should_retry_error(err: &TransportError) -> bool {
    err.is_network()
}

/// Delay before the next attempt, `attempt` being the 1-based number of
/// attempts made so far.
///
/// A `Retry-After` of 1 to 60 seconds is honored verbatim; otherwise the
/// capped exponential [`base_backoff`] plus `jitter` seconds (expected in
/// `[0, 1)`).
pub fn backoff_delay(
    attempt: usize,
    headers: Option<&HeaderMap>,
    now: DateTime<Utc>,
    jitter: f64,
) -> Duration {
    if let Some(secs) = headers.and_then(|headers| retry_after_secs(headers, now)) {
        if (MIN_RETRY_AFTER_SECS..=MAX_RETRY_AFTER_SECS).contains(&secs) {
            return Duration::from_millis(secs as u64 * 1_000);
        }
    }

    let jitter_ms = (jitter.clamp(0.0, 1.0) * 1_000.0) as u64;
    base_backoff(attempt) + Duration::from_millis(jitter_ms)
}

/// `min(0.5 * 2^(attempt - 1), 2.0)` seconds.
pub fn base_backoff(attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as i32;
    let secs = (INITIAL_BACKOFF_SECS * 2f64.powi(exponent)).min(MAX_BACKOFF_SECS);
    Duration::from_millis((secs * 1_000.0) as u64)
}

/// Parses `Retry-After` as integer seconds, else as an HTTP-date relative
/// to `now`.
fn retry_after_secs(headers: &HeaderMap, now: DateTime<Utc>) -> Option<i64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Some(secs);
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        date.with_timezone(&Utc)
            .signed_duration_since(now)
            .num_seconds(),
    )
}
