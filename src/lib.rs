//! `ledgerpay-http` is the HTTP execution layer of a ledger and payments
//! API client.
//!
//! It turns a logical call ([`ApiRequest`]) into network requests with:
//! - retries on network failures, 409, 429 and 5xx responses, honoring
//!   `Retry-After` and the `x-should-retry` hint
//! - capped exponential backoff with jitter
//! - an idempotency key that stays fixed across a call's attempts
//! - cursor pagination via `X-After-Cursor` / `X-Per-Page`
//!
//! Two call styles share the same retry loop: [`LedgerClient`] (async) and
//! [`BlockingLedgerClient`] (thread-blocking).

mod blocking;
mod client;
mod decode;
mod error;
mod idempotency;
mod options;
mod page;
mod request;
mod response;
pub mod retry;
mod transport;
mod wait;
mod wire;

pub use blocking::{AutoPager, BlockingLedgerClient, BlockingPage};
pub use client::{basic_authorization, LedgerClient};
pub use decode::{require, Validate};
pub use error::{ApiError, ApiErrorKind, BoxError, LedgerError, TransportError};
pub use idempotency::{IdempotencyKeyGenerator, UuidKeyGenerator};
pub use options::{ClientOptions, RequestOptions};
pub use page::Page;
pub use request::{ApiRequest, HttpRequest, QueryParams, RequestBody};
pub use response::HttpResponse;
pub use transport::{BlockingTransport, ReqwestBlockingTransport, ReqwestTransport, Transport};
pub use wait::{Cancellation, ThreadSleep, TokioSleep, Wait};
pub use wire::{AFTER_CURSOR_HEADER, AFTER_CURSOR_PARAM, PER_PAGE_HEADER};

pub type Result<T> = std::result::Result<T, LedgerError>;
