//! Thread-blocking client.
//!
//! Runs the same retry loop as [`LedgerClient`](crate::LedgerClient) on a
//! local executor, with a blocking transport and a thread-parking wait. Do
//! not call it from inside an async runtime.

use std::{collections::VecDeque, fmt, sync::Arc};

use futures::executor::block_on;
use serde::de::DeserializeOwned;

use crate::{
    client::{basic_authorization, credentials_from_env, ClientCore},
    transport::BlockingAdapter,
    ApiRequest, BlockingTransport, ClientOptions, HttpResponse, IdempotencyKeyGenerator, Page,
    RequestOptions, ReqwestBlockingTransport, Result, ThreadSleep, Validate, Wait,
};

/// Blocking client for the ledger and payments API.
#[derive(Clone)]
pub struct BlockingLedgerClient {
    core: Arc<ClientCore>,
}

impl fmt::Debug for BlockingLedgerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingLedgerClient")
            .field("core", &self.core)
            .finish()
    }
}

impl BlockingLedgerClient {
    /// Creates a client authenticating with an organization ID and API key.
    pub fn new(
        base_url: impl Into<String>,
        organization_id: impl AsRef<str>,
        api_key: impl AsRef<str>,
    ) -> Self {
        let authorization = basic_authorization(organization_id.as_ref(), api_key.as_ref());
        Self::new_raw_auth(base_url, authorization)
    }

    /// Creates a client with a full raw authorization value.
    pub fn new_raw_auth(base_url: impl Into<String>, authorization: impl Into<String>) -> Self {
        let transport: Arc<dyn BlockingTransport> = Arc::new(ReqwestBlockingTransport::default());
        Self {
            core: Arc::new(ClientCore::new(
                base_url.into(),
                authorization.into(),
                Arc::new(BlockingAdapter(transport)),
                Arc::new(ThreadSleep),
            )),
        }
    }

    /// Creates a client from `LEDGERPAY_BASE_URL`, `LEDGERPAY_ORGANIZATION_ID`
    /// and `LEDGERPAY_API_KEY`.
    pub fn from_env() -> std::result::Result<Self, String> {
        let (base_url, organization_id, api_key) = credentials_from_env()?;
        Ok(Self::new(base_url, organization_id, api_key))
    }

    /// Replaces the client-wide options.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        Arc::make_mut(&mut self.core).set_options(options);
        self
    }

    /// Replaces the HTTP transport. The default reqwest transport is never
    /// built if it is replaced before the first call.
    pub fn with_transport(mut self, transport: Arc<dyn BlockingTransport>) -> Self {
        Arc::make_mut(&mut self.core).set_transport(Arc::new(BlockingAdapter(transport)));
        self
    }

    /// Replaces how the client waits between retry attempts. The wait runs
    /// on the calling thread.
    pub fn with_wait(mut self, wait: Arc<dyn Wait>) -> Self {
        Arc::make_mut(&mut self.core).set_wait(wait);
        self
    }

    /// Replaces the idempotency key generator.
    pub fn with_idempotency_keys(mut self, keys: Arc<dyn IdempotencyKeyGenerator>) -> Self {
        Arc::make_mut(&mut self.core).set_keys(keys);
        self
    }

    /// Returns the client-wide options.
    pub fn options(&self) -> &ClientOptions {
        self.core.options()
    }

    /// Sends `request` with retries and decodes the JSON body into `T`.
    ///
    /// A cancellation stops backoff waits and further attempts; an attempt
    /// already in flight is bounded only by its timeout.
    pub fn execute<T>(&self, request: ApiRequest, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned + Validate,
    {
        block_on(self.core.execute(&request, &options))
    }

    /// Sends `request` with retries and discards a successful body.
    pub fn execute_empty(&self, request: ApiRequest, options: RequestOptions) -> Result<()> {
        block_on(self.core.execute_empty(&request, &options))
    }

    /// Sends `request` with retries and returns the last response as is.
    pub fn execute_raw(&self, request: ApiRequest, options: RequestOptions) -> Result<HttpResponse> {
        block_on(self.core.execute_raw(&request, &options))
    }

    /// Fetches the first page of a list endpoint.
    pub fn list<T>(&self, request: ApiRequest, options: RequestOptions) -> Result<BlockingPage<T>>
    where
        T: DeserializeOwned + Validate,
    {
        block_on(self.core.list(request, options)).map(|inner| BlockingPage { inner })
    }
}

/// Blocking view of a [`Page`].
#[derive(Debug)]
pub struct BlockingPage<T> {
    inner: Page<T>,
}

impl<T> BlockingPage<T> {
    pub fn items(&self) -> &[T] {
        self.inner.items()
    }

    pub fn into_items(self) -> Vec<T> {
        self.inner.into_items()
    }

    pub fn after_cursor(&self) -> &str {
        self.inner.after_cursor()
    }

    pub fn per_page(&self) -> &str {
        self.inner.per_page()
    }

    pub fn per_page_hint(&self) -> Option<usize> {
        self.inner.per_page_hint()
    }

    pub fn has_next_page(&self) -> bool {
        self.inner.has_next_page()
    }
}

impl<T> BlockingPage<T>
where
    T: DeserializeOwned + Validate,
{
    /// Fetches the following page, or `Ok(None)` on the last page.
    pub fn next_page(&self) -> Result<Option<BlockingPage<T>>> {
        block_on(self.inner.next_page()).map(|next| next.map(|inner| BlockingPage { inner }))
    }

    /// Iterates items from this page onwards, fetching pages on demand.
    pub fn into_items_iter(mut self) -> AutoPager<T> {
        AutoPager {
            buffer: self.inner.take_items().into(),
            page: Some(self),
        }
    }
}

/// Forward-only iterator over the items of successive pages. Stops after the
/// first error.
pub struct AutoPager<T> {
    buffer: VecDeque<T>,
    page: Option<BlockingPage<T>>,
}

impl<T> Iterator for AutoPager<T>
where
    T: DeserializeOwned + Validate,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            let current = self.page.take()?;
            match current.next_page() {
                Ok(Some(mut next)) => {
                    self.buffer = next.inner.take_items().into();
                    self.page = Some(next);
                }
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
