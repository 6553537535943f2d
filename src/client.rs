use std::{fmt, sync::Arc};

use base64::Engine;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::{
    decode::{decode_empty, decode_json},
    options::ResolvedOptions,
    retry::{self, RetryContext},
    ApiRequest, ClientOptions, HttpResponse, IdempotencyKeyGenerator, LedgerError, Page,
    RequestOptions, ReqwestTransport, Result, TokioSleep, Transport, UuidKeyGenerator, Validate,
    Wait,
};

const USER_AGENT: &str = concat!("ledgerpay-http/", env!("CARGO_PKG_VERSION"));

/// Builds the `Authorization` value for HTTP basic auth with an
/// organization ID and API key.
pub fn basic_authorization(organization_id: &str, api_key: &str) -> String {
    let credentials = format!("{}:{}", organization_id.trim(), api_key.trim());
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(credentials)
    )
}

/// State shared by a client, its clones and the pages it produced.
#[derive(Clone)]
pub(crate) struct ClientCore {
    base_url: String,
    authorization: String,
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    wait: Arc<dyn Wait>,
    keys: Arc<dyn IdempotencyKeyGenerator>,
}

impl fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCore")
            .field("base_url", &self.base_url)
            .field("authorization", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl ClientCore {
    pub(crate) fn new(
        base_url: String,
        authorization: String,
        transport: Arc<dyn Transport>,
        wait: Arc<dyn Wait>,
    ) -> Self {
        Self {
            base_url,
            authorization,
            options: ClientOptions::default(),
            transport,
            wait,
            keys: Arc::new(UuidKeyGenerator),
        }
    }

    pub(crate) fn set_options(&mut self, options: ClientOptions) {
        self.options = options;
    }

    pub(crate) fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    pub(crate) fn set_wait(&mut self, wait: Arc<dyn Wait>) {
        self.wait = wait;
    }

    pub(crate) fn set_keys(&mut self, keys: Arc<dyn IdempotencyKeyGenerator>) {
        self.keys = keys;
    }

    pub(crate) fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        if !self.authorization.is_empty() {
            let mut value = HeaderValue::from_str(&self.authorization).map_err(|err| {
                LedgerError::InvalidRequest(format!("invalid authorization value: {err}"))
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn idempotency_header(&self) -> Result<Option<HeaderName>> {
        self.options
            .idempotency_header
            .as_deref()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                    LedgerError::InvalidRequest(format!(
                        "invalid idempotency header name '{name}': {err}"
                    ))
                })
            })
            .transpose()
    }

    /// Sends `request` through the retry loop without decoding.
    pub(crate) async fn send(
        &self,
        request: &ApiRequest,
        options: &ResolvedOptions,
    ) -> Result<HttpResponse> {
        let prepared = request.prepare(&self.base_url, &self.default_headers()?)?;
        let idempotency_header = self.idempotency_header()?;
        let context = RetryContext {
            transport: self.transport.as_ref(),
            wait: self.wait.as_ref(),
            keys: self.keys.as_ref(),
            idempotency_header: idempotency_header.as_ref(),
        };
        retry::execute(&context, prepared, options).await
    }

    pub(crate) async fn execute<T>(&self, request: &ApiRequest, options: &RequestOptions) -> Result<T>
    where
        T: DeserializeOwned + Validate,
    {
        let resolved = options.resolve(&self.options);
        let response = self.send(request, &resolved).await?;
        decode_json(response, resolved.response_validation)
    }

    pub(crate) async fn execute_empty(
        &self,
        request: &ApiRequest,
        options: &RequestOptions,
    ) -> Result<()> {
        let resolved = options.resolve(&self.options);
        let response = self.send(request, &resolved).await?;
        decode_empty(response)
    }

    pub(crate) async fn execute_raw(
        &self,
        request: &ApiRequest,
        options: &RequestOptions,
    ) -> Result<HttpResponse> {
        let resolved = options.resolve(&self.options);
        self.send(request, &resolved).await
    }

    pub(crate) async fn list<T>(
        self: &Arc<Self>,
        request: ApiRequest,
        options: RequestOptions,
    ) -> Result<Page<T>>
    where
        T: DeserializeOwned + Validate,
    {
        let resolved = options.resolve(&self.options);
        let response = self.send(&request, &resolved).await?;
        let headers = response.headers().clone();
        let items = decode_json::<Vec<T>>(response, resolved.response_validation)?;
        Ok(Page::from_response(
            items,
            &headers,
            request,
            options,
            Arc::clone(self),
        ))
    }
}

/// Async client for the ledger and payments API.
///
/// Cheap to clone; clones share the transport and configuration.
#[derive(Clone)]
pub struct LedgerClient {
    core: Arc<ClientCore>,
}

impl fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerClient")
            .field("base_url", &self.core.base_url)
            .field("authorization", &"<redacted>")
            .field("options", &self.core.options)
            .finish()
    }
}

impl LedgerClient {
    /// Creates a client authenticating with an organization ID and API key.
    pub fn new(
        base_url: impl Into<String>,
        organization_id: impl AsRef<str>,
        api_key: impl AsRef<str>,
    ) -> Self {
        let authorization = basic_authorization(organization_id.as_ref(), api_key.as_ref());
        Self::new_raw_auth(base_url, authorization)
    }

    /// Creates a client with a full raw authorization value, such as
    /// `"Bearer <token>"`. An empty value sends no `Authorization` header.
    pub fn new_raw_auth(base_url: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            core: Arc::new(ClientCore::new(
                base_url.into(),
                authorization.into(),
                Arc::new(ReqwestTransport::default()),
                Arc::new(TokioSleep),
            )),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `LEDGERPAY_BASE_URL`: API base URL
    /// - `LEDGERPAY_ORGANIZATION_ID`: organization ID
    /// - `LEDGERPAY_API_KEY`: API key
    ///
    /// Returns an error if any variable is missing or empty.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ledgerpay_http::LedgerClient;
    ///
    /// let client = LedgerClient::from_env().expect("missing LEDGERPAY_* env vars");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let (base_url, organization_id, api_key) = credentials_from_env()?;
        Ok(Self::new(base_url, organization_id, api_key))
    }

    /// Applies client options such as timeout, retries and validation.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        Arc::make_mut(&mut self.core).set_options(options);
        self
    }

    /// Replaces the HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        Arc::make_mut(&mut self.core).set_transport(transport);
        self
    }

    /// Replaces how the client waits between retry attempts.
    pub fn with_wait(mut self, wait: Arc<dyn Wait>) -> Self {
        Arc::make_mut(&mut self.core).set_wait(wait);
        self
    }

    /// Replaces the idempotency key generator.
    pub fn with_idempotency_keys(mut self, keys: Arc<dyn IdempotencyKeyGenerator>) -> Self {
        Arc::make_mut(&mut self.core).set_keys(keys);
        self
    }

    pub fn options(&self) -> &ClientOptions {
        self.core.options()
    }

    /// Sends `request` and decodes the JSON body into `T`.
    pub async fn execute<T>(&self, request: ApiRequest, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned + Validate,
    {
        self.core.execute(&request, &options).await
    }

    /// Sends `request` and only checks the status.
    pub async fn execute_empty(&self, request: ApiRequest, options: RequestOptions) -> Result<()> {
        self.core.execute_empty(&request, &options).await
    }

    /// Sends `request` with retries and returns the undecoded response,
    /// whatever its status.
    pub async fn execute_raw(
        &self,
        request: ApiRequest,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        self.core.execute_raw(&request, &options).await
    }

    /// Sends a list request and returns the first page.
    pub async fn list<T>(&self, request: ApiRequest, options: RequestOptions) -> Result<Page<T>>
    where
        T: DeserializeOwned + Validate,
    {
        self.core.list(request, options).await
    }
}

pub(crate) fn credentials_from_env() -> std::result::Result<(String, String, String), String> {
    let read = |name: &str| {
        let value =
            std::env::var(name).map_err(|_| format!("missing {name} environment variable"))?;
        if value.trim().is_empty() {
            return Err(format!("{name} is set but empty"));
        }
        Ok(value)
    };
    Ok((
        read("LEDGERPAY_BASE_URL")?,
        read("LEDGERPAY_ORGANIZATION_ID")?,
        read("LEDGERPAY_API_KEY")?,
    ))
}
