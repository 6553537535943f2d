use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;

use crate::{HttpRequest, HttpResponse, TransportError};

/// Performs one raw HTTP exchange.
///
/// Implementations must be safe to share between concurrent calls;
/// connection pooling is their concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// Thread-blocking counterpart of [`Transport`].
pub trait BlockingTransport: Send + Sync {
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by an async `reqwest` client.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.as_bytes().clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        // Read inside the attempt so the timeout covers the body and the
        // connection goes back to the pool.
        let body = response.bytes().await?;
        Ok(HttpResponse::new(status, headers, body))
    }
}

/// [`BlockingTransport`] backed by `reqwest::blocking`.
///
/// The default client is built on first use, so a transport that is
/// replaced before any call never starts reqwest's worker thread. Calls must
/// be made outside of an async runtime.
#[derive(Clone, Debug, Default)]
pub struct ReqwestBlockingTransport {
    http: OnceLock<reqwest::blocking::Client>,
}

impl ReqwestBlockingTransport {
    pub fn new(http: reqwest::blocking::Client) -> Self {
        Self {
            http: OnceLock::from(http),
        }
    }

    fn http(&self) -> &reqwest::blocking::Client {
        self.http.get_or_init(reqwest::blocking::Client::new)
    }
}

impl BlockingTransport for ReqwestBlockingTransport {
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .http()
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.as_bytes().to_vec());
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?;
        Ok(HttpResponse::new(status, headers, body))
    }
}

/// Lifts a [`BlockingTransport`] into [`Transport`]. The returned future
/// completes on first poll, after the blocking call returns.
pub(crate) struct BlockingAdapter<T: ?Sized>(pub(crate) std::sync::Arc<T>);

#[async_trait]
impl<T> Transport for BlockingAdapter<T>
where
    T: BlockingTransport + ?Sized,
{
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.0.execute(request, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::ReqwestBlockingTransport;

    #[test]
    fn default_blocking_transport_defers_client_construction() {
        let transport = ReqwestBlockingTransport::default();
        assert!(transport.http.get().is_none());

        let provided = ReqwestBlockingTransport::new(reqwest::blocking::Client::new());
        assert!(provided.http.get().is_some());
    }
}
