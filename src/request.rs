use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::Serialize;
use url::Url;

use crate::{LedgerError, Result};

/// Ordered query-parameter multimap: keys keep insertion order and each key
/// keeps its values in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, Vec<String>)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to `key`.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, values)) => values.push(value),
            None => self.0.push((key, vec![value])),
        }
    }

    /// Replaces every value of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, values)) => *values = vec![value],
            None => self.0.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(key, value)` pairs in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| (key.as_str(), value.as_str()))
        })
    }
}

/// Serialized request payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestBody {
    bytes: Bytes,
    content_type: Option<HeaderValue>,
    repeatable: bool,
}

impl RequestBody {
    /// Serializes `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)
            .map_err(|err| LedgerError::InvalidRequest(format!("invalid JSON body: {err}")))?;
        Ok(Self {
            bytes: bytes.into(),
            content_type: Some(HeaderValue::from_static("application/json")),
            repeatable: true,
        })
    }

    /// Raw bytes that may be sent again on retry.
    pub fn bytes(bytes: impl Into<Bytes>, content_type: Option<HeaderValue>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
            repeatable: true,
        }
    }

    /// A payload that must only go over the wire once, such as a streamed
    /// upload. Requests carrying it are never retried.
    pub fn one_shot(bytes: impl Into<Bytes>, content_type: Option<HeaderValue>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
            repeatable: false,
        }
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }
}

/// A logical API call: method, path relative to the base URL, query,
/// headers and optional body.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    path_segments: Vec<String>,
    query: QueryParams,
    headers: HeaderMap,
    body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            path_segments: Vec::new(),
            query: QueryParams::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Appends one path segment. Segments are percent-encoded on send.
    pub fn path_segment(mut self, segment: impl Into<String>) -> Self {
        self.path_segments.push(segment.into());
        self
    }

    /// Appends a query value.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.add(key, value);
        self
    }

    /// Appends a header value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        Ok(self.body(RequestBody::json(value)?))
    }

    /// Returns a copy with every value of `key` replaced by `value`.
    pub fn with_query_value(&self, key: &str, value: impl Into<String>) -> Self {
        let mut request = self.clone();
        request.query.set(key, value);
        request
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path_segments(&self) -> &[String] {
        &self.path_segments
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn request_body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Resolves this request against `base_url`, layering `default_headers`
    /// beneath the request's own headers.
    pub(crate) fn prepare(&self, base_url: &str, default_headers: &HeaderMap) -> Result<HttpRequest> {
        let mut url = Url::parse(base_url)
            .map_err(|err| LedgerError::InvalidRequest(format!("invalid base url '{base_url}': {err}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                LedgerError::InvalidRequest(format!("base url '{base_url}' cannot carry a path"))
            })?;
            segments.pop_if_empty().extend(&self.path_segments);
        }
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.query.pairs() {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = default_headers.clone();
        for name in self.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        if let Some(content_type) = self.body.as_ref().and_then(RequestBody::content_type) {
            if !headers.contains_key(reqwest::header::CONTENT_TYPE) {
                headers.insert(reqwest::header::CONTENT_TYPE, content_type.clone());
            }
        }

        Ok(HttpRequest {
            method: self.method.clone(),
            url,
            headers,
            body: self.body.clone(),
        })
    }
}

/// A request ready for the wire.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// True when the request can be sent more than once.
    pub fn is_repeatable(&self) -> bool {
        self.body.as_ref().map_or(true, RequestBody::is_repeatable)
    }
}
