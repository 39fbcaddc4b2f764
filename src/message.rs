//! Structured HTTP request and response values exchanged with the transport.

use http::{Method, StatusCode};
use std::borrow::Cow;
use url::Url;

/// Ordered header multimap. Names may repeat; every value is kept in insertion
/// order. Lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Opaque body bytes tagged with a content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
    content_type: String,
}

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// A fully bound request. Built once per attempt and never mutated; retries
/// and redirects construct a new one through [`HttpRequest::to_builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: Method,
    endpoint: Url,
    headers: Headers,
    query: Vec<(String, String)>,
    payload: Option<Payload>,
}

impl HttpRequest {
    pub fn builder(method: Method, endpoint: Url) -> HttpRequestBuilder {
        HttpRequestBuilder {
            request: HttpRequest {
                method,
                endpoint,
                headers: Headers::new(),
                query: Vec::new(),
                payload: None,
            },
        }
    }

    pub fn to_builder(&self) -> HttpRequestBuilder {
        HttpRequestBuilder {
            request: self.clone(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Endpoint without the bound query parameters.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Endpoint with the query parameters form-encoded onto it.
    pub fn url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        url
    }
}

pub struct HttpRequestBuilder {
    request: HttpRequest,
}

impl HttpRequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.request.method = method;
        self
    }

    pub fn endpoint(mut self, endpoint: Url) -> Self {
        self.request.endpoint = endpoint;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.append(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.push((key.into(), value.into()));
        self
    }

    pub fn clear_query(mut self) -> Self {
        self.request.query.clear();
        self
    }

    pub fn payload(mut self, payload: Option<Payload>) -> Self {
        self.request.payload = payload;
        self
    }

    pub fn build(self) -> HttpRequest {
        self.request
    }
}

/// Response handed back by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: StatusCode,
    headers: Headers,
    payload: Option<Payload>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            payload: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_payload(mut self, bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.payload = Some(Payload::new(bytes, content_type));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Content type of the body: the payload's own tag, else the
    /// `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .map(|p| p.content_type())
            .filter(|ct| !ct.is_empty())
            .or_else(|| self.headers.first("Content-Type"))
    }

    /// Body as text; empty when there is no payload.
    pub fn body_text(&self) -> Cow<'_, str> {
        self.payload
            .as_ref()
            .map(|p| p.text())
            .unwrap_or(Cow::Borrowed(""))
    }
}
