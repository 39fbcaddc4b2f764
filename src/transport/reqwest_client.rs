use crate::error::TransportError;
use crate::message::{HttpRequest, HttpResponse};
use crate::traits::HttpTransport;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;

/// Transport backed by a [`reqwest::Client`].
///
/// The client must not follow redirects itself; redirects are handled by
/// [`execute_with_retry`](crate::reliability::execute_with_retry) so they are
/// counted on the command.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| TransportError::new(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client. It should be built with
    /// `redirect(Policy::none())`.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() || e.is_connect() {
        TransportError::transient(e.to_string())
    } else {
        TransportError::new(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method().clone(), request.url());
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(payload) = request.payload() {
            builder = builder
                .header(CONTENT_TYPE, payload.content_type())
                .body(payload.bytes().to_vec());
        }

        let response = builder.send().await.map_err(map_error)?;

        let mut converted = HttpResponse::new(response.status());
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(v) => converted = converted.with_header(name.as_str(), v),
                Err(_) => tracing::debug!(header = %name, "Skipping non-ASCII response header"),
            }
        }
        // Left empty when absent so classifiers can sniff the body.
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.bytes().await.map_err(map_error)?;
        if !body.is_empty() {
            converted = converted.with_payload(body.to_vec(), content_type);
        }
        Ok(converted)
    }
}
