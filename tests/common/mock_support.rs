//! Shared fixtures for integration tests: a recording transport with canned
//! responses, and helpers for building runtimes around it.

use async_trait::async_trait;
use cloudbind::error::TransportError;
use cloudbind::message::{HttpRequest, HttpResponse};
use cloudbind::runtime::{ApiRuntime, ApiRuntimeBuilder};
use cloudbind::traits::HttpTransport;
use http::StatusCode;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Outcome = Result<HttpResponse, TransportError>;

/// Transport that replays canned outcomes in order and records every request.
/// The last outcome repeats once the queue is down to one entry.
#[derive(Default)]
pub struct RecordingTransport {
    outcomes: Mutex<VecDeque<Outcome>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `200 OK` with an empty body.
    pub fn ok() -> Self {
        Self::new().respond_with(HttpResponse::new(StatusCode::OK))
    }

    pub fn respond(self, status: u16, content_type: &str, body: &str) -> Self {
        let status = StatusCode::from_u16(status).expect("valid status code");
        let mut response = HttpResponse::new(status);
        if !body.is_empty() {
            response = response.with_payload(body.as_bytes().to_vec(), content_type);
        }
        self.respond_with(response)
    }

    pub fn respond_with(self, response: HttpResponse) -> Self {
        self.outcomes.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail_with(self, error: TransportError) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn execute(&self, request: &HttpRequest) -> Outcome {
        self.requests.lock().unwrap().push(request.clone());
        let mut outcomes = self.outcomes.lock().unwrap();
        match outcomes.len() {
            0 => Err(TransportError::new("no canned response")),
            1 => outcomes[0].clone(),
            _ => outcomes.pop_front().unwrap(),
        }
    }
}

pub const ROUTE53_ENDPOINT: &str = "https://route53.amazonaws.com";

/// Builder preset with the Route 53 endpoint and `transport`.
pub fn builder_with(transport: Arc<RecordingTransport>) -> ApiRuntimeBuilder {
    ApiRuntime::builder()
        .endpoint(url::Url::parse(ROUTE53_ENDPOINT).unwrap())
        .transport(transport)
}

/// Runtime over a one-operation catalog given as JSON.
pub fn runtime_with(transport: Arc<RecordingTransport>, catalog: &str) -> Arc<ApiRuntime> {
    builder_with(transport)
        .catalog_from_str(catalog)
        .unwrap()
        .build()
        .unwrap()
}
