#![allow(dead_code)]

//! Mock transport for unit tests.
//!
//! Replays canned responses in order and records every request it is handed.
//! The last canned outcome repeats once the queue is down to one entry.

use crate::error::TransportError;
use crate::message::{HttpRequest, HttpResponse};
use crate::traits::HttpTransport;
use async_trait::async_trait;
use http::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;

type Outcome = std::result::Result<HttpResponse, TransportError>;

#[derive(Default)]
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Outcome>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with a plain text body (no payload when `body` is empty).
    pub fn respond(self, status: StatusCode, body: &str) -> Self {
        let mut response = HttpResponse::new(status);
        if !body.is_empty() {
            response = response.with_payload(body.as_bytes().to_vec(), "text/plain");
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
}

#[async_trait]
impl HttpTransport for MockTransport {
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
