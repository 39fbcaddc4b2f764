//! Per-call state carried through the invocation pipeline.

use crate::error::ApiError;
use crate::invocation::Invocation;
use crate::message::HttpRequest;

/// One call in flight: the invocation, the request currently being sent, the
/// error of the last attempt, and retry/redirect counters.
///
/// A command belongs to a single call and is passed as `&mut` through the
/// pipeline; it is never shared between tasks.
#[derive(Debug)]
pub struct Command {
    invocation: Invocation,
    current_request: Option<HttpRequest>,
    exception: Option<ApiError>,
    failure_count: u32,
    redirect_count: u32,
}

impl Command {
    pub fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            current_request: None,
            exception: None,
            failure_count: 0,
            redirect_count: 0,
        }
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// The request most recently bound or installed by a redirect.
    pub fn current_request(&self) -> Option<&HttpRequest> {
        self.current_request.as_ref()
    }

    /// Replace the request sent on the next attempt. The pipeline sends an
    /// installed request as-is instead of binding the invocation again.
    pub fn set_current_request(&mut self, request: HttpRequest) {
        self.current_request = Some(request);
    }

    /// The error recorded by the most recent attempt, if it failed.
    pub fn exception(&self) -> Option<&ApiError> {
        self.exception.as_ref()
    }

    pub(crate) fn set_exception(&mut self, error: ApiError) {
        self.exception = Some(error);
    }

    pub(crate) fn clear_exception(&mut self) {
        self.exception = None;
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Record a failed attempt and return the new count.
    pub fn increment_failure_count(&mut self) -> u32 {
        self.failure_count += 1;
        self.failure_count
    }

    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    /// Record a followed redirect and return the new count.
    pub fn increment_redirect_count(&mut self) -> u32 {
        self.redirect_count += 1;
        self.redirect_count
    }
}
