//! The invocation pipeline: validate, bind, send, classify.

use crate::binder::RequestBinder;
use crate::classifier::ClassifierRegistry;
use crate::command::Command;
use crate::error::{ApiError, Result};
use crate::message::{HttpRequest, HttpResponse};
use crate::traits::HttpTransport;
use crate::validation::validate_invocation;
use http::{Method, StatusCode};
use std::sync::Arc;
use std::time::Instant;

/// Runs one attempt of a [`Command`] against a transport.
///
/// 1. The validator chain runs; a failure is returned without touching the
///    transport.
/// 2. The invocation is bound, unless a redirect already installed a request
///    on the command.
/// 3. The transport sends the request. A 2xx response is returned as-is.
/// 4. Any other status is classified by the operation provider's
///    [`ErrorClassifier`](crate::traits::ErrorClassifier).
///
/// The error of a failed attempt is returned and also recorded on the
/// command.
pub struct InvocationPipeline {
    binder: RequestBinder,
    transport: Arc<dyn HttpTransport>,
    classifiers: Arc<ClassifierRegistry>,
}

impl InvocationPipeline {
    pub fn new(
        binder: RequestBinder,
        transport: Arc<dyn HttpTransport>,
        classifiers: Arc<ClassifierRegistry>,
    ) -> Self {
        Self {
            binder,
            transport,
            classifiers,
        }
    }

    pub fn binder(&self) -> &RequestBinder {
        &self.binder
    }

    pub fn classifiers(&self) -> &ClassifierRegistry {
        &self.classifiers
    }

    /// Run one attempt. Redirect responses are classified like any other
    /// non-2xx status; use
    /// [`execute_with_retry`](crate::reliability::execute_with_retry) to
    /// follow them.
    pub async fn execute(&self, command: &mut Command) -> Result<HttpResponse> {
        self.step(command, None).await
    }

    /// Run one attempt. When `redirect` is given and the response is a
    /// followable redirect, the rewritten request is stored there and the
    /// redirect response is returned instead of being classified.
    #[tracing::instrument(
        skip_all,
        fields(
            operation = %command.invocation().operation().name(),
            provider = %command.invocation().operation().provider(),
        )
    )]
    pub(crate) async fn step(
        &self,
        command: &mut Command,
        mut redirect: Option<&mut Option<HttpRequest>>,
    ) -> Result<HttpResponse> {
        command.clear_exception();
        let start = Instant::now();
        let result = self.attempt(command, redirect.as_deref_mut()).await;
        let redirected = redirect.is_some_and(|next| next.is_some());

        let status = match &result {
            Ok(_) if redirected => "redirect",
            Ok(_) => "success",
            Err(ApiError::Transport(_)) => "transport",
            Err(ApiError::Remote(_)) => "remote",
            Err(_) => "invalid",
        };
        let operation = command.invocation().operation();
        metrics::histogram!(
            "rest_invocation.duration_seconds",
            "operation" => operation.name().to_string(),
            "provider" => operation.provider().to_string()
        )
        .record(start.elapsed().as_secs_f64());
        metrics::counter!(
            "rest_invocation.total",
            "operation" => operation.name().to_string(),
            "provider" => operation.provider().to_string(),
            "status" => status
        )
        .increment(1);

        if let Err(e) = &result {
            command.set_exception(e.clone());
        }
        result
    }

    async fn attempt(
        &self,
        command: &mut Command,
        redirect: Option<&mut Option<HttpRequest>>,
    ) -> Result<HttpResponse> {
        validate_invocation(command.invocation())?;

        let request = match command.current_request() {
            Some(request) => request.clone(),
            None => {
                let request = self.binder.bind(command.invocation())?;
                command.set_current_request(request.clone());
                request
            }
        };

        let response = self.transport.execute(&request).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        if let Some(slot) = redirect
            && let Some(next) = redirect_request(&request, &response)
        {
            *slot = Some(next);
            return Ok(response);
        }

        let provider = command.invocation().operation().provider();
        let error = self.classifiers.classify(provider, &request, &response);
        tracing::debug!(
            status = error.status,
            kind = %error.kind,
            url = %request.url(),
            "Request failed"
        );
        Err(error.into())
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// The request to send after a redirect response, or `None` when `response`
/// is not a redirect or its `Location` cannot be resolved.
///
/// A 303 turns the request into a body-less GET; other redirects repeat the
/// original method and body. The query of the new request is whatever the
/// `Location` carries.
pub(crate) fn redirect_request(request: &HttpRequest, response: &HttpResponse) -> Option<HttpRequest> {
    if !is_redirect(response.status()) {
        return None;
    }
    let location = response.headers().first("Location")?;
    let target = request.url().join(location).ok()?;

    let mut builder = request.to_builder().endpoint(target).clear_query();
    if response.status() == StatusCode::SEE_OTHER {
        builder = builder.method(Method::GET).payload(None);
    }
    Some(builder.build())
}
