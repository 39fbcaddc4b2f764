//! Retry and redirect handling around the invocation pipeline.

use crate::api::RetryConfig;
use crate::command::Command;
use crate::error::Result;
use crate::message::HttpResponse;
use crate::pipeline::InvocationPipeline;

/// Run `command` through `pipeline`, retrying retryable failures and following
/// redirects.
///
/// Failures for which [`ApiError::is_retryable`](crate::error::ApiError::is_retryable)
/// holds are re-run after an exponential backoff until `config.max_attempts`
/// attempts have failed; each retry increments the command's failure count.
/// Redirects (301, 302, 303, 307, 308 with a `Location`) replace the
/// command's current request and do not count as attempts. Once
/// `config.max_redirects` have been followed, a further redirect is
/// classified as an error.
pub async fn execute_with_retry(
    pipeline: &InvocationPipeline,
    command: &mut Command,
    config: &RetryConfig,
) -> Result<HttpResponse> {
    let max_attempts = config.max_attempts.max(1);

    loop {
        let mut next = None;
        let follow = (command.redirect_count() < config.max_redirects).then_some(&mut next);
        match pipeline.step(command, follow).await {
            Ok(response) => {
                let Some(next) = next else {
                    break Ok(response);
                };
                let redirects = command.increment_redirect_count();
                tracing::warn!(
                    operation = %command.invocation().operation().name(),
                    redirect = redirects,
                    location = %next.url(),
                    "Following redirect"
                );
                command.set_current_request(next);
            }
            Err(e) if e.is_retryable() && command.failure_count() + 1 < max_attempts => {
                let attempt = command.increment_failure_count();
                let backoff = config.get_backoff(attempt);
                tracing::warn!(
                    operation = %command.invocation().operation().name(),
                    attempt,
                    backoff_ms = backoff.as_millis(),
                    error = %e,
                    "Retrying request"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                if !e.is_local() {
                    command.increment_failure_count();
                }
                break Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OperationSpec;
    use crate::binder::RequestBinder;
    use crate::classifier::ClassifierRegistry;
    use crate::error::{ApiError, ErrorKind, TransportError};
    use crate::invocation::{Invocation, Operation};
    use crate::mock::MockTransport;
    use crate::validation::ValidatorRegistry;
    use http::{Method, StatusCode};
    use serde_json::json;
    use std::sync::Arc;
    use url::Url;

    fn setup(transport: Arc<MockTransport>) -> (InvocationPipeline, Command) {
        let spec = OperationSpec::from_json_str(
            r#"{
                "name": "CreateZone",
                "method": "POST",
                "path": "/zones",
                "params": [ { "name": "body", "binding": { "payload": "application/json" }, "type": "json" } ]
            }"#,
        )
        .unwrap();
        let operation = Operation::resolve(&spec, &ValidatorRegistry::new()).unwrap();
        let invocation = Invocation::new(Arc::new(operation), vec![json!({"name": "a"})]).unwrap();
        let binder = RequestBinder::new(Url::parse("https://api.example.com").unwrap()).unwrap();
        let pipeline =
            InvocationPipeline::new(binder, transport, Arc::new(ClassifierRegistry::new()));
        (pipeline, Command::new(invocation))
    }

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_redirects: 2,
        }
    }

    #[tokio::test]
    async fn retries_server_faults_until_success() {
        let transport = Arc::new(
            MockTransport::new()
                .respond(StatusCode::SERVICE_UNAVAILABLE, "")
                .fail_with(TransportError::transient("connection reset"))
                .respond(StatusCode::CREATED, "{}"),
        );
        let (pipeline, mut command) = setup(transport.clone());

        let response = execute_with_retry(&pipeline, &mut command, &fast(3))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(command.failure_count(), 2);
        assert_eq!(transport.call_count(), 3);
        assert!(command.exception().is_none());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let transport = Arc::new(MockTransport::new().respond(StatusCode::TOO_MANY_REQUESTS, ""));
        let (pipeline, mut command) = setup(transport.clone());

        let err = execute_with_retry(&pipeline, &mut command, &fast(3))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::RateLimited));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(command.failure_count(), 3);
        assert_eq!(command.exception(), Some(&err));
    }

    #[tokio::test]
    async fn non_retryable_failure_is_returned_immediately() {
        let transport = Arc::new(MockTransport::new().respond(StatusCode::CONFLICT, "exists"));
        let (pipeline, mut command) = setup(transport.clone());

        let err = execute_with_retry(&pipeline, &mut command, &fast(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Remote(ref e) if e.kind == ErrorKind::Conflict));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn follows_see_other_as_get() {
        let transport = Arc::new(
            MockTransport::new()
                .respond_with(
                    HttpResponse::new(StatusCode::SEE_OTHER)
                        .with_header("Location", "/zones/42"),
                )
                .respond(StatusCode::OK, "{}"),
        );
        let (pipeline, mut command) = setup(transport.clone());

        execute_with_retry(&pipeline, &mut command, &fast(1))
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(*requests[0].method(), Method::POST);
        assert_eq!(*requests[1].method(), Method::GET);
        assert!(requests[1].payload().is_none());
        assert_eq!(requests[1].url().as_str(), "https://api.example.com/zones/42");
        assert_eq!(command.redirect_count(), 1);
        assert_eq!(command.failure_count(), 0);
    }

    #[tokio::test]
    async fn redirect_loop_stops_at_limit() {
        let transport = Arc::new(MockTransport::new().respond_with(
            HttpResponse::new(StatusCode::TEMPORARY_REDIRECT)
                .with_header("Location", "https://api.example.com/zones"),
        ));
        let (pipeline, mut command) = setup(transport.clone());

        let err = execute_with_retry(&pipeline, &mut command, &fast(1))
            .await
            .unwrap_err();

        assert_eq!(command.redirect_count(), 2);
        assert_eq!(transport.call_count(), 3);
        match err {
            ApiError::Remote(e) => assert_eq!(e.status, 307),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn backoff_doubles() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_redirects: 0,
        };
        assert_eq!(config.get_backoff(1).as_millis(), 100);
        assert_eq!(config.get_backoff(2).as_millis(), 200);
        assert_eq!(config.get_backoff(4).as_millis(), 800);
    }
}
