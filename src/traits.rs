//! The seams between the core and its collaborators: transports, provider
//! error classifiers, and parameter validators.

use crate::error::{CanonicalError, TransportError};
use crate::message::{HttpRequest, HttpResponse};
use crate::validation::ValidationFailure;
use async_trait::async_trait;
use serde_json::Value;

/// Executes a bound request and returns the provider's response.
///
/// Connection pooling, TLS, signing, and transport-level retries all live
/// behind this trait. The pipeline awaits exactly one `execute` per attempt;
/// dropping the returned future is the only form of cancellation.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Maps a provider's failure response to a [`CanonicalError`].
///
/// Implementations must not fail: anything that cannot be parsed degrades to
/// [`ErrorKind::Unclassified`](crate::error::ErrorKind::Unclassified) carrying
/// the raw body text.
pub trait ErrorClassifier: Send + Sync {
    /// Identifier operations use to select this classifier (e.g. `"aws/route53"`).
    fn provider_id(&self) -> &'static str;

    fn classify(&self, request: &HttpRequest, response: &HttpResponse) -> CanonicalError;
}

/// A pure predicate over one argument value.
///
/// Validators receive `Value::Null` for absent arguments and should accept it
/// unless the predicate is specifically about presence.
pub trait ParamValidator: Send + Sync {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure>;
}
