//! Error classifier chain: shared machinery providers use to turn parsed error
//! entries into a single [`CanonicalError`], and the registry that selects a
//! provider's classifier.

use crate::error::{CanonicalError, ErrorKind, ProviderErrorDetail};
use crate::message::{HttpRequest, HttpResponse};
use crate::provider::generic::StatusClassifier;
use crate::traits::ErrorClassifier;
use std::collections::HashMap;
use std::sync::Arc;

/// One failure as reported by the provider, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawError {
    pub code: Option<String>,
    pub error_type: Option<String>,
    pub message: Option<String>,
}

impl RawError {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Kind by HTTP status alone; the fallback for codes a provider does not know.
pub fn status_kind(status: u16) -> ErrorKind {
    match status {
        400 | 422 => ErrorKind::InvalidInput,
        401 | 403 => ErrorKind::AuthFailure,
        404 | 410 => ErrorKind::NotFound,
        409 | 412 => ErrorKind::Conflict,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::ServerFault,
        _ => ErrorKind::Unclassified,
    }
}

/// Text used when a response carries nothing readable.
pub(crate) fn fallback_text(response: &HttpResponse) -> String {
    let body = response.body_text();
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    let status = response.status();
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Combine classified entries into one error.
///
/// The kind is the entries' common kind, or [`ErrorKind::Batch`] when they
/// disagree. Messages are kept in first-seen order without duplicates. The
/// first entry supplies the structured detail. With no entries the result is
/// [`ErrorKind::Unclassified`] carrying `fallback`.
pub fn aggregate(
    status: u16,
    entries: Vec<(ErrorKind, RawError)>,
    request_id: Option<String>,
    fallback: String,
) -> CanonicalError {
    let Some((first_kind, first)) = entries.first() else {
        let mut err = CanonicalError::unclassified(status, fallback);
        if request_id.is_some() {
            err.detail = Some(ProviderErrorDetail {
                request_id,
                ..ProviderErrorDetail::default()
            });
        }
        return err;
    };

    let kind = if entries.iter().all(|(k, _)| k == first_kind) {
        *first_kind
    } else {
        ErrorKind::Batch
    };

    let mut messages: Vec<String> = Vec::with_capacity(entries.len());
    for (_, raw) in &entries {
        if let Some(text) = raw.message.as_ref().or(raw.code.as_ref())
            && !messages.contains(text)
        {
            messages.push(text.clone());
        }
    }
    let message = if messages.is_empty() {
        fallback
    } else {
        messages.join("; ")
    };
    if messages.is_empty() {
        messages.push(message.clone());
    }

    CanonicalError {
        kind,
        status,
        message,
        messages,
        detail: Some(ProviderErrorDetail {
            code: first.code.clone(),
            error_type: first.error_type.clone(),
            message: first.message.clone(),
            request_id,
        }),
    }
}

/// Provider id → classifier. Operations whose provider has no registered
/// classifier fall back to [`StatusClassifier`].
#[derive(Clone)]
pub struct ClassifierRegistry {
    classifiers: HashMap<String, Arc<dyn ErrorClassifier>>,
    fallback: Arc<dyn ErrorClassifier>,
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self {
            classifiers: HashMap::new(),
            fallback: Arc::new(StatusClassifier),
        }
    }
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a classifier under its
    /// [`provider_id`](ErrorClassifier::provider_id); a second registration
    /// for the same id replaces the first.
    pub fn register<C: ErrorClassifier + 'static>(&mut self, classifier: C) {
        self.classifiers
            .insert(classifier.provider_id().to_string(), Arc::new(classifier));
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.classifiers.contains_key(provider_id) || provider_id == self.fallback.provider_id()
    }

    pub fn get(&self, provider_id: &str) -> &dyn ErrorClassifier {
        self.classifiers
            .get(provider_id)
            .map(|c| c.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    pub fn classify(
        &self,
        provider_id: &str,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> CanonicalError {
        self.get(provider_id).classify(request, response)
    }
}
