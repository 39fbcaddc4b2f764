use crate::classifier::{RawError, aggregate, fallback_text, status_kind};
use crate::error::CanonicalError;
use crate::message::{HttpRequest, HttpResponse};
use crate::traits::ErrorClassifier;
use serde_json::Value;

const REQUEST_ID_HEADERS: &[&str] = &["x-request-id", "x-amzn-requestid", "x-ms-request-id"];

/// Classifier for providers without a dedicated error document format.
///
/// The kind comes from the HTTP status. JSON bodies in the common shapes
/// (`{"error": {...}}`, `{"error": "..."}`, `{"code", "message"}`,
/// `{"errors": [...]}`, `{"message"}`) contribute their messages and codes;
/// other bodies are used verbatim as the message.
pub struct StatusClassifier;

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn entry_from_object(value: &Value) -> Option<RawError> {
    match value {
        Value::String(s) => Some(RawError::with_message(s.clone())),
        Value::Object(map) => {
            let raw = RawError {
                code: scalar(map.get("code")),
                error_type: scalar(map.get("type")).or_else(|| scalar(map.get("status"))),
                message: scalar(map.get("message"))
                    .or_else(|| scalar(map.get("error_description")))
                    .or_else(|| scalar(map.get("detail"))),
            };
            (raw != RawError::default()).then_some(raw)
        }
        _ => None,
    }
}

/// Extract entries from a JSON error body. Returns an empty list when the
/// document has none of the known shapes.
fn json_entries(body: &Value) -> Vec<RawError> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        return errors.iter().filter_map(entry_from_object).collect();
    }
    if let Some(error) = body.get("error") {
        let mut entry = entry_from_object(error);
        // OAuth style: {"error": "invalid_token", "error_description": "..."}
        if let (Some(e), Some(desc)) = (&mut entry, scalar(body.get("error_description"))) {
            e.code = e.message.take();
            e.message = Some(desc);
        }
        return entry.into_iter().collect();
    }
    entry_from_object(body).into_iter().collect()
}

fn is_json(content_type: Option<&str>, body: &str) -> bool {
    match content_type {
        Some(ct) => ct.contains("json"),
        None => body.starts_with('{'),
    }
}

impl ErrorClassifier for StatusClassifier {
    fn provider_id(&self) -> &'static str {
        crate::api::DEFAULT_PROVIDER
    }

    fn classify(&self, _request: &HttpRequest, response: &HttpResponse) -> CanonicalError {
        let status = response.status().as_u16();
        let kind = status_kind(status);
        let request_id = REQUEST_ID_HEADERS
            .iter()
            .find_map(|h| response.headers().first(h))
            .map(str::to_string);
        let body = response.body_text();
        let body = body.trim();

        let entries = if is_json(response.content_type(), body) && !body.is_empty() {
            match serde_json::from_str::<Value>(body) {
                Ok(doc) => json_entries(&doc),
                Err(e) => {
                    tracing::debug!(status, error = %e, "Unparseable JSON error body");
                    return aggregate(status, Vec::new(), request_id, fallback_text(response));
                }
            }
        } else {
            Vec::new()
        };

        let entries = if entries.is_empty() {
            vec![RawError::with_message(fallback_text(response))]
        } else {
            entries
        };
        aggregate(
            status,
            entries.into_iter().map(|e| (kind, e)).collect(),
            request_id,
            fallback_text(response),
        )
    }
}
