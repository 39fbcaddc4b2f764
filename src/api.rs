//! Declarative operation schema: the JSON catalog that describes how each API
//! method binds its parameters, plus retry configuration.

use crate::error::{ApiError, Result};
use crate::invocation::PathTemplate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Provider id used when an operation does not name one. Selects the generic
/// status-based classifier.
pub const DEFAULT_PROVIDER: &str = "generic";

/// Where an argument ends up in the HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSpec {
    /// Substituted into the `{slot}` of the same name in the path template.
    Path(String),
    /// Appended to the header multimap under this name.
    Header(String),
    /// Appended as a query pair under this key.
    Query(String),
    /// Sent as the request body with this content type.
    Payload(String),
}

/// Text format used to render timestamp arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    #[default]
    Rfc3339,
    Rfc2822,
    EpochSeconds,
}

/// Declared type of a parameter, which fixes how its value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Boolean,
    Timestamp(TimestampFormat),
    Json,
    Bytes,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Boolean => write!(f, "boolean"),
            Self::Timestamp(_) => write!(f, "timestamp"),
            Self::Json => write!(f, "json"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// One formal parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub binding: BindingSpec,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    /// Validator identifiers applied to this parameter only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<String>,
}

/// A header sent with every call of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSpec {
    pub name: String,
    pub value: String,
}

/// Declarative description of one API method.
///
/// # Example JSON
///
/// ```json
/// {
///   "name": "GetHostedZone",
///   "provider": "aws/route53",
///   "method": "GET",
///   "path": "/2012-02-29/hostedzone/{zoneId}",
///   "params": [
///     { "name": "zoneId", "binding": { "path": "zoneId" }, "validators": ["non-blank"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    /// Provider whose error classifier handles failures. Defaults to
    /// [`DEFAULT_PROVIDER`].
    #[serde(default = "default_provider")]
    pub provider: String,
    pub method: String,
    /// Path template relative to the runtime endpoint, with `{slot}` placeholders.
    pub path: String,
    /// Validator identifiers applied to every parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderSpec>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

impl OperationSpec {
    /// Check structural invariants that do not depend on registries: a valid
    /// method, well-formed template whose slots all have exactly one path
    /// binding, unique parameter names, and at most one payload parameter.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ApiError::Config("Operation name cannot be empty".to_string()));
        }
        http::Method::from_bytes(self.method.as_bytes()).map_err(|_| {
            ApiError::Config(format!(
                "Invalid HTTP method '{}' for operation '{}'",
                self.method, self.name
            ))
        })?;

        let template = PathTemplate::parse(&self.path).map_err(|e| {
            ApiError::Config(format!("Operation '{}': {}", self.name, e))
        })?;

        let mut names = HashSet::new();
        let mut path_bindings = HashSet::new();
        let mut payloads = 0;
        for param in &self.params {
            if param.name.is_empty() {
                return Err(ApiError::Config(format!(
                    "Operation '{}' has a parameter with an empty name",
                    self.name
                )));
            }
            if !names.insert(param.name.as_str()) {
                return Err(ApiError::Config(format!(
                    "Duplicate parameter '{}' in operation '{}'",
                    param.name, self.name
                )));
            }
            match &param.binding {
                BindingSpec::Path(slot) => {
                    if !template.has_slot(slot) {
                        return Err(ApiError::Config(format!(
                            "Parameter '{}' binds to unknown path slot '{}' in operation '{}'",
                            param.name, slot, self.name
                        )));
                    }
                    if !path_bindings.insert(slot.as_str()) {
                        return Err(ApiError::Config(format!(
                            "Path slot '{}' is bound twice in operation '{}'",
                            slot, self.name
                        )));
                    }
                }
                BindingSpec::Header(name) | BindingSpec::Query(name) if name.is_empty() => {
                    return Err(ApiError::Config(format!(
                        "Parameter '{}' in operation '{}' binds to an empty name",
                        param.name, self.name
                    )));
                }
                BindingSpec::Payload(_) => payloads += 1,
                _ => {}
            }
        }
        if payloads > 1 {
            return Err(ApiError::Config(format!(
                "Operation '{}' declares {} payload parameters; at most one is allowed",
                self.name, payloads
            )));
        }
        if let Some(slot) = template.slots().find(|s| !path_bindings.contains(s)) {
            return Err(ApiError::Config(format!(
                "Path slot '{}' in operation '{}' has no bound parameter",
                slot, self.name
            )));
        }
        Ok(())
    }

    /// Parse a single `OperationSpec` from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(s)
            .map_err(|e| ApiError::Config(format!("Invalid OperationSpec JSON: {}", e)))?;
        spec.validate()?;
        Ok(spec)
    }
}

/// Parse a catalog (array) of `OperationSpec` from a JSON string.
pub fn catalog_from_str(s: &str) -> Result<Vec<OperationSpec>> {
    let specs: Vec<OperationSpec> = serde_json::from_str(s)
        .map_err(|e| ApiError::Config(format!("Invalid catalog JSON: {}", e)))?;
    for spec in &specs {
        spec.validate()?;
    }
    Ok(specs)
}

/// Read and parse a catalog from a JSON file.
pub fn catalog_from_file(path: impl AsRef<Path>) -> Result<Vec<OperationSpec>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ApiError::Config(format!(
            "Failed to read catalog file '{}': {}",
            path.display(),
            e
        ))
    })?;
    catalog_from_str(&contents)
}

/// Configuration for re-running a call on retryable failures and redirects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial call).
    pub max_attempts: u32,
    /// Base delay in milliseconds; doubled on each subsequent attempt.
    pub initial_backoff_ms: u64,
    /// Maximum number of redirects followed for one call.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
}

fn default_max_redirects() -> u32 {
    5
}

impl RetryConfig {
    /// Compute the backoff duration for the given 1-based `attempt` number.
    ///
    /// Uses `initial_backoff_ms * 2^(attempt - 1)` with saturating arithmetic.
    pub fn get_backoff(&self, attempt: u32) -> std::time::Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        std::time::Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_redirects: default_max_redirects(),
        }
    }
}
