//! Parameter validator chain and the registry of named validators.
//!
//! For each parameter, in declaration order, operation-level validators run
//! first and then the parameter's own validators, each in declaration order.
//! The chain stops at the first failure.

use crate::error::{ApiError, Result};
use crate::invocation::Invocation;
use crate::traits::ParamValidator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Why a validator did not accept a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The value has the right type but violates the predicate.
    Rejected(String),
    /// The validator does not accept values of this type at all.
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl ValidationFailure {
    fn into_api_error(self, parameter: &str, validator: &str) -> ApiError {
        match self {
            Self::Rejected(reason) => ApiError::InvalidArgument {
                parameter: parameter.to_string(),
                validator: validator.to_string(),
                reason,
            },
            Self::TypeMismatch { expected, found } => ApiError::TypeMismatch {
                parameter: parameter.to_string(),
                validator: validator.to_string(),
                expected,
                found,
            },
        }
    }
}

/// JSON type name used in type-mismatch reports.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_string(value: &Value) -> std::result::Result<Option<&str>, ValidationFailure> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(ValidationFailure::TypeMismatch {
            expected: "string",
            found: type_name(other),
        }),
    }
}

impl<F> ParamValidator for F
where
    F: Fn(&Value) -> std::result::Result<(), ValidationFailure> + Send + Sync,
{
    fn validate(&self, value: &Value) -> std::result::Result<(), ValidationFailure> {
        self(value)
    }
}

/// Rejects strings containing uppercase characters.
pub struct AllLowerCase;

impl ParamValidator for AllLowerCase {
    fn validate(&self, value: &Value) -> std::result::Result<(), ValidationFailure> {
        match expect_string(value)? {
            Some(s) if s.chars().any(char::is_uppercase) => Err(ValidationFailure::Rejected(
                format!("'{}' must be all lowercase", s),
            )),
            _ => Ok(()),
        }
    }
}

/// Rejects null. The only built-in that cares about presence.
pub struct Required;

impl ParamValidator for Required {
    fn validate(&self, value: &Value) -> std::result::Result<(), ValidationFailure> {
        if value.is_null() {
            return Err(ValidationFailure::Rejected("a value is required".to_string()));
        }
        Ok(())
    }
}

/// Rejects empty or whitespace-only strings.
pub struct NonBlank;

impl ParamValidator for NonBlank {
    fn validate(&self, value: &Value) -> std::result::Result<(), ValidationFailure> {
        match expect_string(value)? {
            Some(s) if s.trim().is_empty() => {
                Err(ValidationFailure::Rejected("must not be blank".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Accepts DNS-compatible names: 3 to 63 characters of lowercase letters,
/// digits, `-` and `.`, starting with a letter or digit.
pub struct DnsName;

impl DnsName {
    const MIN_LEN: usize = 3;
    const MAX_LEN: usize = 63;
}

impl ParamValidator for DnsName {
    fn validate(&self, value: &Value) -> std::result::Result<(), ValidationFailure> {
        let Some(name) = expect_string(value)? else {
            return Ok(());
        };
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&name.len()) {
            return Err(ValidationFailure::Rejected(format!(
                "'{}' must be between {} and {} characters",
                name,
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }
        if !name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ValidationFailure::Rejected(format!(
                "'{}' must start with a lowercase letter or digit",
                name
            )));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.')))
        {
            return Err(ValidationFailure::Rejected(format!(
                "'{}' contains invalid character '{}'",
                name, bad
            )));
        }
        Ok(())
    }
}

/// Rejects integers below zero.
pub struct NonNegative;

impl ParamValidator for NonNegative {
    fn validate(&self, value: &Value) -> std::result::Result<(), ValidationFailure> {
        match value {
            Value::Null => Ok(()),
            Value::Number(n) if n.is_u64() => Ok(()),
            Value::Number(n) if n.is_i64() => Err(ValidationFailure::Rejected(format!(
                "{} must not be negative",
                n
            ))),
            other => Err(ValidationFailure::TypeMismatch {
                expected: "integer",
                found: type_name(other),
            }),
        }
    }
}

/// Identifier → validator table. Resolved when operations are built; never
/// consulted at call time.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn ParamValidator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with `all-lowercase`, `required`, `non-blank`,
    /// `dns-name`, and `non-negative`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("all-lowercase", AllLowerCase);
        registry.register("required", Required);
        registry.register("non-blank", NonBlank);
        registry.register("dns-name", DnsName);
        registry.register("non-negative", NonNegative);
        registry
    }

    /// Register a validator under `id`, replacing any previous one.
    pub fn register<V: ParamValidator + 'static>(&mut self, id: impl Into<String>, validator: V) {
        self.validators.insert(id.into(), Arc::new(validator));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ParamValidator>> {
        self.validators.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.validators.contains_key(id)
    }
}

/// Run every applicable validator against every argument of `invocation`.
pub fn validate_invocation(invocation: &Invocation) -> Result<()> {
    let operation = invocation.operation();
    for (param, value) in invocation.bound_args() {
        for named in operation.validators().iter().chain(param.validators.iter()) {
            if let Err(failure) = named.validator.validate(value) {
                tracing::debug!(
                    operation = %operation.name(),
                    parameter = %param.name,
                    validator = %named.id,
                    "Argument failed validation"
                );
                return Err(failure.into_api_error(&param.name, &named.id));
            }
        }
    }
    Ok(())
}
