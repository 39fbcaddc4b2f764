//! Resolved, immutable operation metadata and the invocations built on it.
//!
//! An [`Operation`] is produced once from an [`OperationSpec`] when the runtime
//! is built: validator identifiers are looked up in the registry and the path
//! template is parsed. Call time only applies these rules.

use crate::api::{BindingSpec, HeaderSpec, OperationSpec, ParamType};
use crate::error::{ApiError, Result};
use crate::traits::ParamValidator;
use crate::validation::ValidatorRegistry;
use http::Method;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TemplatePart {
    Literal(String),
    Slot(String),
}

/// A path with `{slot}` placeholders, e.g. `/hostedzone/{zoneId}/rrset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    parts: Vec<TemplatePart>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> std::result::Result<Self, String> {
        if !template.starts_with('/') {
            return Err(format!("path template '{}' must start with '/'", template));
        }
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut slot = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(format!("unterminated slot in '{}'", template));
                            }
                            Some(ch) => slot.push(ch),
                        }
                    }
                    if slot.is_empty() {
                        return Err(format!("empty slot name in '{}'", template));
                    }
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Slot(slot));
                }
                '}' => return Err(format!("unmatched '}}' in '{}'", template)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(Self { parts })
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            TemplatePart::Slot(s) => Some(s.as_str()),
            TemplatePart::Literal(_) => None,
        })
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots().any(|s| s == name)
    }

    pub(crate) fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }
}

/// A validator resolved from the registry, kept with its identifier for
/// error reporting.
#[derive(Clone)]
pub struct NamedValidator {
    pub id: String,
    pub validator: Arc<dyn ParamValidator>,
}

impl std::fmt::Debug for NamedValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NamedValidator").field(&self.id).finish()
    }
}

fn resolve_validators(
    ids: &[String],
    registry: &ValidatorRegistry,
    operation: &str,
) -> Result<Vec<NamedValidator>> {
    ids.iter()
        .map(|id| {
            registry
                .get(id)
                .map(|validator| NamedValidator {
                    id: id.clone(),
                    validator,
                })
                .ok_or_else(|| {
                    ApiError::Config(format!(
                        "Unknown validator '{}' in operation '{}'",
                        id, operation
                    ))
                })
        })
        .collect()
}

/// Binding metadata for one formal parameter.
#[derive(Debug, Clone)]
pub struct BoundParam {
    pub name: String,
    pub binding: BindingSpec,
    pub param_type: ParamType,
    pub validators: Vec<NamedValidator>,
}

/// Immutable metadata for one API method.
#[derive(Debug, Clone)]
pub struct Operation {
    name: String,
    provider: String,
    method: Method,
    template: PathTemplate,
    headers: Vec<HeaderSpec>,
    validators: Vec<NamedValidator>,
    params: Vec<BoundParam>,
}

impl Operation {
    /// Validate `spec` and resolve its validator identifiers.
    pub fn resolve(spec: &OperationSpec, registry: &ValidatorRegistry) -> Result<Self> {
        spec.validate()?;
        let method = Method::from_bytes(spec.method.as_bytes())
            .map_err(|e| ApiError::Config(format!("Invalid HTTP method: {}", e)))?;
        let template = PathTemplate::parse(&spec.path).map_err(ApiError::Config)?;
        let validators = resolve_validators(&spec.validators, registry, &spec.name)?;
        let params = spec
            .params
            .iter()
            .map(|p| -> Result<BoundParam> {
                Ok(BoundParam {
                    name: p.name.clone(),
                    binding: p.binding.clone(),
                    param_type: p.param_type,
                    validators: resolve_validators(&p.validators, registry, &spec.name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: spec.name.clone(),
            provider: spec.provider.clone(),
            method,
            template,
            headers: spec.headers.clone(),
            validators,
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn headers(&self) -> &[HeaderSpec] {
        &self.headers
    }

    /// Validators that apply to every parameter.
    pub fn validators(&self) -> &[NamedValidator] {
        &self.validators
    }

    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }
}

/// One call of an operation: the operation plus its ordered arguments.
#[derive(Debug, Clone)]
pub struct Invocation {
    operation: Arc<Operation>,
    args: Vec<Value>,
}

impl Invocation {
    /// Pair `args` with the operation's parameters. The argument count must
    /// match the parameter count exactly.
    pub fn new(operation: Arc<Operation>, args: Vec<Value>) -> Result<Self> {
        if args.len() != operation.params.len() {
            return Err(ApiError::ArgumentCount {
                operation: operation.name.clone(),
                expected: operation.params.len(),
                actual: args.len(),
            });
        }
        Ok(Self { operation, args })
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// (parameter, argument) pairs in declaration order.
    pub fn bound_args(&self) -> impl Iterator<Item = (&BoundParam, &Value)> {
        self.operation.params.iter().zip(self.args.iter())
    }
}
