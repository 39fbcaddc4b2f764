//! The runtime that owns the operation catalog, registries, and transport.

use crate::api::{OperationSpec, RetryConfig};
use crate::binder::RequestBinder;
use crate::classifier::ClassifierRegistry;
use crate::command::Command;
use crate::error::{ApiError, Result};
use crate::invocation::{Invocation, Operation};
use crate::message::{HttpRequest, HttpResponse};
use crate::pipeline::InvocationPipeline;
use crate::reliability::execute_with_retry;
use crate::traits::{ErrorClassifier, HttpTransport, ParamValidator};
use crate::validation::ValidatorRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Resolved operations bound to one endpoint and transport.
///
/// Obtain an instance via [`ApiRuntime::builder()`]. All tables are built
/// once and read without locking, so a runtime can be shared across tasks
/// behind its `Arc`.
pub struct ApiRuntime {
    operations: HashMap<String, Arc<Operation>>,
    pipeline: InvocationPipeline,
    retry: RetryConfig,
}

impl ApiRuntime {
    pub fn builder() -> ApiRuntimeBuilder {
        ApiRuntimeBuilder::default()
    }

    pub fn operation(&self, name: &str) -> Result<Arc<Operation>> {
        self.operations
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::UnknownOperation(name.to_string()))
    }

    pub fn contains_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Operation names in sorted order.
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn pipeline(&self) -> &InvocationPipeline {
        &self.pipeline
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Create a fresh [`Command`] for one call of `name`.
    pub fn command(&self, name: &str, args: Vec<Value>) -> Result<Command> {
        let invocation = Invocation::new(self.operation(name)?, args)?;
        Ok(Command::new(invocation))
    }

    /// Validate and bind a call without sending it.
    pub fn bind(&self, name: &str, args: Vec<Value>) -> Result<HttpRequest> {
        let invocation = Invocation::new(self.operation(name)?, args)?;
        crate::validation::validate_invocation(&invocation)?;
        self.pipeline.binder().bind(&invocation)
    }

    /// Send one attempt of `name`. No retries and no redirects.
    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<HttpResponse> {
        let mut command = self.command(name, args)?;
        self.pipeline.execute(&mut command).await
    }

    /// Send `name` under the runtime's [`RetryConfig`].
    pub async fn invoke_with_retry(&self, name: &str, args: Vec<Value>) -> Result<HttpResponse> {
        let mut command = self.command(name, args)?;
        execute_with_retry(&self.pipeline, &mut command, &self.retry).await
    }
}

/// Builder for [`ApiRuntime`].
///
/// ```rust,no_run
/// # use cloudbind::runtime::ApiRuntime;
/// # use std::sync::Arc;
/// # fn example(transport: Arc<dyn cloudbind::traits::HttpTransport>) -> cloudbind::error::Result<()> {
/// let runtime = ApiRuntime::builder()
///     .endpoint(url::Url::parse("https://route53.amazonaws.com").unwrap())
///     .transport(transport)
///     .catalog_from_file("route53.json")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ApiRuntimeBuilder {
    endpoint: Option<Url>,
    transport: Option<Arc<dyn HttpTransport>>,
    classifiers: ClassifierRegistry,
    validators: ValidatorRegistry,
    catalog: Vec<OperationSpec>,
    retry: RetryConfig,
}

impl Default for ApiRuntimeBuilder {
    fn default() -> Self {
        Self {
            endpoint: None,
            transport: None,
            classifiers: ClassifierRegistry::new(),
            validators: ValidatorRegistry::with_builtins(),
            catalog: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl ApiRuntimeBuilder {
    /// Base URL that operation path templates are appended to.
    pub fn endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register an error classifier. Its
    /// [`provider_id`](crate::traits::ErrorClassifier::provider_id) is the
    /// lookup key; a second classifier with the same id replaces the first.
    pub fn register_classifier<C: ErrorClassifier + 'static>(mut self, classifier: C) -> Self {
        self.classifiers.register(classifier);
        self
    }

    /// Replace the validator registry. The default holds the built-ins.
    pub fn validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    pub fn register_validator<V: ParamValidator + 'static>(
        mut self,
        id: impl Into<String>,
        validator: V,
    ) -> Self {
        self.validators.register(id, validator);
        self
    }

    pub fn catalog(mut self, catalog: Vec<OperationSpec>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Load catalog from a JSON string (array of operation specs).
    pub fn catalog_from_str(mut self, s: &str) -> Result<Self> {
        self.catalog = crate::api::catalog_from_str(s)?;
        Ok(self)
    }

    /// Load catalog from a JSON file (array of operation specs).
    pub fn catalog_from_file(mut self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        self.catalog = crate::api::catalog_from_file(path)?;
        Ok(self)
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve every operation and return the constructed [`ApiRuntime`].
    ///
    /// Fails with [`ApiError::Config`] when the endpoint or transport is
    /// missing, an operation is invalid or duplicated, names an unknown
    /// validator, or names a provider with no registered classifier.
    pub fn build(self) -> Result<Arc<ApiRuntime>> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| ApiError::Config("No endpoint configured".to_string()))?;
        let transport = self
            .transport
            .ok_or_else(|| ApiError::Config("No transport configured".to_string()))?;

        let mut operations = HashMap::new();
        for spec in &self.catalog {
            if !self.classifiers.contains(&spec.provider) {
                return Err(ApiError::Config(format!(
                    "Unknown provider '{}' for operation '{}'",
                    spec.provider, spec.name
                )));
            }
            let operation = Operation::resolve(spec, &self.validators)?;
            if operations
                .insert(spec.name.clone(), Arc::new(operation))
                .is_some()
            {
                return Err(ApiError::Config(format!(
                    "Duplicate operation '{}' in catalog",
                    spec.name
                )));
            }
        }

        tracing::info!(
            endpoint = %endpoint,
            operations = operations.len(),
            "API runtime built"
        );

        let pipeline = InvocationPipeline::new(
            RequestBinder::new(endpoint)?,
            transport,
            Arc::new(self.classifiers),
        );
        Ok(Arc::new(ApiRuntime {
            operations,
            pipeline,
            retry: self.retry,
        }))
    }
}
