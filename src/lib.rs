//! Declarative REST request binding, validation, and error classification for
//! cloud provider APIs.
//!
//! cloudbind turns a call of a declaratively described API operation into a
//! concrete HTTP request, and turns the provider's error responses back into a
//! small canonical error taxonomy while keeping the provider's own detail.
//!
//! # Key concepts
//!
//! - **[`OperationSpec`](api::OperationSpec)**: a JSON description of one API
//!   method: HTTP method, path template, and where each parameter is bound
//!   (path, header, query, or payload).
//! - **Validators**: named [`ParamValidator`](traits::ParamValidator)s attached
//!   to an operation or to single parameters, run before any request is built.
//! - **[`RequestBinder`](binder::RequestBinder)**: renders arguments into an
//!   [`HttpRequest`](message::HttpRequest).
//! - **[`ErrorClassifier`](traits::ErrorClassifier)**: per-provider parsing of
//!   error payloads into a [`CanonicalError`](error::CanonicalError).
//! - **[`ApiRuntime`](runtime::ApiRuntime)**: owns the resolved catalog, the
//!   registries, and the [`HttpTransport`](traits::HttpTransport).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use cloudbind::runtime::ApiRuntime;
//! # #[cfg(feature = "provider-route53")]
//! use cloudbind::provider::Route53ErrorHandler;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[cfg(feature = "provider-route53")]
//! # async fn example(transport: Arc<dyn cloudbind::traits::HttpTransport>) -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = ApiRuntime::builder()
//!     .endpoint(url::Url::parse("https://route53.amazonaws.com")?)
//!     .transport(transport)
//!     .register_classifier(Route53ErrorHandler::new())
//!     .catalog_from_str(r#"[{
//!         "name": "GetHostedZone",
//!         "provider": "aws/route53",
//!         "method": "GET",
//!         "path": "/2012-02-29/hostedzone/{zoneId}",
//!         "params": [ { "name": "zoneId", "binding": { "path": "zoneId" }, "validators": ["non-blank"] } ]
//!     }]"#)?
//!     .build()?;
//!
//! match runtime.invoke("GetHostedZone", vec![json!("Z1PA6795UKMFR9")]).await {
//!     Ok(response) => println!("{}", response.body_text()),
//!     Err(e) => eprintln!("{:?}: {}", e.kind(), e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod binder;
pub mod classifier;
pub mod command;
pub mod error;
pub mod invocation;
pub mod message;
pub mod pipeline;
pub mod provider;
pub mod reliability;
pub mod runtime;
pub mod traits;
pub mod transport;
pub mod validation;

#[cfg(test)]
mod mock;
