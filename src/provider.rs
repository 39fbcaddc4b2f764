//! Provider error classifiers.
//!
//! The generic status classifier is always compiled in and serves every
//! operation whose provider has no dedicated classifier. Provider-specific
//! classifiers are gated behind Cargo features.
//!
//! | Module | Feature | Provider id | Error format |
//! |--------|---------|-------------|--------------|
//! | `generic` | (always) | `generic` | JSON or plain text, kind by HTTP status |
//! | `route53` | `provider-route53` | `aws/route53` | AWS `ErrorResponse` / `InvalidChangeBatch` XML |

pub mod generic;

#[cfg(feature = "provider-route53")]
pub mod route53;

pub use generic::StatusClassifier;

#[cfg(feature = "provider-route53")]
pub use route53::Route53ErrorHandler;
