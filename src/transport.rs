//! [`HttpTransport`](crate::traits::HttpTransport) implementations.
//!
//! The crate only needs a transport through the trait; the adapters here are
//! optional conveniences.
//!
//! | Module | Feature | Client |
//! |--------|---------|--------|
//! | `reqwest_client` | `transport-reqwest` | [reqwest](https://github.com/seanmonstar/reqwest) |

#[cfg(feature = "transport-reqwest")]
pub mod reqwest_client;

#[cfg(feature = "transport-reqwest")]
pub use reqwest_client::ReqwestTransport;
