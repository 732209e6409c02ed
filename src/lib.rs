//! Rust client library for the FlashBlade REST API.
//!
//! Public API layers:
//! - [`ApiClient`]/[`BlockingApiClient`]: generic JSON HTTP clients.
//! - [`FlashBladeClient`]/[`BlockingFlashBladeClient`]: sessions that invoke
//!   catalog operations and return [`Response`] envelopes.
//! - [`Pager`]/[`AsyncPager`]: lazy item sequences spanning several pages.
//! - [`ClientError`]: unified error type used by all clients.
//!
//! The operation catalog is generated at build time from
//! `api/operations.json`.
//!
//! ```no_run
//! use flashblade_client::{BlockingFlashBladeClient, Request, Response};
//! use serde_json::Value;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BlockingFlashBladeClient::new("https://array.example.com")?
//!     .with_session_token("token");
//! match client.invoke::<Value>(Request::new("get_kmip"))? {
//!     Response::Valid(valid) => {
//!         for item in valid.into_items() {
//!             println!("{}", item?);
//!         }
//!     }
//!     Response::Error(error) => eprintln!("{error}"),
//! }
//! # Ok(())
//! # }
//! ```

mod blocking_client;
mod client;
mod error;
mod operations;
mod pager;
mod request;
mod response;
mod session;
mod transport;

/// Generic blocking JSON REST client.
pub use blocking_client::BlockingApiClient;
/// Generic async JSON REST client.
pub use client::ApiClient;
/// Error type returned by all client operations.
pub use error::ClientError;
pub use operations::{OperationDefinition, default_api_version, operations};
pub use pager::{AsyncPager, Pager};
pub use request::Request;
pub use response::{ApiError, ErrorClass, ErrorResponse, Response, ValidResponse};
/// Catalog-backed sessions.
///
/// See also [`FlashBladeClient`] for the async variant.
pub use session::{BlockingFlashBladeClient, FlashBladeClient};
pub use transport::{AsyncTransport, HttpCall, HttpReply, Transport};
