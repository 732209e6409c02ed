//! Seam between the pager and the HTTP layer.
//!
//! The pager only needs "send this call, give me the status and body back".
//! [`crate::ApiClient`] and [`crate::BlockingApiClient`] implement these
//! traits over `reqwest`; anything else that can answer a call (a recorded
//! fixture, a test double) can drive a [`crate::Pager`] just as well.

use std::future::Future;

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::ClientError;

/// One HTTP call as the pager wants it sent.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpCall {
    pub method: Method,
    /// Path relative to the client base URL, already rendered.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpCall {
    /// Returns the first value of a query parameter, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Raw answer to an [`HttpCall`].
///
/// Non-success statuses are not errors at this layer; classifying them is the
/// envelope's job.
#[derive(Clone, Debug)]
pub struct HttpReply {
    pub status: StatusCode,
    /// Value of the `x-request-id` response header.
    pub request_id: Option<String>,
    pub body: String,
}

/// Blocking transport.
pub trait Transport {
    fn execute(&self, call: &HttpCall) -> Result<HttpReply, ClientError>;
}

/// Async transport.
///
/// Futures must be `Send` so pagers can be driven from multi-threaded runtimes.
pub trait AsyncTransport: Sync {
    fn execute(
        &self,
        call: &HttpCall,
    ) -> impl Future<Output = Result<HttpReply, ClientError>> + Send;
}
