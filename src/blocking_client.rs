use std::time::Duration;

use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

use crate::ClientError;
use crate::client::{
    API_TOKEN_HEADER, AUTH_TOKEN_HEADER, Credentials, LOGIN_PATH, LOGOUT_PATH, REQUEST_ID_HEADER,
    join_path, parse_base_url,
};
use crate::transport::{HttpCall, HttpReply, Transport};

/// Generic blocking JSON REST client.
///
/// This is the synchronous counterpart of [`crate::ApiClient`].
#[derive(Debug)]
pub struct BlockingApiClient {
    base_url: Url,
    credentials: Credentials,
    http: reqwest::blocking::Client,
}

impl BlockingApiClient {
    /// Creates a new client with the given base URL.
    ///
    /// The URL is normalized to include a trailing slash, so relative endpoint
    /// paths join correctly.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url.as_ref())?,
            credentials: Credentials::Anonymous,
            http: reqwest::blocking::Client::new(),
        })
    }

    /// Returns a new client sending `Authorization: Bearer <token>` on all requests.
    #[must_use]
    pub fn with_authorization_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Credentials::Bearer(token.into());
        self
    }

    /// Returns a new client sending an existing session token as `x-auth-token`.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Credentials::Session(token.into());
        self
    }

    /// Returns a new client whose requests time out after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(self)
    }

    /// Base URL every request path is joined to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchanges an API token for a session token and keeps it for later requests.
    pub fn login(mut self, api_token: &str) -> Result<Self, ClientError> {
        let url = join_path(&self.base_url, LOGIN_PATH)?;
        debug!(%url, "logging in");
        let response = self
            .http
            .post(url)
            .header(API_TOKEN_HEADER, api_token)
            .send()?;
        let status = response.status();
        let session = response
            .headers()
            .get(AUTH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let payload = response.text()?;

        if !status.is_success() {
            return Err(ClientError::Authentication(format!(
                "login returned status {status}: {payload}"
            )));
        }
        let session = session.ok_or_else(|| {
            ClientError::Authentication("login response carried no session token".to_owned())
        })?;

        self.credentials = Credentials::Session(session);
        Ok(self)
    }

    /// Ends the session started by [`Self::login`] and consumes the client.
    pub fn logout(self) -> Result<(), ClientError> {
        let Credentials::Session(token) = &self.credentials else {
            return Ok(());
        };
        let url = join_path(&self.base_url, LOGOUT_PATH)?;
        debug!(%url, "logging out");
        let status = self
            .http
            .post(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()?
            .status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::Protocol(format!(
                "logout returned status {status}"
            )))
        }
    }

    /// Sends a request with query parameters and returns the raw reply.
    ///
    /// Non-success statuses are returned as replies, not errors.
    pub fn request_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpReply, ClientError> {
        let url = join_path(&self.base_url, path)?;
        debug!(%method, %url, params = query.len(), "sending request");
        let mut request = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some((name, value)) = self.credentials.header() {
            request = request.header(name, value);
        }

        if let Some(json_body) = body {
            request = request.json(json_body);
        }

        let response = request.send()?;
        let status = response.status();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let payload = response.text()?;
        debug!(%status, bytes = payload.len(), "received reply");

        Ok(HttpReply {
            status,
            request_id,
            body: payload,
        })
    }
}

impl Transport for BlockingApiClient {
    fn execute(&self, call: &HttpCall) -> Result<HttpReply, ClientError> {
        self.request_with_query(call.method.clone(), &call.path, &call.query, call.body.as_ref())
    }
}
