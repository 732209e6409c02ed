use std::fmt;
use std::time::Duration;

use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

use crate::ClientError;
use crate::transport::{AsyncTransport, HttpCall, HttpReply};

pub(crate) const AUTH_TOKEN_HEADER: &str = "x-auth-token";
pub(crate) const API_TOKEN_HEADER: &str = "api-token";
pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";
pub(crate) const LOGIN_PATH: &str = "/api/login";
pub(crate) const LOGOUT_PATH: &str = "/api/logout";

/// Credentials attached to every request.
#[derive(Clone)]
pub(crate) enum Credentials {
    Anonymous,
    /// OAuth2 access token, sent as `Authorization: Bearer <token>`.
    Bearer(String),
    /// Session token obtained from `/api/login`, sent as `x-auth-token`.
    Session(String),
}

impl Credentials {
    pub(crate) fn header(&self) -> Option<(&'static str, String)> {
        match self {
            Self::Anonymous => None,
            Self::Bearer(token) => Some(("authorization", format!("Bearer {token}"))),
            Self::Session(token) => Some((AUTH_TOKEN_HEADER, token.clone())),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Anonymous => "Anonymous",
            Self::Bearer(_) => "Bearer(<redacted>)",
            Self::Session(_) => "Session(<redacted>)",
        };
        f.write_str(kind)
    }
}

/// Generic async JSON REST client.
///
/// This client is transport-focused and knows nothing about the operation
/// catalog or paging. For operation-id based calls returning response
/// envelopes, use [`crate::FlashBladeClient`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: Url,
    credentials: Credentials,
    http: reqwest::Client,
}

impl ApiClient {
    /// Creates a new client with the given base URL.
    ///
    /// The URL is normalized to include a trailing slash, so relative endpoint
    /// paths join correctly.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url.as_ref())?,
            credentials: Credentials::Anonymous,
            http: reqwest::Client::new(),
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
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Base URL every request path is joined to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchanges an API token for a session token and keeps it for later requests.
    pub async fn login(mut self, api_token: &str) -> Result<Self, ClientError> {
        let url = self.build_url(LOGIN_PATH)?;
        debug!(%url, "logging in");
        let response = self
            .http
            .post(url)
            .header(API_TOKEN_HEADER, api_token)
            .send()
            .await?;
        let status = response.status();
        let session = response
            .headers()
            .get(AUTH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let payload = response.text().await?;

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
    ///
    /// Clients without a session token are dropped without a network call.
    pub async fn logout(self) -> Result<(), ClientError> {
        let Credentials::Session(token) = &self.credentials else {
            return Ok(());
        };
        let url = self.build_url(LOGOUT_PATH)?;
        debug!(%url, "logging out");
        let response = self
            .http
            .post(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await?;
        let status = response.status();
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
    /// Non-success statuses are returned as replies, not errors; only
    /// transport failures produce `Err`.
    pub async fn request_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpReply, ClientError> {
        let url = self.build_url(path)?;
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

        let response = request.send().await?;
        let status = response.status();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let payload = response.text().await?;
        debug!(%status, bytes = payload.len(), "received reply");

        Ok(HttpReply {
            status,
            request_id,
            body: payload,
        })
    }

    fn build_url(&self, path: &str) -> Result<Url, ClientError> {
        join_path(&self.base_url, path)
    }
}

impl AsyncTransport for ApiClient {
    async fn execute(&self, call: &HttpCall) -> Result<HttpReply, ClientError> {
        self.request_with_query(call.method.clone(), &call.path, &call.query, call.body.as_ref())
            .await
    }
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let parsed =
        Url::parse(base_url).map_err(|_| ClientError::InvalidBaseUrl(base_url.to_owned()))?;
    Ok(ensure_trailing_slash(parsed))
}

pub(crate) fn join_path(base_url: &Url, path: &str) -> Result<Url, ClientError> {
    let relative = path.trim_start_matches('/');
    base_url
        .join(relative)
        .map_err(|_| ClientError::InvalidPath(path.to_owned()))
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_owned();
        path.push('/');
        url.set_path(&path);
    }
    url
}
