use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::operations::{DEFAULT_API_VERSION, OperationDefinition};
use crate::pager::PageCursor;
use crate::response::{Outcome, ValidResponse, decode_reply};
use crate::transport::{AsyncTransport, Transport};
use crate::{ApiClient, AsyncPager, BlockingApiClient, ClientError, Pager, Request, Response};

/// Async FlashBlade session backed by the operation catalog.
///
/// Every [`Response`] borrows the session it came from, so the session must
/// outlive the item sequences read through it.
#[derive(Clone, Debug)]
pub struct FlashBladeClient<C = ApiClient> {
    transport: C,
    api_version: String,
}

impl FlashBladeClient<ApiClient> {
    /// Creates a client with an explicit base URL, e.g. `https://array.example.com`.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self::from_transport(ApiClient::new(base_url)?))
    }

    /// Returns a new client sending `Authorization: Bearer <token>` on all requests.
    #[must_use]
    pub fn with_authorization_token(mut self, token: impl Into<String>) -> Self {
        self.transport = self.transport.with_authorization_token(token);
        self
    }

    /// Returns a new client reusing an existing `x-auth-token` session.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.transport = self.transport.with_session_token(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.transport = self.transport.with_timeout(timeout)?;
        Ok(self)
    }

    /// Opens a session with an API token.
    pub async fn login(mut self, api_token: &str) -> Result<Self, ClientError> {
        self.transport = self.transport.login(api_token).await?;
        Ok(self)
    }

    /// Closes the session and consumes the client.
    pub async fn logout(self) -> Result<(), ClientError> {
        self.transport.logout().await
    }

    /// Returns all operations in the catalog.
    pub fn operations() -> &'static [OperationDefinition] {
        crate::operations()
    }
}

impl<C: AsyncTransport> FlashBladeClient<C> {
    /// Wraps any transport, e.g. a recorded fixture.
    pub fn from_transport(transport: C) -> Self {
        Self {
            transport,
            api_version: DEFAULT_API_VERSION.to_owned(),
        }
    }

    /// Returns a new client targeting another REST API version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn transport(&self) -> &C {
        &self.transport
    }

    /// Calls an operation and wraps the outcome in a response envelope.
    ///
    /// Only the first page is fetched here; further pages are pulled as the
    /// returned [`AsyncPager`] is consumed. Remote failures come back as
    /// [`Response::Error`]; `Err` means the request was invalid locally or
    /// the array could not be reached.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        request: Request,
    ) -> Result<Response<AsyncPager<'_, T, C>>, ClientError> {
        let mut cursor = PageCursor::prepare(&self.api_version, request)?;
        debug!(operation = cursor.operation_id(), "invoking operation");
        let reply = self.transport.execute(&cursor.first_call()).await?;

        match decode_reply(reply)? {
            Outcome::Rejected(error) => Ok(Response::Error(error)),
            Outcome::Page(mut page) => {
                let items = cursor.commit::<T>(&mut page.body)?;
                let pager = AsyncPager::new(&self.transport, cursor, items);
                Ok(Response::Valid(ValidResponse::from_first_page(&page, pager)))
            }
        }
    }
}

/// Blocking FlashBlade session backed by the operation catalog.
///
/// This is the synchronous counterpart of [`FlashBladeClient`].
#[derive(Debug)]
pub struct BlockingFlashBladeClient<C = BlockingApiClient> {
    transport: C,
    api_version: String,
}

impl BlockingFlashBladeClient<BlockingApiClient> {
    /// Creates a client with an explicit base URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self::from_transport(BlockingApiClient::new(base_url)?))
    }

    /// Returns a new client sending `Authorization: Bearer <token>` on all requests.
    #[must_use]
    pub fn with_authorization_token(mut self, token: impl Into<String>) -> Self {
        self.transport = self.transport.with_authorization_token(token);
        self
    }

    /// Returns a new client reusing an existing `x-auth-token` session.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.transport = self.transport.with_session_token(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.transport = self.transport.with_timeout(timeout)?;
        Ok(self)
    }

    /// Opens a session with an API token.
    pub fn login(mut self, api_token: &str) -> Result<Self, ClientError> {
        self.transport = self.transport.login(api_token)?;
        Ok(self)
    }

    /// Closes the session and consumes the client.
    pub fn logout(self) -> Result<(), ClientError> {
        self.transport.logout()
    }

    /// Returns all operations in the catalog.
    pub fn operations() -> &'static [OperationDefinition] {
        crate::operations()
    }
}

impl<C: Transport> BlockingFlashBladeClient<C> {
    /// Wraps any transport, e.g. a recorded fixture.
    pub fn from_transport(transport: C) -> Self {
        Self {
            transport,
            api_version: DEFAULT_API_VERSION.to_owned(),
        }
    }

    /// Returns a new client targeting another REST API version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn transport(&self) -> &C {
        &self.transport
    }

    /// Calls an operation and wraps the outcome in a response envelope.
    ///
    /// See [`FlashBladeClient::invoke`].
    pub fn invoke<T: DeserializeOwned>(
        &self,
        request: Request,
    ) -> Result<Response<Pager<'_, T, C>>, ClientError> {
        let mut cursor = PageCursor::prepare(&self.api_version, request)?;
        debug!(operation = cursor.operation_id(), "invoking operation");
        let reply = self.transport.execute(&cursor.first_call())?;

        match decode_reply(reply)? {
            Outcome::Rejected(error) => Ok(Response::Error(error)),
            Outcome::Page(mut page) => {
                let items = cursor.commit::<T>(&mut page.body)?;
                let pager = Pager::new(&self.transport, cursor, items);
                Ok(Response::Valid(ValidResponse::from_first_page(&page, pager)))
            }
        }
    }
}
