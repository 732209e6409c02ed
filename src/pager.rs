//! Lazy item sequences spanning one or more pages.
//!
//! A [`PageCursor`] holds everything needed to ask for the next page: the
//! rendered path, the original request, the last continuation token the
//! array handed out and the remaining `limit` budget. Cursor state is only
//! committed after a page has been received and decoded, so a failed or
//! abandoned pull leaves it pointing at the last good token.

use std::collections::{HashSet, VecDeque};

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::operations::{check_selectors, find_operation, parse_method, render_path};
use crate::request::PagePosition;
use crate::response::{Outcome, PageBody, decode_reply};
use crate::transport::{AsyncTransport, HttpCall, HttpReply, Transport};
use crate::{ClientError, Request};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Position {
    Start,
    After(String),
    Done,
}

#[derive(Clone, Debug)]
pub(crate) struct PageCursor {
    operation_id: &'static str,
    method: Method,
    path: String,
    request: Request,
    paginate: bool,
    position: Position,
    remaining: Option<u32>,
    /// Tokens already handed out by the array for this listing.
    seen_tokens: HashSet<String>,
    pages: usize,
}

impl PageCursor {
    /// Resolves and validates a request without touching the network.
    pub(crate) fn prepare(api_version: &str, request: Request) -> Result<Self, ClientError> {
        let operation = find_operation(request.operation_id())?;
        request.validate()?;
        check_selectors(operation, &request)?;
        let method = parse_method(operation)?;
        let path = render_path(operation, &[("api_version", api_version)])?;

        Ok(Self {
            operation_id: operation.operation_id,
            paginate: operation.is_list(),
            method,
            path,
            remaining: request.limit_value(),
            request,
            position: Position::Start,
            seen_tokens: HashSet::new(),
            pages: 0,
        })
    }

    pub(crate) fn operation_id(&self) -> &'static str {
        self.operation_id
    }

    pub(crate) fn first_call(&self) -> HttpCall {
        self.call(PagePosition::First)
    }

    /// Call for the next page, or `None` once the listing is complete.
    pub(crate) fn next_call(&self) -> Option<HttpCall> {
        if self.remaining == Some(0) {
            return None;
        }
        match &self.position {
            Position::Start => Some(self.call(PagePosition::First)),
            Position::After(token) => Some(self.call(PagePosition::After(token))),
            Position::Done => None,
        }
    }

    fn call(&self, position: PagePosition<'_>) -> HttpCall {
        let page_limit = match (self.remaining, self.request.page_size_value()) {
            (Some(remaining), Some(page_size)) => Some(remaining.min(page_size)),
            (remaining, page_size) => remaining.or(page_size),
        };
        HttpCall {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.request.page_query(position, page_limit),
            body: self.request.body_value().cloned(),
        }
    }

    /// Decodes a follow-up reply and commits it.
    ///
    /// A remote rejection at this point cannot become a response envelope any
    /// more, so it is surfaced as [`ClientError::PageRejected`].
    pub(crate) fn commit_reply<T: DeserializeOwned>(
        &mut self,
        reply: HttpReply,
    ) -> Result<Vec<T>, ClientError> {
        match decode_reply(reply)? {
            Outcome::Page(mut page) => self.commit(&mut page.body),
            Outcome::Rejected(error) => Err(ClientError::PageRejected(Box::new(error))),
        }
    }

    /// Takes the items out of a decoded page and advances the cursor.
    pub(crate) fn commit<T: DeserializeOwned>(
        &mut self,
        body: &mut PageBody,
    ) -> Result<Vec<T>, ClientError> {
        let mut items = body
            .items
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;

        if let Some(remaining) = self.remaining {
            items.truncate(usize::try_from(remaining).unwrap_or(usize::MAX));
        }

        let next = match body.next_token() {
            Some(token) if self.paginate => {
                if self.seen_tokens.contains(token) {
                    return Err(ClientError::Protocol(format!(
                        "continuation token for '{}' did not advance",
                        self.operation_id
                    )));
                }
                Position::After(token.to_owned())
            }
            _ => Position::Done,
        };

        if let Some(remaining) = self.remaining.as_mut() {
            let taken = u32::try_from(items.len()).unwrap_or(u32::MAX);
            *remaining = remaining.saturating_sub(taken);
        }
        if let Position::After(token) = &next {
            self.seen_tokens.insert(token.clone());
        }
        self.position = next;
        self.pages += 1;
        debug!(
            operation = self.operation_id,
            page = self.pages,
            items = items.len(),
            more = self.position != Position::Done,
            "accepted page"
        );
        Ok(items)
    }
}

/// Forward-only item sequence for blocking sessions.
///
/// Yields `Result<T, ClientError>`. When a pull fails the error is yielded
/// once and the iterator then ends; [`Pager::resume`] re-arms it to retry
/// from the last page that was received successfully.
#[derive(Debug)]
pub struct Pager<'a, T, C> {
    transport: &'a C,
    cursor: PageCursor,
    buffer: VecDeque<T>,
    failed: bool,
}

impl<'a, T, C> Pager<'a, T, C> {
    pub(crate) fn new(transport: &'a C, cursor: PageCursor, first_page: Vec<T>) -> Self {
        Self {
            transport,
            cursor,
            buffer: first_page.into(),
            failed: false,
        }
    }

    /// Items already received and not yet yielded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears a previous failure so the next pull retries it.
    ///
    /// Returns whether the pager had failed.
    pub fn resume(&mut self) -> bool {
        std::mem::take(&mut self.failed)
    }
}

impl<T: DeserializeOwned, C: Transport> Iterator for Pager<'_, T, C> {
    type Item = Result<T, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.failed {
                return None;
            }
            let call = self.cursor.next_call()?;
            debug!(operation = self.cursor.operation_id(), "pulling next page");
            match self
                .transport
                .execute(&call)
                .and_then(|reply| self.cursor.commit_reply::<T>(reply))
            {
                Ok(items) => self.buffer.extend(items),
                Err(error) => {
                    warn!(operation = self.cursor.operation_id(), %error, "page pull failed");
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

/// Forward-only item sequence for async sessions.
///
/// Dropping a pending [`AsyncPager::try_next`] future (for example on a
/// timeout) leaves the cursor at the last page received, so the next call
/// asks for the same page again.
#[derive(Debug)]
pub struct AsyncPager<'a, T, C> {
    transport: &'a C,
    cursor: PageCursor,
    buffer: VecDeque<T>,
    failed: bool,
}

impl<'a, T, C> AsyncPager<'a, T, C> {
    pub(crate) fn new(transport: &'a C, cursor: PageCursor, first_page: Vec<T>) -> Self {
        Self {
            transport,
            cursor,
            buffer: first_page.into(),
            failed: false,
        }
    }

    /// Items already received and not yet yielded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears a previous failure so the next pull retries it.
    pub fn resume(&mut self) -> bool {
        std::mem::take(&mut self.failed)
    }
}

impl<T: DeserializeOwned, C: AsyncTransport> AsyncPager<'_, T, C> {
    /// Returns the next item, fetching another page when the buffer runs dry.
    ///
    /// `Ok(None)` marks the end of the sequence. After an `Err`, further calls
    /// return `Ok(None)` until [`AsyncPager::resume`] is called.
    pub async fn try_next(&mut self) -> Result<Option<T>, ClientError> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.failed {
                return Ok(None);
            }
            let Some(call) = self.cursor.next_call() else {
                return Ok(None);
            };
            debug!(operation = self.cursor.operation_id(), "pulling next page");
            let reply = self.transport.execute(&call).await;
            match reply.and_then(|reply| self.cursor.commit_reply::<T>(reply)) {
                Ok(items) => self.buffer.extend(items),
                Err(error) => {
                    warn!(operation = self.cursor.operation_id(), %error, "page pull failed");
                    self.failed = true;
                    return Err(error);
                }
            }
        }
    }

    /// Drains the whole sequence.
    pub async fn try_collect(mut self) -> Result<Vec<T>, ClientError> {
        let mut items = Vec::with_capacity(self.buffer.len());
        while let Some(item) = self.try_next().await? {
            items.push(item);
        }
        Ok(items)
    }
}
