use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ClientError;
use crate::transport::HttpReply;

/// One structured error reported by the array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    /// Name of the resource the error refers to, when the array says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_context: Option<String>,
}

/// Coarse classification of a remote failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    RateLimited,
    Server,
    Other,
}

impl ErrorClass {
    fn classify(status: StatusCode, errors: &[ApiError]) -> Self {
        match status.as_u16() {
            404 => Self::NotFound,
            403 => Self::Forbidden,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            // The array reports missing names on bulk endpoints as 400s.
            400 | 422 if errors.iter().any(ApiError::reports_missing) => Self::NotFound,
            400 | 422 => Self::Validation,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not found",
            Self::Validation => "validation failed",
            Self::Conflict => "conflict",
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate limited",
            Self::Server => "server error",
            Self::Other => "request failed",
        };
        f.write_str(label)
    }
}

impl ApiError {
    fn reports_missing(&self) -> bool {
        let message = self.message.to_ascii_lowercase();
        message.contains("does not exist")
            || message.contains("not found")
            || message.contains("no such")
    }
}

/// Failure envelope: the call reached the array and was refused.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    status: StatusCode,
    class: ErrorClass,
    request_id: Option<String>,
    errors: Vec<ApiError>,
}

impl ErrorResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn is_not_found(&self) -> bool {
        self.class == ErrorClass::NotFound
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Errors in the order the array reported them. Never empty.
    pub fn errors(&self) -> &[ApiError] {
        &self.errors
    }

    fn from_reply(reply: HttpReply) -> Self {
        let errors = parse_errors(reply.status, &reply.body);
        Self {
            status: reply.status,
            class: ErrorClass::classify(reply.status, &errors),
            request_id: reply.request_id,
            errors,
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.class, self.status)?;
        for error in &self.errors {
            match &error.context {
                Some(context) => write!(f, "; {context}: {}", error.message)?,
                None => write!(f, "; {}", error.message)?,
            }
        }
        Ok(())
    }
}

/// Success envelope.
///
/// `P` is the item sequence: a [`crate::Pager`] for blocking sessions or a
/// [`crate::AsyncPager`] for async ones. The metadata fields describe the
/// first page only.
#[derive(Debug)]
pub struct ValidResponse<P> {
    status: StatusCode,
    request_id: Option<String>,
    continuation_token: Option<String>,
    total_item_count: Option<u64>,
    more_items_remaining: Option<bool>,
    total: Vec<Value>,
    items: P,
}

impl<P> ValidResponse<P> {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation_token.as_deref()
    }

    /// Number of items matching the query, when the array reported it.
    pub fn total_item_count(&self) -> Option<u64> {
        self.total_item_count
    }

    pub fn more_items_remaining(&self) -> Option<bool> {
        self.more_items_remaining
    }

    /// Aggregate rows returned alongside the items.
    pub fn total(&self) -> &[Value] {
        &self.total
    }

    pub fn items(&mut self) -> &mut P {
        &mut self.items
    }

    pub fn into_items(self) -> P {
        self.items
    }

    pub(crate) fn from_first_page(page: &Page, items: P) -> Self {
        Self {
            status: page.status,
            request_id: page.request_id.clone(),
            continuation_token: page.body.continuation_token.clone(),
            total_item_count: page.body.total_item_count,
            more_items_remaining: page.body.more_items_remaining,
            total: page.body.total.clone().unwrap_or_default(),
            items,
        }
    }
}

/// Result of a remote operation that reached the array.
#[derive(Debug)]
pub enum Response<P> {
    Valid(ValidResponse<P>),
    Error(ErrorResponse),
}

impl<P> Response<P> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Valid(valid) => valid.status(),
            Self::Error(error) => error.status(),
        }
    }

    pub fn into_result(self) -> Result<ValidResponse<P>, ErrorResponse> {
        match self {
            Self::Valid(valid) => Ok(valid),
            Self::Error(error) => Err(error),
        }
    }
}

/// Wire shape of a successful page.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct PageBody {
    #[serde(default)]
    pub(crate) items: Option<Vec<Value>>,
    #[serde(default)]
    pub(crate) continuation_token: Option<String>,
    #[serde(default)]
    pub(crate) total_item_count: Option<u64>,
    #[serde(default)]
    pub(crate) more_items_remaining: Option<bool>,
    #[serde(default)]
    pub(crate) total: Option<Vec<Value>>,
}

impl PageBody {
    /// Token for the next page, if the array says there is one.
    pub(crate) fn next_token(&self) -> Option<&str> {
        if self.more_items_remaining == Some(false) {
            return None;
        }
        self.continuation_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Page {
    pub(crate) status: StatusCode,
    pub(crate) request_id: Option<String>,
    pub(crate) body: PageBody,
}

#[derive(Debug)]
pub(crate) enum Outcome {
    Page(Page),
    Rejected(ErrorResponse),
}

/// Sorts a raw reply into a page, a remote rejection, or a fatal error.
pub(crate) fn decode_reply(reply: HttpReply) -> Result<Outcome, ClientError> {
    if reply.status == StatusCode::UNAUTHORIZED {
        let errors = parse_errors(reply.status, &reply.body);
        let message = errors
            .into_iter()
            .map(|error| error.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ClientError::Authentication(message));
    }

    if !reply.status.is_success() {
        return Ok(Outcome::Rejected(ErrorResponse::from_reply(reply)));
    }

    let body = if reply.body.trim().is_empty() {
        PageBody::default()
    } else {
        serde_json::from_str(&reply.body)?
    };

    Ok(Outcome::Page(Page {
        status: reply.status,
        request_id: reply.request_id,
        body,
    }))
}

#[derive(Deserialize)]
struct ErrorBody {
    errors: Vec<ApiError>,
}

fn parse_errors(status: StatusCode, body: &str) -> Vec<ApiError> {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && !parsed.errors.is_empty()
    {
        return parsed.errors;
    }

    let trimmed = body.trim();
    let message = if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned()
    } else {
        trimmed.to_owned()
    };
    vec![ApiError {
        message,
        context: None,
        location_context: None,
    }]
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{ErrorClass, Outcome, decode_reply};
    use crate::ClientError;
    use crate::transport::HttpReply;

    fn reply(status: u16, body: &str) -> HttpReply {
        HttpReply {
            status: StatusCode::from_u16(status).expect("valid status"),
            request_id: Some("req-1".to_owned()),
            body: body.to_owned(),
        }
    }

    fn rejected(status: u16, body: &str) -> super::ErrorResponse {
        match decode_reply(reply(status, body)).expect("not fatal") {
            Outcome::Rejected(error) => error,
            Outcome::Page(page) => panic!("expected rejection, got {page:?}"),
        }
    }

    #[test]
    fn missing_name_on_bad_request_is_not_found() {
        let error = rejected(
            400,
            r#"{"errors":[{"message":"Virtual host does not exist.","context":"s3.myhost.com"}]}"#,
        );
        assert_eq!(error.class(), ErrorClass::NotFound);
        assert_eq!(error.errors()[0].context.as_deref(), Some("s3.myhost.com"));
        assert_eq!(error.request_id(), Some("req-1"));
    }

    #[test]
    fn other_bad_requests_are_validation_failures() {
        let error = rejected(400, r#"{"errors":[{"message":"Invalid filter."}]}"#);
        assert_eq!(error.class(), ErrorClass::Validation);
        assert_eq!(error.to_string(), "validation failed (400 Bad Request); Invalid filter.");
    }

    #[test]
    fn unstructured_error_body_is_kept_as_message() {
        let error = rejected(503, "<html>maintenance</html>");
        assert_eq!(error.class(), ErrorClass::Server);
        assert_eq!(error.errors()[0].message, "<html>maintenance</html>");

        let error = rejected(409, "");
        assert_eq!(error.class(), ErrorClass::Conflict);
        assert_eq!(error.errors()[0].message, "Conflict");
    }

    #[test]
    fn unauthorized_is_fatal() {
        let error = decode_reply(reply(401, r#"{"errors":[{"message":"Bad token."}]}"#))
            .expect_err("401 is fatal");
        assert!(matches!(error, ClientError::Authentication(message) if message == "Bad token."));
    }

    #[test]
    fn empty_success_body_is_an_empty_page() {
        let Outcome::Page(page) = decode_reply(reply(200, "")).expect("decodes") else {
            panic!("expected a page");
        };
        assert!(page.body.items.is_none());
        assert_eq!(page.body.next_token(), None);
    }

    #[test]
    fn exhausted_listing_has_no_next_token() {
        let Outcome::Page(page) = decode_reply(reply(
            200,
            r#"{"items":[],"continuation_token":"t1","more_items_remaining":false}"#,
        ))
        .expect("decodes") else {
            panic!("expected a page");
        };
        assert_eq!(page.body.next_token(), None);
    }

    #[test]
    fn malformed_success_body_is_fatal() {
        let error = decode_reply(reply(200, "not json")).expect_err("malformed body");
        assert!(matches!(error, ClientError::Json(_)));
    }
}
