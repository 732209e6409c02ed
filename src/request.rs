use std::collections::BTreeMap;

use serde_json::Value;

use crate::ClientError;

/// Where a page request sits in a listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PagePosition<'a> {
    /// First call: caller-supplied `continuation_token` and `offset` apply.
    First,
    /// Follow-up call: position is carried by the token alone.
    After(&'a str),
}

/// A named remote operation plus its options.
///
/// Selector lists (`names`, `ids`, `member_names`, ...) are sent
/// comma-joined. Empty lists are treated as if they were never set.
///
/// `limit` caps the total number of items the response yields, across all
/// pages. `page_size` caps each individual page request and is never sent on
/// its own.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    operation_id: String,
    selectors: BTreeMap<String, Vec<String>>,
    filter: Option<String>,
    sort: Option<String>,
    continuation_token: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    total_only: bool,
    params: BTreeMap<String, String>,
    page_size: Option<u32>,
    body: Option<Value>,
}

impl Request {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector("names", names)
    }

    #[must_use]
    pub fn ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector("ids", ids)
    }

    #[must_use]
    pub fn member_names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector("member_names", names)
    }

    #[must_use]
    pub fn member_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector("member_ids", ids)
    }

    #[must_use]
    pub fn policy_names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector("policy_names", names)
    }

    #[must_use]
    pub fn policy_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector("policy_ids", ids)
    }

    /// Sets any list-valued selector, e.g. `file_system_names` or `fleet_ids`.
    #[must_use]
    pub fn selector<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let key = key.into();
        if values.is_empty() {
            self.selectors.remove(&key);
        } else {
            self.selectors.insert(key, values);
        }
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Starts the listing from a token returned by an earlier response.
    #[must_use]
    pub fn continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn total_only(mut self, total_only: bool) -> Self {
        self.total_only = total_only;
        self
    }

    /// Sets a boolean query flag such as `local_only` or `current_fleet_only`.
    #[must_use]
    pub fn flag(self, name: impl Into<String>, value: bool) -> Self {
        self.param(name, value.to_string())
    }

    /// Sets a raw query parameter sent verbatim.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// JSON body for `post_*` and `patch_*` operations.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets an option from its wire name and a textual value.
    ///
    /// Used by callers that receive options as `key=value` strings. Selector
    /// keys (`names`, `ids`, anything ending in `_names` or `_ids`) take a
    /// comma-separated list; unrecognized keys become raw parameters.
    pub fn with_option(self, key: &str, raw: &str) -> Result<Self, ClientError> {
        let request = match key {
            "filter" => self.filter(raw),
            "sort" => self.sort(raw),
            "continuation_token" => self.continuation_token(raw),
            "limit" => self.limit(parse_count(key, raw)?),
            "offset" => self.offset(parse_count(key, raw)?),
            "page_size" => self.page_size(parse_count(key, raw)?),
            "total_only" => self.total_only(parse_flag(key, raw)?),
            key if is_selector_key(key) => self.selector(
                key,
                raw.split(',').map(str::trim).filter(|value| !value.is_empty()),
            ),
            key => self.param(key, raw),
        };
        Ok(request)
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Values of a selector, or `None` when it is unset.
    pub fn selector_values(&self, key: &str) -> Option<&[String]> {
        self.selectors.get(key).map(Vec::as_slice)
    }

    pub fn limit_value(&self) -> Option<u32> {
        self.limit
    }

    pub fn page_size_value(&self) -> Option<u32> {
        self.page_size
    }

    pub fn body_value(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Checks option values that are invalid for every operation.
    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.limit == Some(0) {
            return Err(ClientError::invalid_option("limit", "must be at least 1"));
        }
        if self.page_size == Some(0) {
            return Err(ClientError::invalid_option("page_size", "must be at least 1"));
        }
        for (key, values) in &self.selectors {
            if values.iter().any(|value| value.is_empty()) {
                return Err(ClientError::invalid_option(key, "contains an empty value"));
            }
        }
        Ok(())
    }

    /// Renders the query string pairs for one page.
    pub(crate) fn page_query(
        &self,
        position: PagePosition<'_>,
        page_limit: Option<u32>,
    ) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(self.selectors.len() + self.params.len() + 6);

        for (key, values) in &self.selectors {
            query.push((key.clone(), values.join(",")));
        }
        if let Some(filter) = &self.filter {
            query.push(("filter".to_owned(), filter.clone()));
        }
        if let Some(sort) = &self.sort {
            query.push(("sort".to_owned(), sort.clone()));
        }

        match position {
            PagePosition::First => {
                if let Some(token) = &self.continuation_token {
                    query.push(("continuation_token".to_owned(), token.clone()));
                }
                if let Some(offset) = self.offset {
                    query.push(("offset".to_owned(), offset.to_string()));
                }
            }
            PagePosition::After(token) => {
                query.push(("continuation_token".to_owned(), token.to_owned()));
            }
        }

        if let Some(limit) = page_limit {
            query.push(("limit".to_owned(), limit.to_string()));
        }
        if self.total_only {
            query.push(("total_only".to_owned(), "true".to_owned()));
        }
        for (key, value) in &self.params {
            query.push((key.clone(), value.clone()));
        }

        query
    }
}

fn is_selector_key(key: &str) -> bool {
    key == "names" || key == "ids" || key.ends_with("_names") || key.ends_with("_ids")
}

fn parse_count(key: &str, raw: &str) -> Result<u32, ClientError> {
    raw.trim()
        .parse()
        .map_err(|_| ClientError::invalid_option(key, format!("'{raw}' is not a count")))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ClientError> {
    match raw.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ClientError::invalid_option(
            key,
            format!("'{other}' is not a boolean"),
        )),
    }
}
