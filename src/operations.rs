use reqwest::Method;
use url::form_urlencoded::byte_serialize;

use crate::{ClientError, Request};

/// Metadata for one remote operation.
///
/// Values are generated from `api/operations.json` at build time.
#[derive(Clone, Copy, Debug)]
pub struct OperationDefinition {
    /// Operation identifier, e.g. `get_kmip` or `delete_active_directory`.
    pub operation_id: &'static str,
    /// Uppercase HTTP method (for example `GET`, `DELETE`).
    pub method: &'static str,
    /// Path template, potentially containing `{param}` placeholders.
    pub path_template: &'static str,
    /// Required path parameter names extracted from `path_template`.
    pub path_params: &'static [&'static str],
    /// Selector pairs that may not both be supplied in one call.
    pub exclusive_selectors: &'static [(&'static str, &'static str)],
}

impl OperationDefinition {
    /// Whether the operation lists resources and may span several pages.
    pub fn is_list(&self) -> bool {
        self.method == "GET"
    }
}

// Generated file contract (`$OUT_DIR/operations.rs`):
// 1. `DEFAULT_API_VERSION: &str`
//    - REST API version used when a client does not pick one.
// 2. `OPERATIONS: &[OperationDefinition]`
//    - One entry per catalog operation with:
//      - `operation_id`
//      - `method` (uppercase)
//      - `path_template`
//      - `path_params`
//      - `exclusive_selectors`
//
// This contract is produced by `build.rs` and consumed by this module via `include!`.
include!(concat!(env!("OUT_DIR"), "/operations.rs"));

/// Returns every operation in the catalog.
pub fn operations() -> &'static [OperationDefinition] {
    OPERATIONS
}

/// Returns the REST API version clients use unless told otherwise.
pub fn default_api_version() -> &'static str {
    DEFAULT_API_VERSION
}

pub(crate) fn find_operation(operation_id: &str) -> Result<&'static OperationDefinition, ClientError> {
    OPERATIONS
        .iter()
        .find(|op| op.operation_id == operation_id)
        .ok_or_else(|| ClientError::UnknownOperation(operation_id.to_owned()))
}

pub(crate) fn parse_method(operation: &OperationDefinition) -> Result<Method, ClientError> {
    Method::from_bytes(operation.method.as_bytes())
        .map_err(|_| ClientError::UnknownOperation(operation.operation_id.to_owned()))
}

pub(crate) fn render_path(
    operation: &OperationDefinition,
    path_params: &[(&str, &str)],
) -> Result<String, ClientError> {
    let mut rendered = operation.path_template.to_owned();

    for required_param in operation.path_params {
        let value = path_params
            .iter()
            .find(|(name, _)| name == required_param)
            .map(|(_, value)| *value)
            .ok_or_else(|| ClientError::MissingPathParameter {
                operation_id: operation.operation_id.to_owned(),
                parameter: (*required_param).to_owned(),
            })?;

        let placeholder = format!("{{{required_param}}}");
        rendered = rendered.replace(&placeholder, &encode_path_segment(value));
    }

    Ok(rendered)
}

/// Rejects requests that supply both halves of a declared exclusive pair.
pub(crate) fn check_selectors(
    operation: &OperationDefinition,
    request: &Request,
) -> Result<(), ClientError> {
    for (first, second) in operation.exclusive_selectors {
        if request.selector_values(first).is_some() && request.selector_values(second).is_some() {
            return Err(ClientError::ConflictingSelectors {
                operation_id: operation.operation_id.to_owned(),
                first: (*first).to_owned(),
                second: (*second).to_owned(),
            });
        }
    }
    Ok(())
}

fn encode_path_segment(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}
