use std::env;
use std::error::Error;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;

const CATALOG_PATH: &str = "api/operations.json";

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed={CATALOG_PATH}");

    let raw = fs::read_to_string(CATALOG_PATH)?;
    let catalog: Value = serde_json::from_str(&raw)?;

    let default_api_version = catalog
        .get("default_api_version")
        .and_then(Value::as_str)
        .ok_or("catalog is missing `default_api_version`")?;
    let operations = catalog
        .get("operations")
        .and_then(Value::as_array)
        .ok_or("catalog is missing `operations`")?;

    let mut out = String::new();
    writeln!(
        out,
        "pub(crate) const DEFAULT_API_VERSION: &str = {default_api_version:?};"
    )?;
    writeln!(
        out,
        "pub(crate) const OPERATIONS: &[OperationDefinition] = &["
    )?;

    for operation in operations {
        let operation_id = string_field(operation, "operation_id")?;
        let method = string_field(operation, "method")?.to_ascii_uppercase();
        let path = string_field(operation, "path")?;
        let path_params = extract_path_params(path);
        let exclusive = exclusive_pairs(operation, operation_id)?;

        writeln!(out, "    OperationDefinition {{")?;
        writeln!(out, "        operation_id: {operation_id:?},")?;
        writeln!(out, "        method: {method:?},")?;
        writeln!(out, "        path_template: {path:?},")?;
        writeln!(out, "        path_params: &{path_params:?},")?;
        writeln!(out, "        exclusive_selectors: &[")?;
        for (first, second) in exclusive {
            writeln!(out, "            ({first:?}, {second:?}),")?;
        }
        writeln!(out, "        ],")?;
        writeln!(out, "    }},")?;
    }
    writeln!(out, "];")?;

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    fs::write(out_dir.join("operations.rs"), out)?;
    Ok(())
}

fn string_field<'a>(operation: &'a Value, field: &str) -> Result<&'a str, Box<dyn Error>> {
    operation
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("operation entry is missing string field `{field}`").into())
}

fn exclusive_pairs<'a>(
    operation: &'a Value,
    operation_id: &str,
) -> Result<Vec<(&'a str, &'a str)>, Box<dyn Error>> {
    let Some(pairs) = operation.get("exclusive_selectors").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(pairs.len());
    for pair in pairs {
        match pair.as_array().map(Vec::as_slice) {
            Some([Value::String(first), Value::String(second)]) => {
                out.push((first.as_str(), second.as_str()));
            }
            _ => {
                return Err(format!(
                    "operation `{operation_id}` has a malformed exclusive selector pair: {pair}"
                )
                .into());
            }
        }
    }
    Ok(out)
}

fn extract_path_params(path: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        params.push(after[..end].to_owned());
        rest = &after[end + 1..];
    }
    params
}
