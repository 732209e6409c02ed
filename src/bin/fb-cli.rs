use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use flashblade_client::{ApiClient, FlashBladeClient, Request, Response, default_api_version};
use reqwest::Method;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "fb-cli",
    version,
    about = "Small async CLI for querying the FlashBlade REST API"
)]
struct Cli {
    /// Base URL of the array management endpoint.
    #[arg(long, env = "FB_BASE_URL")]
    base_url: Option<String>,

    /// API token exchanged for a session at startup.
    #[arg(long, env = "FB_API_TOKEN", conflicts_with = "session_token")]
    api_token: Option<String>,

    /// Existing session token sent as `x-auth-token`.
    #[arg(long, env = "FB_SESSION_TOKEN")]
    session_token: Option<String>,

    /// REST API version. Defaults to the catalog's version.
    #[arg(long, env = "FB_API_VERSION")]
    api_version: Option<String>,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,

    /// Log requests and page pulls to stderr. `RUST_LOG` overrides the filter.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List catalog operation ids.
    Operations {
        /// Filter operations by substring match on operation id.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Invoke a catalog operation and print its items.
    Call(CallArgs),
    /// Send a raw HTTP request using method + path.
    Request(RequestArgs),
}

#[derive(Debug, Args)]
struct CallArgs {
    /// Operation id (for example: get_kmip).
    operation_id: String,

    /// Request option in form key=value, e.g. names=a,b or limit=10. Repeat as needed.
    #[arg(long = "option", short = 'o', value_name = "KEY=VALUE")]
    option: Vec<String>,

    #[command(flatten)]
    body: BodyInput,
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// HTTP method (GET, POST, PATCH, DELETE, ...).
    method: String,

    /// Request path (for example: /api/2.12/arrays).
    path: String,

    /// Query parameter in form key=value. Repeat as needed.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,

    #[command(flatten)]
    body: BodyInput,
}

#[derive(Debug, Args)]
struct BodyInput {
    /// JSON request body literal.
    #[arg(long, conflicts_with = "body_file")]
    body_json: Option<String>,

    /// Path to a file containing a JSON request body.
    #[arg(long, value_name = "PATH", conflicts_with = "body_json")]
    body_file: Option<PathBuf>,
}

/// Entry point for the async CLI.
///
/// Parses command-line arguments, opens a session, dispatches subcommands,
/// and prints JSON output.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // `operations` is metadata-only; it does not require constructing an HTTP client.
    if let Command::Operations { filter } = &cli.command {
        print_operations(filter.as_deref());
        return Ok(());
    }

    let Some(base_url) = &cli.base_url else {
        bail!("--base-url (or FB_BASE_URL) is required for this command");
    };
    let mut client = FlashBladeClient::new(base_url)
        .with_context(|| format!("failed to create client with base URL '{base_url}'"))?;
    if let Some(version) = &cli.api_version {
        client = client.with_api_version(version.clone());
    }
    if let Some(token) = &cli.session_token {
        client = client.with_session_token(token.clone());
    }
    let logged_in = cli.api_token.is_some();
    if let Some(token) = &cli.api_token {
        client = client.login(token).await.context("login failed")?;
    }

    let outcome = match &cli.command {
        Command::Operations { .. } => unreachable!("handled above"),
        Command::Call(args) => call_operation(&client, args)
            .await
            .with_context(|| format!("operation call failed: '{}'", args.operation_id)),
        Command::Request(args) => send_request(client.transport(), args)
            .await
            .with_context(|| format!("request failed: {} {}", args.method, args.path)),
    };

    // Sessions opened here are closed here, even when the command failed.
    if logged_in {
        client.logout().await.context("logout failed")?;
    }

    print_json(&outcome?, cli.compact).context("failed to print JSON output")?;
    Ok(())
}

/// Installs a stderr subscriber when `--verbose` or `RUST_LOG` asks for one.
fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    if let Some(filter) = log_filter(verbose, rust_log.as_deref()) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// `RUST_LOG` takes precedence; `--verbose` alone logs this crate at debug.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> Option<EnvFilter> {
    match rust_log {
        Some(directives) => Some(EnvFilter::new(directives)),
        None => verbose.then(|| EnvFilter::new("flashblade_client=debug")),
    }
}

/// Prints the operation catalog.
///
/// When `filter` is provided, only operation ids containing that substring are shown.
fn print_operations(filter: Option<&str>) {
    let filter = filter.map(str::to_ascii_lowercase);

    let operations: Vec<_> = FlashBladeClient::operations()
        .iter()
        .filter(|operation| {
            filter
                .as_ref()
                .is_none_or(|needle| operation.operation_id.to_ascii_lowercase().contains(needle))
        })
        .collect();

    let (operation_id_width, method_width) =
        operations
            .iter()
            .fold((0usize, 0usize), |(id_max, method_max), operation| {
                (
                    id_max.max(operation.operation_id.len()),
                    method_max.max(operation.method.len()),
                )
            });

    println!("API version {}", default_api_version());
    for operation in operations {
        println!(
            "{:<operation_id_width$}  {:<method_width$}  {}",
            operation.operation_id, operation.method, operation.path_template
        );
    }
}

/// Invokes a catalog operation and drains every page.
///
/// Error envelopes are reported as a command failure with the array's messages.
async fn call_operation(client: &FlashBladeClient, args: &CallArgs) -> Result<Value> {
    let mut request = Request::new(&args.operation_id);
    for (key, value) in parse_pairs(&args.option, "--option")? {
        request = request
            .with_option(&key, &value)
            .with_context(|| format!("invalid --option '{key}={value}'"))?;
    }
    if let Some(body) = parse_body(&args.body).context("failed to parse request body input")? {
        request = request.body(body);
    }

    match client.invoke::<Value>(request).await? {
        Response::Valid(valid) => {
            let total_item_count = valid.total_item_count();
            let total = valid.total().to_vec();
            let items = valid
                .into_items()
                .try_collect()
                .await
                .context("failed while reading pages")?;
            Ok(json!({
                "total_item_count": total_item_count,
                "total": total,
                "items": items,
            }))
        }
        Response::Error(error) => {
            let errors = serde_json::to_string(error.errors()).context("Failed to render errors")?;
            bail!("{error} {errors}")
        }
    }
}

/// Sends a raw HTTP request using method + path.
///
/// This bypasses the catalog and prints whatever the array returned.
async fn send_request(client: &ApiClient, args: &RequestArgs) -> Result<Value> {
    // Validate method eagerly so CLI errors are explicit before any network call.
    let method = Method::from_str(&args.method)
        .with_context(|| format!("invalid HTTP method '{}'", args.method))?;
    let query = parse_pairs(&args.query, "--query").context("failed to parse --query arguments")?;
    let body = parse_body(&args.body).context("failed to parse request body input")?;

    let reply = client
        .request_with_query(method, &args.path, &query, body.as_ref())
        .await
        .with_context(|| format!("HTTP request failed for path '{}'", args.path))?;

    let payload = if reply.body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&reply.body).unwrap_or(Value::String(reply.body))
    };
    Ok(json!({
        "status": reply.status.as_u16(),
        "request_id": reply.request_id,
        "body": payload,
    }))
}

/// Parses repeated `key=value` arguments into owned key/value pairs.
///
/// Returns an error when a value does not include `=` or has an empty key.
fn parse_pairs(values: &[String], flag_name: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::with_capacity(values.len());
    for item in values {
        let Some((key, value)) = item.split_once('=') else {
            bail!("invalid {flag_name} value '{item}': expected key=value");
        };
        if key.is_empty() {
            bail!("invalid {flag_name} value '{item}': empty key");
        }
        pairs.push((key.to_owned(), value.to_owned()));
    }
    Ok(pairs)
}

/// Parses an optional JSON body from inline text or a file path.
///
/// Exactly one of `--body-json` or `--body-file` may be set.
fn parse_body(body: &BodyInput) -> Result<Option<Value>> {
    match (&body.body_json, &body.body_file) {
        (Some(raw), None) => serde_json::from_str(raw)
            .context("failed to parse JSON from --body-json")
            .map(Some),
        (None, Some(path)) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read --body-file '{}'", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| {
                    format!("failed to parse JSON in --body-file '{}'", path.display())
                })
                .map(Some)
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => bail!("use only one of --body-json or --body-file"),
    }
}

/// Prints a JSON value either compact or pretty-formatted.
fn print_json(value: &Value, compact: bool) -> Result<()> {
    if compact {
        println!(
            "{}",
            serde_json::to_string(value).context("Failed to render JSON")?
        );
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to render JSON")?
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{log_filter, parse_pairs};

    #[test]
    fn logging_stays_off_without_verbose_or_rust_log() {
        assert!(log_filter(false, None).is_none());
    }

    #[test]
    fn verbose_logs_the_client_at_debug() {
        let filter = log_filter(true, None).expect("filter installed");
        assert!(filter.to_string().contains("flashblade_client=debug"));
    }

    #[test]
    fn rust_log_overrides_verbose() {
        let filter = log_filter(false, Some("reqwest=trace")).expect("filter installed");
        assert!(filter.to_string().contains("reqwest=trace"));
        let filter = log_filter(true, Some("warn")).expect("filter installed");
        assert!(!filter.to_string().contains("flashblade_client"));
    }

    #[test]
    fn option_pairs_need_a_key() {
        let pairs = parse_pairs(&["names=a,b".to_owned()], "--option").expect("valid pair");
        assert_eq!(pairs, vec![("names".to_owned(), "a,b".to_owned())]);
        assert!(parse_pairs(&["=x".to_owned()], "--option").is_err());
        assert!(parse_pairs(&["limit".to_owned()], "--option").is_err());
    }
}
