//! List KMIP server configurations with the blocking client.
//!
//! Run:
//! `FB_BASE_URL=https://array FB_API_TOKEN=<token> cargo run --example blocking_get_kmip`
//!
//! Optional env vars:
//! - `FB_KMIP_NAMES` (comma-separated names to restrict the listing)

use flashblade_client::{BlockingFlashBladeClient, Request, Response};
use serde_json::Value;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (Ok(base_url), Ok(api_token)) = (std::env::var("FB_BASE_URL"), std::env::var("FB_API_TOKEN"))
    else {
        eprintln!("Set FB_BASE_URL and FB_API_TOKEN before running this example.");
        std::process::exit(2);
    };

    let client = BlockingFlashBladeClient::new(base_url)?.login(&api_token)?;

    let mut request = Request::new("get_kmip");
    if let Ok(names) = std::env::var("FB_KMIP_NAMES") {
        request = request.names(names.split(','));
    }

    match client.invoke::<Value>(request)? {
        Response::Valid(valid) => {
            for item in valid.into_items() {
                println!("{}", serde_json::to_string_pretty(&item?)?);
            }
        }
        Response::Error(error) => eprintln!("get_kmip failed: {error}"),
    }

    client.logout()?;
    Ok(())
}
