//! Page through NFS lock clients with the async client.
//!
//! Run:
//! `FB_BASE_URL=https://array FB_SESSION_TOKEN=<token> cargo run --example async_get_locks_clients`
//!
//! Optional env vars:
//! - `FB_LIMIT` (defaults to `1000`)
//! - `FB_PAGE_SIZE` (defaults to `250`)

use flashblade_client::{FlashBladeClient, Request, Response};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LockClient {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (Ok(base_url), Ok(session)) = (
        std::env::var("FB_BASE_URL"),
        std::env::var("FB_SESSION_TOKEN"),
    ) else {
        eprintln!("Set FB_BASE_URL and FB_SESSION_TOKEN before running this example.");
        std::process::exit(2);
    };
    let limit = std::env::var("FB_LIMIT").map_or(Ok(1000), |value| value.parse())?;
    let page_size = std::env::var("FB_PAGE_SIZE").map_or(Ok(250), |value| value.parse())?;

    let client = FlashBladeClient::new(base_url)?.with_session_token(session);
    let request = Request::new("get_file_systems_locks_clients")
        .limit(limit)
        .page_size(page_size);

    match client.invoke::<LockClient>(request).await? {
        Response::Valid(valid) => {
            println!("{:?} matching clients", valid.total_item_count());
            let mut pager = valid.into_items();
            while let Some(lock_client) = pager.try_next().await? {
                println!("{}", lock_client.name);
            }
        }
        Response::Error(error) => eprintln!("listing failed: {error}"),
    }
    Ok(())
}
