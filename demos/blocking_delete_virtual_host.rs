//! Delete an object store virtual host and report whether it existed.
//!
//! Run:
//! `FB_BASE_URL=https://array FB_API_TOKEN=<token> cargo run --example blocking_delete_virtual_host -- s3.myhost.com`

use flashblade_client::{BlockingFlashBladeClient, Request, Response};
use serde_json::Value;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (Ok(base_url), Ok(api_token)) = (std::env::var("FB_BASE_URL"), std::env::var("FB_API_TOKEN"))
    else {
        eprintln!("Set FB_BASE_URL and FB_API_TOKEN before running this example.");
        std::process::exit(2);
    };
    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "s3.myhost.com".to_owned());

    let client = BlockingFlashBladeClient::new(base_url)?.login(&api_token)?;
    let request = Request::new("delete_object_store_virtual_hosts").names([host.as_str()]);

    match client.invoke::<Value>(request)? {
        Response::Valid(_) => println!("deleted {host}"),
        Response::Error(error) if error.is_not_found() => println!("{host} does not exist"),
        Response::Error(error) => {
            for detail in error.errors() {
                eprintln!("{}", detail.message);
            }
        }
    }

    client.logout()?;
    Ok(())
}
