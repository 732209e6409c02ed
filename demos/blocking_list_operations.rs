//! List catalog operations from the Rust client.
//!
//! Run:
//! `cargo run --example blocking_list_operations`

use flashblade_client::{BlockingFlashBladeClient, default_api_version};

fn main() {
    println!("Default API version: {}", default_api_version());

    let operations = BlockingFlashBladeClient::operations();
    println!("Loaded {} operations", operations.len());

    for operation in operations {
        let exclusive: Vec<String> = operation
            .exclusive_selectors
            .iter()
            .map(|(first, second)| format!("{first}|{second}"))
            .collect();
        println!(
            "- {:<6} {:<50} ({}) {}",
            operation.method,
            operation.path_template,
            operation.operation_id,
            exclusive.join(" ")
        );
    }
}
