//! Log in to rig and print the streams configured for the account.
//!
//! Before running, replace the username and password placeholders. Set
//! `RUST_LOG=rig_sdk=debug` to see each request.

use std::error::Error;

use rig_sdk::{RigClient, RigClientOptions, RIG_DEV_BASE_URL};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let username = "REPLACE_WITH_USERNAME";
    let password = "REPLACE_WITH_PASSWORD";

    let client =
        RigClient::with_options(RigClientOptions::default().with_base_url(RIG_DEV_BASE_URL))?;

    let session = client.login(username, password).await?;
    println!("session={session}");

    let streams = client.stream_list().await?;
    println!("streams={streams}");

    Ok(())
}
