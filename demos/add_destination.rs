//! Create a stream, attach a destination, and rotate its ingest key.
//!
//! Uses an existing bearer token instead of logging in. Replace the token,
//! service, and key placeholders before running.

use std::error::Error;

use rig_sdk::{RigClient, RigClientOptions};
use secrecy::SecretString;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let token = "REPLACE_WITH_TOKEN".to_string();
    let service = "YouTube";
    let stream_key = "REPLACE_WITH_STREAM_KEY";

    let client =
        RigClient::with_options(RigClientOptions::default().with_token(SecretString::new(token)))?;

    let stream = client.stream_create().await?;
    let Some(stream_id) = stream.get("id").and_then(|id| id.as_str()) else {
        println!("rig did not return a stream id: {stream}");
        return Ok(());
    };

    let updated = client
        .stream_add_destination(stream_id, service, stream_key)
        .await?;
    println!("stream={updated}");

    let rotated = client.stream_change_key(stream_id).await?;
    println!("rotated={rotated}");

    Ok(())
}
