//! Keep the rig session in a JSON file so later runs stay logged in.
//!
//! The first run logs in and writes `authToken` and `currentUser` to the file.
//! Later runs reuse the stored token until `--logout` is passed.

use std::error::Error;

use rig_sdk::{JsonFileStore, KeyValueTokenStore, RigClient, RigClientOptions, RigError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let username = "REPLACE_WITH_USERNAME";
    let password = "REPLACE_WITH_PASSWORD";
    let path = std::env::temp_dir().join("rig-session.json");

    let store = KeyValueTokenStore::new(JsonFileStore::new(&path));
    let client = RigClient::with_token_store(RigClientOptions::default(), store)?;

    if std::env::args().any(|arg| arg == "--logout") {
        client.clear_session()?;
        println!("session cleared from {}", path.display());
        return Ok(());
    }

    if !client.is_authenticated()? {
        client.login(username, password).await?;
        println!("logged in, session stored at {}", path.display());
    }

    match client.stream_list().await {
        Ok(streams) => println!("user={:?} streams={streams}", client.current_user()?),
        Err(RigError::Remote { status, body }) => {
            println!("rig rejected the stored session ({status}): {body}");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
