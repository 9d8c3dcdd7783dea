//! Private Channel Example
//!
//! Private channels authorize against your application's auth endpoint
//! before subscribing, and accept client events sent with `Channel::send`.
//!
//! Required environment (a `.env` file works):
//! - `BROADCASTT_APP_KEY`
//! - `BROADCASTT_AUTH_ENDPOINT`, e.g. `https://example.com/broadcasting/auth`
//! - `BROADCASTT_CSRF_TOKEN` (optional)

use broadcastt_rs::{BroadcasttClient, ChannelStatus, ConnectionState, EventPayload};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let app_key = std::env::var("BROADCASTT_APP_KEY").expect("BROADCASTT_APP_KEY must be set in .env");
    let auth_endpoint =
        std::env::var("BROADCASTT_AUTH_ENDPOINT").expect("BROADCASTT_AUTH_ENDPOINT must be set in .env");

    let mut builder = BroadcasttClient::builder(app_key).auth_endpoint(auth_endpoint);
    if let Ok(csrf) = std::env::var("BROADCASTT_CSRF_TOKEN") {
        builder = builder.csrf(csrf);
    }
    let client = builder.build()?;

    println!("✅ Step 1: Connecting...");
    client.connect();
    client.wait_for(ConnectionState::Connected).await?;
    println!("   Connected as {:?}\n", client.socket_id());

    println!("✅ Step 2: Joining private-chat...");
    let chat = client.private("chat");
    chat.bind(
        "broadcastt:subscription_succeeded",
        Arc::new(|_: &EventPayload| println!("   Subscribed!")),
    )
    .bind(
        "broadcastt:subscription_error",
        Arc::new(|payload: &EventPayload| println!("   Authorization failed: {}", payload.data)),
    )
    .bind(
        "client-typing",
        Arc::new(|payload: &EventPayload| println!("   Someone is typing: {}", payload.data)),
    );

    tokio::time::sleep(Duration::from_secs(2)).await;

    if chat.status() == ChannelStatus::Subscribed {
        println!("\n✅ Step 3: Sending a client event...");
        chat.send("client-typing", json!({"user": "rust-demo"}))?;
    }

    tokio::signal::ctrl_c().await?;
    client.disconnect();

    Ok(())
}
