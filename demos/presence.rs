//! Presence Example
//!
//! Presence channels keep a roster of everyone subscribed:
//! - `here` fires once the subscription succeeds, with the full roster
//! - `joining` and `leaving` fire as members come and go
//!
//! Required environment (a `.env` file works):
//! - `BROADCASTT_APP_KEY`
//! - `BROADCASTT_AUTH_ENDPOINT`

use broadcastt_rs::{BroadcasttClient, ConnectionState, EventPayload, Members};
use std::sync::Arc;

fn display_members(members: Option<&Members>) {
    let Some(members) = members else {
        return;
    };
    println!("📋 {} member(s) present", members.count);
    for id in &members.ids {
        println!("   - {}: {}", id, members.hash.get(id).cloned().unwrap_or_default());
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let app_key = std::env::var("BROADCASTT_APP_KEY").expect("BROADCASTT_APP_KEY must be set in .env");
    let auth_endpoint =
        std::env::var("BROADCASTT_AUTH_ENDPOINT").expect("BROADCASTT_AUTH_ENDPOINT must be set in .env");

    let client = BroadcasttClient::builder(app_key)
        .auth_endpoint(auth_endpoint)
        .build()?;

    let room = client.presence("lobby");
    room.here(Arc::new(|payload: &EventPayload| {
        println!("🦀 Subscribed to presence-lobby");
        display_members(payload.members.as_ref());
    }))
    .joining(Arc::new(|payload: &EventPayload| {
        println!("➕ {} joined", payload.data["user_id"]);
        display_members(payload.members.as_ref());
    }))
    .leaving(Arc::new(|payload: &EventPayload| {
        println!("➖ {} left", payload.data["user_id"]);
        display_members(payload.members.as_ref());
    }));

    client.connect();
    client.wait_for(ConnectionState::Connected).await?;

    tokio::signal::ctrl_c().await?;

    if let Some(me) = room.me() {
        println!("Leaving as {}", me.user_id);
    }
    client.leave("presence-lobby");
    client.disconnect();

    Ok(())
}
