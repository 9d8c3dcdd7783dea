use broadcastt_rs::{BroadcasttClient, ConnectionState, EventPayload};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Create client
    let client = BroadcasttClient::builder("your-app-key").debug(true).build()?;

    // Listen on a public channel; it subscribes once connected
    let channel = client.join("orders");
    channel.bind(
        "order-shipped",
        Arc::new(|payload: &EventPayload| {
            println!("Order shipped: {}", payload.data);
        }),
    );

    // Connect
    println!("Connecting to Broadcastt...");
    client.connect();
    client.wait_for(ConnectionState::Connected).await?;
    println!("Connected! Socket id: {:?}", client.socket_id());

    // Keep connection alive
    tokio::signal::ctrl_c().await?;

    // Disconnect
    println!("Disconnecting...");
    client.leave("orders");
    client.disconnect();
    println!("Disconnected!");

    Ok(())
}
