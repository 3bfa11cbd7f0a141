pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod stats;
pub mod utils;

#[cfg(test)]
mod testing;

pub use client::Client;
pub use commands::UserCommand;
pub use config::{ClientConfig, MediaSources};
pub use error::ClientError;
pub use session::SessionState;

use peer::WebRtcPeerFactory;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opens the signaling socket and builds a client with real peer connections.
/// Returns the client and the inbound frames to hand to [`Client::run`].
pub async fn connect(
    config: ClientConfig,
) -> Result<(Client, mpsc::UnboundedReceiver<String>), ClientError> {
    let channel = signaling::connect(&config.signaling_url).await?;
    let factory = Arc::new(WebRtcPeerFactory::new(&config));
    let client = Client::new(config, channel.signaler, factory);
    Ok((client, channel.inbound))
}
