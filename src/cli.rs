use anyhow::Result;
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

use crate::protocol::{ClientMessage, ServerMessage};

#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(about = "WebRTC signaling relay and probe client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to a running relay, log in, and print incoming frames
    Probe {
        /// Relay URL
        #[arg(short, long, default_value = "ws://localhost:8888")]
        url: String,

        /// Identity to log in under
        #[arg(short, long)]
        name: String,

        /// Send a placeholder offer to this identity after login
        #[arg(long)]
        call: Option<String>,
    },
}

/// Minimal interactive client for poking a live relay: logs in under
/// `name`, optionally opens a pairing with `--call`, then dumps every
/// frame the relay sends until the connection drops.
pub async fn run_probe(url: String, name: String, call: Option<String>) -> Result<()> {
    debug!("connecting to {url} as \"{name}\"");

    let (ws_stream, _) = match timeout(Duration::from_secs(5), connect_async(&url)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => return Err(anyhow::anyhow!("connection failed: {e}")),
        Err(_) => {
            return Err(anyhow::anyhow!(
                "connection timeout - is the relay running?"
            ))
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let login = serde_json::to_string(&ClientMessage::Login { name: name.clone() })?;
    write.send(Message::Text(login.into())).await?;

    let reply = timeout(Duration::from_secs(5), read.next())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for the login reply"))?
        .ok_or_else(|| anyhow::anyhow!("relay closed the connection before replying"))??;
    match &reply {
        Message::Text(text) => match serde_json::from_str::<ServerMessage>(text)? {
            ServerMessage::Login { success: true } => {
                println!("logged in as \"{name}\"");
            }
            ServerMessage::Login { success: false } => {
                return Err(anyhow::anyhow!("identity \"{name}\" is already taken"));
            }
            other => println!("{}", serde_json::to_string(&other)?),
        },
        other => debug!("ignoring non-text frame during login: {other:?}"),
    }

    if let Some(target) = call {
        let offer = ClientMessage::Offer {
            name: target.clone(),
            offer: json!({"type": "offer", "sdp": ""}),
        };
        write.send(Message::Text(serde_json::to_string(&offer)?.into())).await?;
        println!("sent placeholder offer to \"{target}\"");
    }

    while let Some(frame) = read.next().await {
        match frame? {
            Message::Text(text) => println!("{text}"),
            Message::Binary(data) => println!("<{} binary bytes>", data.len()),
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}
