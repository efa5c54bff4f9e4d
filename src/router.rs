use serde_json::Value;
use tracing::{debug, info, warn};

use crate::blob::BlobSink;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{ConnId, Registry};

/// Classify and route one inbound frame. Frames that decode as the JSON
/// envelope go through the dispatch table; anything else is an opaque blob
/// handed to the sink with no reply.
pub async fn handle_frame(registry: &Registry, blobs: &BlobSink, conn: ConnId, payload: Vec<u8>) {
    let value = match std::str::from_utf8(&payload)
        .ok()
        .and_then(|text| serde_json::from_str::<Value>(text).ok())
    {
        Some(value) => value,
        None => {
            debug!("received {} byte blob frame", payload.len());
            blobs.store(payload);
            return;
        }
    };

    match serde_json::from_value::<ClientMessage>(value.clone()) {
        Ok(message) => dispatch(registry, conn, message).await,
        Err(err) => {
            let tag = value.get("type").and_then(Value::as_str);
            match tag {
                Some(tag) if ClientMessage::KNOWN_TYPES.contains(&tag) => {
                    // Known command with missing or malformed fields; there
                    // is nothing safe to route.
                    warn!("dropping malformed \"{tag}\" message: {err}");
                }
                other => {
                    let tag = other.unwrap_or("unknown");
                    reply(
                        registry,
                        conn,
                        ServerMessage::Error {
                            message: format!("Unrecognized command: {tag}"),
                        },
                    )
                    .await;
                }
            }
        }
    }
}

/// The dispatch table. Missing targets drop offer/answer/candidate
/// silently: the protocol has no delivery acknowledgment, so an absent
/// peer is the same as the message never existing.
async fn dispatch(registry: &Registry, conn: ConnId, message: ClientMessage) {
    match message {
        ClientMessage::Login { name } => match registry.register(conn, &name).await {
            Ok(()) => {
                info!("connection logged in as \"{name}\"");
                reply(registry, conn, ServerMessage::Login { success: true }).await;
            }
            Err(err) => {
                info!("login as \"{name}\" refused: {err}");
                reply(registry, conn, ServerMessage::Login { success: false }).await;
            }
        },

        ClientMessage::Offer { name, offer } => {
            let Some(sender_identity) = registry.identity_of(conn).await else {
                warn!("dropping offer from a connection that never logged in");
                return;
            };
            if let Some(target) = registry.lookup(&name).await {
                debug!("forwarding offer from \"{sender_identity}\" to \"{name}\"");
                registry.pair(conn, &name).await;
                target.send(ServerMessage::Offer {
                    offer,
                    name: sender_identity,
                });
            } else {
                debug!("dropping offer for unregistered identity \"{name}\"");
            }
        }

        ClientMessage::Answer { name, answer } => {
            if let Some(target) = registry.lookup(&name).await {
                debug!("forwarding answer to \"{name}\"");
                registry.pair(conn, &name).await;
                target.send(ServerMessage::Answer { answer });
            } else {
                debug!("dropping answer for unregistered identity \"{name}\"");
            }
        }

        ClientMessage::Candidate { name, candidate } => {
            if let Some(target) = registry.lookup(&name).await {
                target.send(ServerMessage::Candidate { candidate });
            } else {
                debug!("dropping candidate for unregistered identity \"{name}\"");
            }
        }

        ClientMessage::Leave { name } => {
            // Only the receiving side is unpaired here; the sender's own
            // pairing stays set until it disconnects or re-pairs.
            if let Some(target) = registry.clear_peer_of(&name).await {
                info!("\"{name}\" was told its peer left");
                target.send(ServerMessage::Leave);
            } else {
                debug!("leave addressed to unregistered identity \"{name}\"");
            }
        }
    }
}

/// Transport close: release the identity and, if the connection was
/// paired, notify and unpair the surviving side.
pub async fn handle_close(registry: &Registry, conn: ConnId) {
    if let Some(peer) = registry.disconnect(conn).await {
        peer.send(ServerMessage::Leave);
    }
}

async fn reply(registry: &Registry, conn: ConnId, message: ServerMessage) {
    if let Some(sender) = registry.sender_of(conn).await {
        sender.send(message);
    }
}
