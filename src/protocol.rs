use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from a client to the relay. The `name` field always
/// addresses another identity; offer/answer/candidate payloads are opaque
/// session-negotiation data the relay forwards without inspecting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Claim an identity for this connection
    Login { name: String },
    /// Start a pairing with the named identity
    Offer { name: String, offer: Value },
    /// Accept a pairing from the named identity
    Answer { name: String, answer: Value },
    /// Relay a network-reachability candidate to the named identity
    Candidate { name: String, candidate: Value },
    /// Tell the named identity the pairing is over
    Leave { name: String },
}

impl ClientMessage {
    /// The wire tags the dispatch table recognizes.
    pub const KNOWN_TYPES: [&'static str; 5] =
        ["login", "offer", "answer", "candidate", "leave"];
}

/// Messages sent from the relay to a client. Forwarded offers carry the
/// sender's identity in `name` so the receiver knows who is calling;
/// answers and candidates arrive with the routing field stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Reply to a login attempt
    Login { success: bool },
    /// Forwarded offer, `name` rewritten to the sender's identity
    Offer { offer: Value, name: String },
    /// Forwarded answer
    Answer { answer: Value },
    /// Forwarded candidate
    Candidate { candidate: Value },
    /// The paired identity hung up or disconnected
    Leave,
    /// Protocol error, connection stays open
    Error { message: String },
}
