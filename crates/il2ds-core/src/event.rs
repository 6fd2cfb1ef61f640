// ── Console event types ──
//
// Out-of-band lines the server pushes on the console session,
// independent of any request/response exchange.

use serde::{Deserialize, Serialize};

/// A chat line relayed through the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sending pilot's callsign; `None` for the server's own announcements.
    pub author: Option<String>,
    /// Message body with the wire escaping already undone.
    pub body: String,
}

impl ChatMessage {
    pub fn is_from_server(&self) -> bool {
        self.author.is_none()
    }
}

/// Lifecycle of a human client's connection to the dedicated server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConnectionEvent {
    /// A client began connecting on a channel.
    Started { channel: u32, address: String },
    /// The handshake finished and the client has a callsign.
    Connected {
        channel: u32,
        address: String,
        callsign: String,
    },
    /// The connection was lost or closed.
    Disconnected {
        channel: u32,
        address: String,
        reason: String,
    },
}

impl ConnectionEvent {
    pub fn channel(&self) -> u32 {
        match self {
            Self::Started { channel, .. }
            | Self::Connected { channel, .. }
            | Self::Disconnected { channel, .. } => *channel,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Self::Started { address, .. }
            | Self::Connected { address, .. }
            | Self::Disconnected { address, .. } => address,
        }
    }
}
