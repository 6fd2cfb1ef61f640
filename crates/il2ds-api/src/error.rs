use thiserror::Error;

/// Top-level error type for the `il2ds-api` crate.
///
/// Callers of the request catalogs see exactly three failure shapes:
/// timeouts, transport/connection loss, and domain errors the server
/// itself reports. Protocol-level noise (malformed datagrams, stray
/// echoes, foreign traffic) is logged and recovered internally and never
/// surfaces here.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Socket-level failure: connection refused, reset, send error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The connection was closed (locally via `close()` or by the peer)
    /// while the request was queued or in flight.
    #[error("connection closed")]
    ConnectionClosed,

    // ── Timeouts ────────────────────────────────────────────────────
    /// The request's deadline elapsed before the response completed.
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    // ── Server-reported (domain) errors ─────────────────────────────
    /// The server answered with an error line, e.g.
    /// `ERROR mission: net/dogfight/x.mis NOT loaded`.
    #[error("server error: {message}")]
    Server { message: String },

    // ── Response shape errors ───────────────────────────────────────
    /// A genuine reply to our own request could not be parsed.
    #[error("unexpected response: {message}")]
    Response { message: String },
}

impl Error {
    pub(crate) fn timeout(elapsed: std::time::Duration) -> Self {
        Self::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub(crate) fn response(message: impl Into<String>) -> Self {
        Self::Response {
            message: message.into(),
        }
    }

    /// Returns `true` if the request's deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for connection-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConnectionClosed)
    }
}
