// Typed console request catalog.
//
// Each method builds its wire body, runs it through the strictly ordered
// request queue, and extracts a typed result from the raw response lines.
// Implemented as inherent methods on `ConsoleClient` to keep `client.rs`
// focused on dispatch mechanics.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use il2ds_core::{MissionInfo, ServerInfo, User, UserStatistics};

use super::client::{ChatTarget, ConsoleClient};
use super::escape::escape;
use super::parse;
use super::CHAT_MAX_LENGTH;
use crate::error::Error;

impl ConsoleClient {
    // ── Server ───────────────────────────────────────────────────────

    /// Query the server descriptor.
    ///
    /// `server` → three `Key: value` lines.
    pub async fn server_info(&self) -> Result<ServerInfo, Error> {
        let lines = self.request("server".into(), self.default_timeout(), false).await?;
        parse::parse_server_info(&lines)
    }

    // ── Users ────────────────────────────────────────────────────────

    /// List connected pilots.
    ///
    /// `user` → header line plus one row per pilot.
    pub async fn users(&self) -> Result<Vec<User>, Error> {
        self.users_with_timeout(self.default_timeout()).await
    }

    async fn users_with_timeout(&self, timeout: Duration) -> Result<Vec<User>, Error> {
        let lines = self.request("user".into(), timeout, false).await?;
        parse::parse_users(&lines)
    }

    /// Per-pilot statistics.
    ///
    /// `user STAT` → dash-delimited blocks.
    pub async fn user_statistics(&self) -> Result<Vec<UserStatistics>, Error> {
        let lines = self
            .request("user STAT".into(), self.default_timeout(), false)
            .await?;
        parse::parse_user_statistics(&lines)
    }

    /// Kick a pilot by callsign. Fire-only: the response carries no
    /// structured result.
    pub async fn kick_callsign(&self, callsign: &str) -> Result<(), Error> {
        self.request(format!("kick {callsign}"), self.default_timeout(), false)
            .await?;
        Ok(())
    }

    /// Kick a pilot by 1-based position in the `user` listing.
    pub async fn kick_number(&self, number: usize) -> Result<(), Error> {
        self.kick_number_with_timeout(number, self.default_timeout())
            .await
    }

    async fn kick_number_with_timeout(
        &self,
        number: usize,
        timeout: Duration,
    ) -> Result<(), Error> {
        self.request(format!("kick {number}"), timeout, false).await?;
        Ok(())
    }

    /// Kick every connected pilot, returning how many were kicked.
    ///
    /// The server has no bulk kick, so this loops count-then-kick-first
    /// until the listing is empty. The whole loop shares one deadline:
    /// each sub-request gets the remaining budget, and the call fails
    /// with [`Error::Timeout`] the moment the budget runs out.
    pub async fn kick_all(&self) -> Result<usize, Error> {
        let started = Instant::now();
        let deadline = started + self.default_timeout();
        let mut kicked = 0;

        loop {
            let remaining = remaining_budget(started, deadline)?;
            let count = self.users_with_timeout(remaining).await?.len();
            if count == 0 {
                break;
            }

            let remaining = remaining_budget(started, deadline)?;
            self.kick_number_with_timeout(1, remaining).await?;
            kicked += 1;
        }

        debug!(kicked, "kick_all finished");
        Ok(kicked)
    }

    // ── Chat ─────────────────────────────────────────────────────────

    /// Send a chat message.
    ///
    /// The console line buffer holds at most [`CHAT_MAX_LENGTH`]
    /// characters of payload, so longer messages are split and sent as
    /// sequential fire-and-forget commands. Payloads are escaped so
    /// embedded control characters survive the console's own framing.
    pub async fn chat(&self, message: &str, target: ChatTarget) -> Result<(), Error> {
        for chunk in chunk_message(message) {
            let body = format!("chat {} {}", escape(&chunk), target.wire());
            self.request(body, self.default_timeout(), false).await?;
        }
        Ok(())
    }

    // ── Missions ─────────────────────────────────────────────────────

    /// Query the current mission state.
    pub async fn mission_status(&self) -> Result<MissionInfo, Error> {
        self.mission_request("mission".into()).await
    }

    /// Load a mission file, e.g. `net/dogfight/dogfight1.mis`.
    pub async fn mission_load(&self, path: &str) -> Result<MissionInfo, Error> {
        self.mission_request(format!("mission LOAD {path}")).await
    }

    /// Start playing the loaded mission.
    pub async fn mission_begin(&self) -> Result<MissionInfo, Error> {
        self.mission_request("mission BEGIN".into()).await
    }

    /// Stop playing, keeping the mission loaded.
    pub async fn mission_end(&self) -> Result<MissionInfo, Error> {
        self.mission_request("mission END".into()).await
    }

    /// Unload the mission entirely.
    pub async fn mission_destroy(&self) -> Result<MissionInfo, Error> {
        self.mission_request("mission DESTROY".into()).await
    }

    /// All mission commands answer with either the `NOT loaded` sentinel
    /// or a `Mission: PATH is STATUS` line; failures arrive as
    /// `ERROR`-prefixed lines and surface as [`Error::Server`].
    async fn mission_request(&self, body: String) -> Result<MissionInfo, Error> {
        let lines = self.request(body, self.default_timeout(), false).await?;
        parse::parse_mission(&lines)
    }
}

/// Remaining budget before `deadline`, or a timeout error carrying the
/// time actually spent.
fn remaining_budget(started: Instant, deadline: Instant) -> Result<Duration, Error> {
    let now = Instant::now();
    if now >= deadline {
        return Err(Error::timeout(now - started));
    }
    Ok(deadline - now)
}

/// Split a message into chunks of at most [`CHAT_MAX_LENGTH`] characters.
fn chunk_message(message: &str) -> Vec<String> {
    let chars: Vec<char> = message.chars().collect();
    chars
        .chunks(CHAT_MAX_LENGTH)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
