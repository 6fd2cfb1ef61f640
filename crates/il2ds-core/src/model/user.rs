use serde::{Deserialize, Serialize};

/// Army a pilot belongs to, as encoded in the console's `(N)Name` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Belligerent {
    None,
    Red,
    Blue,
    /// Army codes beyond the stock pair (co-op mods use them).
    Unknown(u8),
}

impl From<u8> for Belligerent {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Red,
            2 => Self::Blue,
            other => Self::Unknown(other),
        }
    }
}

impl Belligerent {
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Red => 1,
            Self::Blue => 2,
            Self::Unknown(code) => code,
        }
    }
}

impl std::fmt::Display for Belligerent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Red => write!(f, "Red"),
            Self::Blue => write!(f, "Blue"),
            Self::Unknown(code) => write!(f, "Army {code}"),
        }
    }
}

/// Aircraft a connected pilot currently occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aircraft {
    /// In-mission designation, e.g. `"Red_1"`.
    pub designation: String,
    /// Airframe identifier, e.g. `"A6M2-21"`.
    pub kind: String,
}

/// One row of the console `user` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub callsign: String,
    pub ping: u32,
    pub score: i32,
    pub belligerent: Belligerent,
    /// `None` when the pilot is not in an aircraft (briefing screen).
    pub aircraft: Option<Aircraft>,
}

/// Kill counters from one `user STAT` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillTable {
    pub aircraft: u32,
    pub static_aircraft: u32,
    pub tank: u32,
    pub car: u32,
    pub artillery: u32,
    pub aaa: u32,
    pub wagon: u32,
    pub ship: u32,
    pub radio: u32,
    pub bridge: u32,
}

/// Per-pilot statistics block from the console `user STAT` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub callsign: String,
    pub score: i64,
    /// Raw state string the server reports, e.g. `"In Flight"`.
    pub state: String,
    pub kills: KillTable,
    pub takeoffs: u32,
    pub landings: u32,
    pub deaths: u32,
    pub bail_outs: u32,
}
