use serde::{Deserialize, Serialize};

/// Lifecycle state of the mission currently known to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum MissionStatus {
    NotLoaded,
    Loaded,
    Playing,
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "not loaded"),
            Self::Loaded => write!(f, "loaded"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

/// Mission state as reported by the console `mission` family of commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionInfo {
    pub status: MissionStatus,
    /// Mission file path relative to the server root, e.g.
    /// `"net/dogfight/dogfight1.mis"`. `None` when no mission is loaded.
    pub file_path: Option<String>,
}

impl MissionInfo {
    pub fn not_loaded() -> Self {
        Self {
            status: MissionStatus::NotLoaded,
            file_path: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == MissionStatus::Playing
    }
}
