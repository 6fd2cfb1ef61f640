use serde::{Deserialize, Serialize};

/// Server descriptor returned by the console `server` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server flavour, e.g. `"Local server"`.
    pub server_type: String,
    pub name: String,
    pub description: String,
}
