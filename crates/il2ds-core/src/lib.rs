// il2ds-core: Domain model shared by the console and Device Link clients.

pub mod event;
pub mod model;

// ── Primary re-exports ──────────────────────────────────────────────
pub use event::{ChatMessage, ConnectionEvent};
pub use model::{
    // Server and users
    Aircraft, Belligerent, KillTable, ServerInfo, User, UserStatistics,
    // Missions
    MissionInfo, MissionStatus,
    // Actor positions
    AircraftPosition, GroundUnitPosition, HousePosition, Point3, ShipPosition,
    StationaryObjectPosition,
};
