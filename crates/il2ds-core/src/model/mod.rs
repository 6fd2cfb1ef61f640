// ── Domain model modules ──

mod actor;
mod mission;
mod server;
mod user;

pub use actor::{
    AircraftPosition, GroundUnitPosition, HousePosition, Point3, ShipPosition,
    StationaryObjectPosition,
};
pub use mission::{MissionInfo, MissionStatus};
pub use server::ServerInfo;
pub use user::{Aircraft, Belligerent, KillTable, User, UserStatistics};
