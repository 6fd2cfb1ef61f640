// ── Actor position types ──
//
// One record per actor kind queryable over Device Link. The kinds differ
// only in how their wire identifier is normalized, so each gets its own
// type rather than a shared tag field.

use serde::{Deserialize, Serialize};

/// World-space position in the mission coordinate system (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A moving (player- or AI-flown) aircraft.
///
/// The wire identifier `{callsign}_{seat}` is split: multi-crew aircraft
/// report one entry per occupied seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftPosition {
    pub callsign: String,
    pub seat: u32,
    pub pos: Point3,
}

/// A moving ground unit (vehicle column member).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundUnitPosition {
    pub id: String,
    pub pos: Point3,
}

/// A ship, moving or moored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipPosition {
    pub id: String,
    pub pos: Point3,
}

/// A stationary mission object (parked aircraft, artillery piece, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationaryObjectPosition {
    pub id: String,
    pub pos: Point3,
}

/// A destructible map building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousePosition {
    pub id: String,
    pub pos: Point3,
}
