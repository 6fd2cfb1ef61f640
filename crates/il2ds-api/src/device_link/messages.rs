// Device Link opcode catalog and answer-value parsing.

use il2ds_core::Point3;

use crate::error::Error;

/// Ask the server to recompute the radar picture. No answer.
pub(crate) const RADAR_REFRESH: u16 = 1001;

/// Position answers for actors that dropped out between the count query
/// and the position query carry these payloads instead of coordinates.
const BAD_INDEX: &str = "BADINDEX";
const INVALID: &str = "INVALID";

/// Actor categories the server enumerates, each with its own
/// count/position opcode pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActorKind {
    Aircraft,
    GroundUnit,
    Ship,
    StationaryObject,
    House,
}

impl ActorKind {
    pub(crate) fn count_opcode(self) -> u16 {
        match self {
            Self::Aircraft => 1002,
            Self::GroundUnit => 1006,
            Self::Ship => 1010,
            Self::StationaryObject => 1014,
            Self::House => 1018,
        }
    }

    pub(crate) fn position_opcode(self) -> u16 {
        match self {
            Self::Aircraft => 1004,
            Self::GroundUnit => 1008,
            Self::Ship => 1012,
            Self::StationaryObject => 1016,
            Self::House => 1020,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Aircraft => "aircraft",
            Self::GroundUnit => "ground unit",
            Self::Ship => "ship",
            Self::StationaryObject => "stationary object",
            Self::House => "house",
        }
    }
}

/// A decoded position answer before per-kind typing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawPosition {
    pub(crate) id: String,
    pub(crate) pos: Point3,
}

/// Parse a count answer value, e.g. `3`.
pub(crate) fn parse_count(value: Option<&str>) -> Result<usize, Error> {
    let value = value.ok_or_else(|| Error::response("count answer carries no value"))?;
    value
        .parse()
        .map_err(|_| Error::response(format!("malformed actor count {value:?}")))
}

/// Parse a position answer value, `INDEX:ID;X;Y;Z`.
///
/// Returns `None` for the two stale-actor sentinels; the actor left the
/// mission between enumeration and query, which is not an error.
pub(crate) fn parse_position(value: &str) -> Result<Option<(usize, RawPosition)>, Error> {
    let (index, payload) = value
        .split_once(':')
        .ok_or_else(|| Error::response(format!("position answer without index: {value:?}")))?;
    let index: usize = index
        .parse()
        .map_err(|_| Error::response(format!("malformed position index {index:?}")))?;

    if payload == BAD_INDEX || payload == INVALID {
        return Ok(None);
    }

    let mut parts = payload.split(';');
    let id = parts
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::response(format!("position answer without id: {payload:?}")))?;
    let mut coord = || -> Result<f64, Error> {
        let part = parts
            .next()
            .ok_or_else(|| Error::response(format!("truncated position answer: {payload:?}")))?;
        part.parse()
            .map_err(|_| Error::response(format!("malformed coordinate {part:?}")))
    };
    let pos = Point3::new(coord()?, coord()?, coord()?);

    Ok(Some((
        index,
        RawPosition {
            id: id.to_string(),
            pos,
        },
    )))
}

/// Split an aircraft id into callsign and seat number. Ids look like
/// `user0_1`; without a numeric suffix the whole id is the callsign.
pub(crate) fn split_aircraft_id(id: &str) -> (String, u32) {
    match id.rsplit_once('_') {
        Some((callsign, seat)) => match seat.parse() {
            Ok(seat) => (callsign.to_string(), seat),
            Err(_) => (id.to_string(), 0),
        },
        None => (id.to_string(), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_count() {
        assert_eq!(parse_count(Some("3")).unwrap(), 3);
        assert_eq!(parse_count(Some("0")).unwrap(), 0);
        assert!(parse_count(None).is_err());
        assert!(parse_count(Some("many")).is_err());
    }

    #[test]
    fn parses_position() {
        let (index, raw) = parse_position("2:user0_1;100.5;200.0;-5.25")
            .unwrap()
            .unwrap();
        assert_eq!(index, 2);
        assert_eq!(raw.id, "user0_1");
        assert_eq!(raw.pos, Point3::new(100.5, 200.0, -5.25));
    }

    #[test]
    fn stale_actor_sentinels_yield_none() {
        assert_eq!(parse_position("7:BADINDEX").unwrap(), None);
        assert_eq!(parse_position("7:INVALID").unwrap(), None);
    }

    #[test]
    fn malformed_positions_are_errors() {
        assert!(parse_position("no-index-here").is_err());
        assert!(parse_position("1:;1.0;2.0;3.0").is_err());
        assert!(parse_position("1:id;1.0;2.0").is_err());
        assert!(parse_position("1:id;1.0;two;3.0").is_err());
    }

    #[test]
    fn splits_aircraft_ids() {
        assert_eq!(split_aircraft_id("user0_1"), ("user0".to_string(), 1));
        assert_eq!(split_aircraft_id("r/s_3"), ("r/s".to_string(), 3));
        assert_eq!(split_aircraft_id("solo"), ("solo".to_string(), 0));
        assert_eq!(split_aircraft_id("odd_tail"), ("odd_tail".to_string(), 0));
    }
}
