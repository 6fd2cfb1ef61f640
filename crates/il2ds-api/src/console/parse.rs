// Typed extraction from raw console response batches.
//
// Every parser takes the accumulated logical lines of one completed
// response and produces a domain value or `Error::Response`. Server-side
// failures surface as `Error::Server` carrying the server's own error
// line.

use il2ds_core::{
    Aircraft, Belligerent, KillTable, MissionInfo, MissionStatus, ServerInfo, User, UserStatistics,
};

use crate::error::Error;

/// Prefix of server-side failure lines, e.g.
/// `ERROR mission: net/dogfight/x.mis NOT loaded`.
const ERROR_PREFIX: &str = "ERROR";

/// Surface the first error-prefixed line of a batch as a domain error.
pub(crate) fn check_server_error(lines: &[String]) -> Result<(), Error> {
    for line in lines {
        if let Some(message) = line.trim_start().strip_prefix(ERROR_PREFIX) {
            return Err(Error::Server {
                message: message.trim_start_matches([':', ' ']).to_string(),
            });
        }
    }
    Ok(())
}

// ── server ───────────────────────────────────────────────────────────

/// Three `Key: value` lines: Type, Name, Description.
pub(crate) fn parse_server_info(lines: &[String]) -> Result<ServerInfo, Error> {
    let mut server_type = None;
    let mut name = None;
    let mut description = None;

    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "Type" => server_type = Some(value),
            "Name" => name = Some(value),
            "Description" => description = Some(value),
            _ => {}
        }
    }

    match (server_type, name, description) {
        (Some(server_type), Some(name), Some(description)) => Ok(ServerInfo {
            server_type,
            name,
            description,
        }),
        _ => Err(Error::response(format!(
            "incomplete server info in {} line(s)",
            lines.len()
        ))),
    }
}

// ── user ─────────────────────────────────────────────────────────────

/// Header line plus zero or more rows:
/// `{callsign} {ping} {score} ({army_code}){army_name} [{designation} {kind}]`
pub(crate) fn parse_users(lines: &[String]) -> Result<Vec<User>, Error> {
    let mut users = Vec::new();

    // First line is the column header.
    for line in lines.iter().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        users.push(parse_user_row(line)?);
    }
    Ok(users)
}

fn parse_user_row(line: &str) -> Result<User, Error> {
    let bad_row = || Error::response(format!("malformed user row: {line:?}"));

    let mut columns = line.split_whitespace();
    let callsign = columns.next().ok_or_else(bad_row)?.to_string();
    let ping = columns
        .next()
        .and_then(|c| c.parse().ok())
        .ok_or_else(bad_row)?;
    let score = columns
        .next()
        .and_then(|c| c.parse().ok())
        .ok_or_else(bad_row)?;
    let belligerent = columns
        .next()
        .and_then(parse_belligerent)
        .ok_or_else(bad_row)?;

    let aircraft = match columns.next() {
        Some(designation) => {
            let kind = columns.collect::<Vec<_>>().join(" ");
            if kind.is_empty() {
                return Err(bad_row());
            }
            Some(Aircraft {
                designation: designation.to_string(),
                kind,
            })
        }
        None => None,
    };

    Ok(User {
        callsign,
        ping,
        score,
        belligerent,
        aircraft,
    })
}

/// `(N)Name` column, e.g. `(0)None`, `(1)Red`.
fn parse_belligerent(column: &str) -> Option<Belligerent> {
    let rest = column.strip_prefix('(')?;
    let (code, _name) = rest.split_once(')')?;
    Some(Belligerent::from(code.parse::<u8>().ok()?))
}

// ── user STAT ────────────────────────────────────────────────────────

/// Repeating per-pilot blocks separated by dashed lines. Fields inside a
/// block follow a fixed ordered schema of `Key: value` pairs; parsing is
/// keyed rather than positional so partially filled blocks still load.
pub(crate) fn parse_user_statistics(lines: &[String]) -> Result<Vec<UserStatistics>, Error> {
    let mut stats = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in lines {
        if is_block_separator(line) {
            if !block.is_empty() {
                stats.push(parse_statistics_block(&block)?);
                block.clear();
            }
        } else if !line.trim().is_empty() {
            block.push(line);
        }
    }
    if !block.is_empty() {
        stats.push(parse_statistics_block(&block)?);
    }
    Ok(stats)
}

fn is_block_separator(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.bytes().all(|b| b == b'-')
}

fn parse_statistics_block(block: &[&str]) -> Result<UserStatistics, Error> {
    let mut callsign = None;
    let mut score = 0i64;
    let mut state = String::new();
    let mut kills = KillTable::default();
    let mut takeoffs = 0;
    let mut landings = 0;
    let mut deaths = 0;
    let mut bail_outs = 0;

    for line in block {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => callsign = Some(value.to_string()),
            "Score" => score = parse_number(key, value)?,
            "State" => state = value.to_string(),
            "Enemy Aircraft Kill" => kills.aircraft = parse_number(key, value)?,
            "Enemy Static Aircraft Kill" => kills.static_aircraft = parse_number(key, value)?,
            "Enemy Tank Kill" => kills.tank = parse_number(key, value)?,
            "Enemy Car Kill" => kills.car = parse_number(key, value)?,
            "Enemy Artillery Kill" => kills.artillery = parse_number(key, value)?,
            "Enemy AAA Kill" => kills.aaa = parse_number(key, value)?,
            "Enemy Wagon Kill" => kills.wagon = parse_number(key, value)?,
            "Enemy Ship Kill" => kills.ship = parse_number(key, value)?,
            "Enemy Radio Kill" => kills.radio = parse_number(key, value)?,
            "Enemy Bridge Kill" => kills.bridge = parse_number(key, value)?,
            "Take-off" => takeoffs = parse_number(key, value)?,
            "Landing" => landings = parse_number(key, value)?,
            "Death" => deaths = parse_number(key, value)?,
            "Bail Out" => bail_outs = parse_number(key, value)?,
            _ => {}
        }
    }

    Ok(UserStatistics {
        callsign: callsign
            .ok_or_else(|| Error::response("statistics block without a Name field"))?,
        score,
        state,
        kills,
        takeoffs,
        landings,
        deaths,
        bail_outs,
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::response(format!("bad numeric value for {}: {value:?}", key.trim())))
}

// ── mission ──────────────────────────────────────────────────────────

const MISSION_NOT_LOADED: &str = "Mission NOT loaded";
const MISSION_PREFIX: &str = "Mission: ";
const MISSION_STATUS_SEPARATOR: &str = " is ";

/// `Mission NOT loaded` or `Mission: {path} is {Loaded|Playing}`.
pub(crate) fn parse_mission(lines: &[String]) -> Result<MissionInfo, Error> {
    check_server_error(lines)?;

    for line in lines {
        let trimmed = line.trim();
        if trimmed == MISSION_NOT_LOADED {
            return Ok(MissionInfo::not_loaded());
        }
        let Some(rest) = trimmed.strip_prefix(MISSION_PREFIX) else {
            continue;
        };
        let Some((path, status)) = rest.rsplit_once(MISSION_STATUS_SEPARATOR) else {
            return Err(Error::response(format!("malformed mission line: {line:?}")));
        };
        let status = match status {
            "Loaded" => MissionStatus::Loaded,
            "Playing" => MissionStatus::Playing,
            other => {
                return Err(Error::response(format!("unknown mission status: {other:?}")));
            }
        };
        return Ok(MissionInfo {
            status,
            file_path: Some(path.to_string()),
        });
    }

    Err(Error::response("no mission status in response"))
}
