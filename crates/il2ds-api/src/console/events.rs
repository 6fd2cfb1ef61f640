// Out-of-band console traffic.
//
// Two concerns live here, both independent of the request in flight:
//
//  * event extraction — chat lines and human-connection lifecycle lines
//    are parsed into typed events and never count as response content;
//  * foreign-input detection — a completed batch that contains an echo of
//    an interactive command, an unrecognized-command notice, or one of
//    the server's own announcements is an artifact of someone typing on
//    the same console session, not the reply to our request.

use il2ds_core::{ChatMessage, ConnectionEvent};

use super::escape::unescape;

// ── Event extraction ─────────────────────────────────────────────────

/// A console line recognized as an out-of-band event.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConsoleEvent {
    Chat(ChatMessage),
    Connection(ConnectionEvent),
}

/// Offer a logical line to the event matchers, first match wins.
pub(crate) fn match_event(line: &str) -> Option<ConsoleEvent> {
    if let Some(chat) = parse_chat(line) {
        return Some(ConsoleEvent::Chat(chat));
    }
    if let Some(event) = parse_connection_started(line)
        .or_else(|| parse_connected(line))
        .or_else(|| parse_disconnected(line))
    {
        return Some(ConsoleEvent::Connection(event));
    }
    None
}

/// Callsign the server signs its own chat announcements with.
const SERVER_CHAT_AUTHOR: &str = "Server";

/// `Chat: {author}: \t{escaped body}`
fn parse_chat(line: &str) -> Option<ChatMessage> {
    let rest = line.strip_prefix("Chat: ")?;
    let (author, body) = rest.split_once(": \t")?;
    let author = if author == SERVER_CHAT_AUTHOR {
        None
    } else {
        Some(author.to_string())
    };
    Some(ChatMessage {
        author,
        body: unescape(body),
    })
}

/// `socket channel '{N}' start creating: ip {host}:{port}`
fn parse_connection_started(line: &str) -> Option<ConnectionEvent> {
    let rest = line.strip_prefix("socket channel '")?;
    let (channel, address) = rest.split_once("' start creating: ip ")?;
    Some(ConnectionEvent::Started {
        channel: channel.parse().ok()?,
        address: address.trim().to_string(),
    })
}

/// `socket channel '{N}', ip {host}:{port}, {callsign}, is complete created`
fn parse_connected(line: &str) -> Option<ConnectionEvent> {
    let rest = line.strip_prefix("socket channel '")?;
    let (channel, rest) = rest.split_once("', ip ")?;
    let rest = rest.strip_suffix(", is complete created")?;
    let (address, callsign) = rest.split_once(", ")?;
    Some(ConnectionEvent::Connected {
        channel: channel.parse().ok()?,
        address: address.to_string(),
        callsign: callsign.to_string(),
    })
}

/// `socketConnection with {host}:{port} on channel {N} lost.  Reason: {text}`
fn parse_disconnected(line: &str) -> Option<ConnectionEvent> {
    let rest = line.strip_prefix("socketConnection with ")?;
    let (address, rest) = rest.split_once(" on channel ")?;
    let (channel, reason) = rest.split_once(" lost.  Reason: ")?;
    Some(ConnectionEvent::Disconnected {
        channel: channel.parse().ok()?,
        address: address.to_string(),
        reason: reason.trim().to_string(),
    })
}

// ── Foreign-input detection ──────────────────────────────────────────

/// Interactive commands the server echoes when typed on its own console.
const COMMAND_KEYWORDS: &[&str] = &[
    "help", "server", "user", "chat", "kick", "mission", "difficulty", "timeout", "console",
    "window", "exit", "file", "history",
];

/// Printed by the server for input it does not understand.
const UNKNOWN_COMMAND_PREFIX: &str = "Command not found";

/// Prefix of the server's own automated console announcements.
const SERVER_ANNOUNCEMENT_PREFIX: &str = "Server: ";

fn is_command_echo(line: &str) -> bool {
    let trimmed = line.trim();
    let keyword = trimmed
        .split_once(char::is_whitespace)
        .map_or(trimmed, |(head, _)| head);
    COMMAND_KEYWORDS.contains(&keyword)
}

fn is_foreign_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(UNKNOWN_COMMAND_PREFIX) || trimmed.starts_with(SERVER_ANNOUNCEMENT_PREFIX)
}

/// Whether a completed batch is an artifact of manual input on the same
/// console session. Such a batch must be discarded without touching the
/// pending request: its real response has not arrived yet.
///
/// A command echo arrives alone: the server re-issues the prompt right
/// after the echoed input, before any of its output. The keyword check
/// therefore only applies to single-line batches, so a listing row whose
/// first column happens to spell a command keyword (a pilot with the
/// callsign `kick`) cannot poison a genuine response.
pub(crate) fn is_foreign_batch(lines: &[String]) -> bool {
    if let [only] = lines {
        if is_command_echo(only) {
            return true;
        }
    }
    lines.iter().any(|line| is_foreign_line(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chat_from_pilot() {
        let event = match_event("Chat: user0: \tgood hunting");
        assert_eq!(
            event,
            Some(ConsoleEvent::Chat(ChatMessage {
                author: Some("user0".into()),
                body: "good hunting".into(),
            }))
        );
    }

    #[test]
    fn chat_from_server_has_no_author() {
        let Some(ConsoleEvent::Chat(chat)) = match_event("Chat: Server: \tmission rotating") else {
            panic!("expected a chat event");
        };
        assert_eq!(chat.author, None);
        assert_eq!(chat.body, "mission rotating");
    }

    #[test]
    fn chat_body_is_unescaped() {
        let Some(ConsoleEvent::Chat(chat)) =
            match_event("Chat: user1: \tfirst\\nsecond \\u043f\\u0440\\u0438\\u0432")
        else {
            panic!("expected a chat event");
        };
        assert_eq!(chat.body, "first\nsecond прив");
    }

    #[test]
    fn connection_lifecycle_lines() {
        assert_eq!(
            match_event("socket channel '0' start creating: ip 192.168.1.2:21000"),
            Some(ConsoleEvent::Connection(ConnectionEvent::Started {
                channel: 0,
                address: "192.168.1.2:21000".into(),
            }))
        );
        assert_eq!(
            match_event("socket channel '0', ip 192.168.1.2:21000, user0, is complete created"),
            Some(ConsoleEvent::Connection(ConnectionEvent::Connected {
                channel: 0,
                address: "192.168.1.2:21000".into(),
                callsign: "user0".into(),
            }))
        );
        assert_eq!(
            match_event(
                "socketConnection with 192.168.1.2:21000 on channel 0 lost.  Reason: timeout"
            ),
            Some(ConsoleEvent::Connection(ConnectionEvent::Disconnected {
                channel: 0,
                address: "192.168.1.2:21000".into(),
                reason: "timeout".into(),
            }))
        );
    }

    #[test]
    fn ordinary_response_lines_are_not_events() {
        assert_eq!(match_event("Mission: net/dogfight/1.mis is Playing"), None);
        assert_eq!(match_event("Type: Local server"), None);
    }

    #[test]
    fn command_echo_marks_batch_foreign() {
        let batch = vec!["mission".to_string()];
        assert!(is_foreign_batch(&batch));

        let batch = vec!["kick user0".to_string()];
        assert!(is_foreign_batch(&batch));
    }

    #[test]
    fn unknown_command_notice_marks_batch_foreign() {
        let batch = vec!["Command not found: missoin".to_string()];
        assert!(is_foreign_batch(&batch));
    }

    #[test]
    fn genuine_responses_are_not_foreign() {
        let batch = vec![
            "Mission: net/dogfight/1.mis is Playing".to_string(),
            "Type: Local server".to_string(),
        ];
        assert!(!is_foreign_batch(&batch));
    }

    #[test]
    fn keyword_callsign_row_does_not_poison_a_listing() {
        // A pilot whose callsign equals a command keyword shows up as
        // the first column of a listing row. Only single-line batches
        // can be command echoes.
        let batch = vec![
            " N  Name  Ping  Score  Army".to_string(),
            "kick 30 0 (1)Red".to_string(),
            "user 45 0 (2)Blue".to_string(),
        ];
        assert!(!is_foreign_batch(&batch));
    }
}
