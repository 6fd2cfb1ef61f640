// Console protocol client modules
//
// The console is the server's human-facing TCP text interface. Responses
// carry no request identifiers: a batch of reply lines is complete when
// the server prints its command-prompt marker. The modules here split the
// problem the same way the wire does: byte-to-line reassembly, out-of-band
// event extraction, request dispatch, and typed response parsing.

pub mod client;
mod escape;
mod events;
mod lines;
mod parse;
mod requests;

pub use client::{ChatTarget, ConsoleClient, ConsoleSettings};

/// Transport-level message delimiter (stripped on receive, never part of
/// a logical line).
pub(crate) const MSG_DELIMITER: &str = "\r\n";

/// Logical line delimiter: the two characters `\` `n`. The server
/// terminates every logical line with this escaped form rather than a
/// real newline.
pub(crate) const LINE_DELIMITER: &str = "\\n";

/// Longest chat payload the server accepts on one wire line.
pub(crate) const CHAT_MAX_LENGTH: usize = 80;
