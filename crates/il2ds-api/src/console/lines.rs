// Byte-stream to logical-line reassembly.
//
// The server frames console output twice: transport messages end with
// `\r\n`, and inside a message every logical line ends with the escaped
// delimiter `\n` (backslash + 'n'). A logical line may span several
// transport messages, and a transport message may carry several logical
// lines, so neither framing alone is enough. The reassembler additionally
// recognizes two sentinel shapes: the command-prompt marker
// `<consoleN><NUMBER>` (end of a response batch) and the bare prompt
// continuation `NUMBER>` (noise, dropped).

use super::{LINE_DELIMITER, MSG_DELIMITER};

/// One reassembled item from the inbound console stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineEvent {
    /// A complete logical line with all delimiters stripped.
    Line(String),
    /// The command-prompt marker: the current response batch is complete.
    Prompt,
}

const PROMPT_PREFIX: &str = "<consoleN><";

/// `<consoleN><NUMBER>` — the prompt counter is maintained by the server
/// and carries no correlation value; only the shape matters.
fn is_prompt(candidate: &str) -> bool {
    candidate
        .strip_prefix(PROMPT_PREFIX)
        .and_then(|rest| rest.strip_suffix('>'))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Bare `NUMBER>` — printed when the server re-issues the prompt on its
/// own terminal; protocol noise to us.
fn is_continuation(candidate: &str) -> bool {
    candidate
        .strip_suffix('>')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Line,
    Message,
}

impl Delimiter {
    fn len(self) -> usize {
        match self {
            Self::Line => LINE_DELIMITER.len(),
            Self::Message => MSG_DELIMITER.len(),
        }
    }
}

/// Position and kind of the earliest delimiter in `text`.
fn next_delimiter(text: &str) -> Option<(usize, Delimiter)> {
    let line = text.find(LINE_DELIMITER);
    let message = text.find(MSG_DELIMITER);
    match (line, message) {
        (Some(l), Some(m)) if l < m => Some((l, Delimiter::Line)),
        (_, Some(m)) => Some((m, Delimiter::Message)),
        (Some(l), None) => Some((l, Delimiter::Line)),
        (None, None) => None,
    }
}

/// Incremental reassembler. Feed it arbitrary inbound chunks; it yields
/// logical lines and prompt signals, buffering partial input in between.
/// Classification is independent of how the stream was split into chunks.
#[derive(Debug, Default)]
pub(crate) struct LineReassembler {
    pending: String,
}

impl LineReassembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn feed(&mut self, chunk: &str) -> Vec<LineEvent> {
        let mut text = std::mem::take(&mut self.pending);
        text.push_str(chunk);

        let mut out = Vec::new();
        let mut rest = text.as_str();
        // Carries a partial logical line across transport-message
        // boundaries within this call.
        let mut carry = String::new();

        loop {
            let Some((idx, delimiter)) = next_delimiter(rest) else {
                carry.push_str(rest);
                // A bare prompt marker arrives without any delimiter of
                // its own right behind the last response line.
                if is_prompt(&carry) {
                    out.push(LineEvent::Prompt);
                } else if !carry.is_empty() {
                    self.pending = carry;
                }
                return out;
            };

            carry.push_str(&rest[..idx]);
            rest = &rest[idx + delimiter.len()..];
            let candidate = std::mem::take(&mut carry);

            if is_prompt(&candidate) {
                out.push(LineEvent::Prompt);
                continue;
            }
            if is_continuation(&candidate) {
                continue;
            }
            match delimiter {
                // Logical delimiter: the line is complete.
                Delimiter::Line => out.push(LineEvent::Line(candidate)),
                // Transport boundary mid-line: the next message continues it.
                Delimiter::Message => carry = candidate,
            }
        }
    }
}
