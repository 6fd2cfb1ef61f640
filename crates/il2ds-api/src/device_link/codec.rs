// Device Link datagram codec.
//
// Wire layout: a direction prefix (`R` request, `A` answer) followed by
// `/`-separated messages. A message is a decimal opcode, optionally
// followed by `\` and a value. Inside values `\` and `/` are escaped
// with a leading backslash so they survive the separators.

use thiserror::Error;

/// One opcode/value pair inside a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Message {
    pub(crate) opcode: u16,
    pub(crate) value: Option<String>,
}

impl Message {
    pub(crate) fn new(opcode: u16) -> Self {
        Self {
            opcode,
            value: None,
        }
    }

    pub(crate) fn with_value(opcode: u16, value: impl Into<String>) -> Self {
        Self {
            opcode,
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DatagramKind {
    Request,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Datagram {
    pub(crate) kind: DatagramKind,
    pub(crate) messages: Vec<Message>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum DecodeError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown datagram prefix {0:?}")]
    UnknownPrefix(char),
    #[error("malformed opcode {0:?}")]
    BadOpcode(String),
}

/// Render a datagram into its wire form.
pub(crate) fn compose(datagram: &Datagram) -> String {
    let mut out = String::from(match datagram.kind {
        DatagramKind::Request => "R",
        DatagramKind::Answer => "A",
    });
    for message in &datagram.messages {
        out.push('/');
        out.push_str(&message.opcode.to_string());
        if let Some(value) = &message.value {
            out.push('\\');
            out.push_str(&escape_value(value));
        }
    }
    out
}

/// Parse a wire datagram. Trailing newlines are tolerated; anything
/// else malformed is an error, since a datagram cannot be resynced.
pub(crate) fn decompose(text: &str) -> Result<Datagram, DecodeError> {
    let text = text.trim_end_matches(['\r', '\n']);
    let mut chars = text.chars();
    let kind = match chars.next() {
        None => return Err(DecodeError::Empty),
        Some('R') => DatagramKind::Request,
        Some('A') => DatagramKind::Answer,
        Some(other) => return Err(DecodeError::UnknownPrefix(other)),
    };

    let mut messages = Vec::new();
    for token in split_tokens(chars.as_str()) {
        if token.is_empty() {
            continue;
        }
        let (raw_opcode, raw_value) = match token.split_once('\\') {
            Some((opcode, value)) => (opcode, Some(value)),
            None => (token.as_str(), None),
        };
        let opcode = raw_opcode
            .parse::<u16>()
            .map_err(|_| DecodeError::BadOpcode(raw_opcode.to_string()))?;
        messages.push(Message {
            opcode,
            value: raw_value.map(unescape_value),
        });
    }

    Ok(Datagram { kind, messages })
}

/// Split the body on unescaped `/`, keeping escape sequences intact for
/// the per-token pass. The first `\` of a token is the opcode/value
/// separator, not an escape; only backslashes inside the value escape
/// the character after them.
fn split_tokens(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_value = false;
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            if in_value {
                escaped = true;
            } else {
                in_value = true;
            }
        } else if c == '/' {
            tokens.push(std::mem::take(&mut current));
            in_value = false;
        } else {
            current.push(c);
        }
    }
    tokens.push(current);
    tokens
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '/' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            // A trailing lone backslash stays as-is.
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}
