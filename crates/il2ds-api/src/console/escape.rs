// Console payload escaping.
//
// Chat payloads travel inside the console's own line framing, where a
// literal newline or backslash would corrupt the stream. The server and
// client both use backslash escapes, with `\uXXXX` for anything outside
// printable ASCII.

/// Escape a chat payload for the wire.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if (' '..='~').contains(&ch) => out.push(ch),
            ch => {
                for unit in ch.encode_utf16(&mut [0u16; 2]) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out
}

/// Undo [`escape`] on an inbound payload. Malformed escapes are kept
/// verbatim rather than rejected: chat content is display data, not
/// protocol structure.
pub(crate) fn unescape(text: &str) -> String {
    // A high surrogate that cannot pair with what follows becomes
    // U+FFFD rather than vanishing.
    fn flush_pending(out: &mut String, utf16_high: &mut Option<u16>) {
        if utf16_high.take().is_some() {
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }

    fn push_unit(out: &mut String, unit: u16) {
        out.extend(
            char::decode_utf16([unit]).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
        );
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    let mut utf16_high: Option<u16> = None;

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            flush_pending(&mut out, &mut utf16_high);
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u16::from_str_radix(&hex, 16) {
                    // Recombine surrogate pairs from consecutive \u
                    // escapes.
                    Ok(unit) if (0xd800..0xdc00).contains(&unit) => {
                        flush_pending(&mut out, &mut utf16_high);
                        utf16_high = Some(unit);
                    }
                    Ok(unit) => {
                        if let Some(high) = utf16_high.take() {
                            if (0xdc00..0xe000).contains(&unit) {
                                out.extend(char::decode_utf16([high, unit]).map(|r| {
                                    r.unwrap_or(char::REPLACEMENT_CHARACTER)
                                }));
                            } else {
                                out.push(char::REPLACEMENT_CHARACTER);
                                push_unit(&mut out, unit);
                            }
                        } else {
                            push_unit(&mut out, unit);
                        }
                    }
                    Err(_) => {
                        flush_pending(&mut out, &mut utf16_high);
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            other => {
                flush_pending(&mut out, &mut utf16_high);
                match other {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('\\') => out.push('\\'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                }
            }
        }
    }
    flush_pending(&mut out, &mut utf16_high);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(escape("attack at dawn!"), "attack at dawn!");
        assert_eq!(unescape("attack at dawn!"), "attack at dawn!");
    }

    #[test]
    fn control_characters_round_trip() {
        let raw = "line one\nline two\ttabbed \\ slashed";
        let escaped = escape(raw);
        assert!(!escaped.contains('\n'));
        assert_eq!(unescape(&escaped), raw);
    }

    #[test]
    fn non_ascii_round_trips_through_u_escapes() {
        let raw = "Привет";
        let escaped = escape(raw);
        assert!(escaped.is_ascii());
        assert_eq!(unescape(&escaped), raw);
    }

    #[test]
    fn astral_plane_round_trips_as_surrogate_pair() {
        let raw = "🛩 contact";
        assert_eq!(unescape(&escape(raw)), raw);
    }

    #[test]
    fn malformed_escape_kept_verbatim() {
        assert_eq!(unescape("bad \\q escape"), "bad \\q escape");
        assert_eq!(unescape("truncated \\uzz"), "truncated \\uzz");
    }

    #[test]
    fn unpaired_high_surrogate_becomes_replacement() {
        // Followed by a literal character.
        assert_eq!(unescape("\\ud83d!"), "\u{fffd}!");
        // Followed by a simple escape.
        assert_eq!(unescape("\\ud83d\\n"), "\u{fffd}\n");
        // Followed by a non-surrogate unit.
        assert_eq!(unescape("\\ud83d\\u0041"), "\u{fffd}A");
        // At end of input.
        assert_eq!(unescape("tail \\ud83d"), "tail \u{fffd}");
    }

    #[test]
    fn lone_low_surrogate_becomes_replacement() {
        assert_eq!(unescape("\\ude29!"), "\u{fffd}!");
    }
}
