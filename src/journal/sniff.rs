// SPDX-License-Identifier: Apache-2.0

//! Byte-level event name extraction.
//!
//! Finds the `"event"` key in a raw journal line and returns its string value
//! without decoding the line. Used to drop unwanted lines before paying for
//! a full JSON decode.

const EVENT_KEY: &[u8] = b"\"event\"";

/// The value of the `event` key in `line`.
///
/// `None` means inconclusive: no key, an escaped or non-string value, or a
/// malformed line. Callers then decode and check the record instead.
///
/// Assumes a flat line whose first `"event"` key is the top-level one; a
/// nested object carrying its own `"event"` earlier in the line is misread.
pub fn event_name(line: &[u8]) -> Option<&str> {
    let start = find(line, EVENT_KEY)? + EVENT_KEY.len();
    let rest = skip_whitespace(&line[start..]);
    let rest = skip_whitespace(rest.strip_prefix(b":")?);
    let rest = rest.strip_prefix(b"\"")?;

    let end = rest.iter().position(|&b| b == b'"' || b == b'\\')?;
    if rest[end] == b'\\' {
        return None;
    }

    std::str::from_utf8(&rest[..end]).ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    &bytes[skip..]
}
