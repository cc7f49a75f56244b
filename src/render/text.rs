//! Character-level helpers shared by every rendered line.
//!
//! Lengths are counted in `char`s, which is what the chatbox counts.

/// Longest line the chatbox accepts.
pub const MAX_MESSAGE_LEN: usize = 144;

pub const ELLIPSIS: char = '…';

/// Milliseconds as `M:SS`. Minutes are not wrapped into hours.
pub fn ms_to_clock(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Cut `s` to `limit` chars, the last one being an ellipsis.
///
/// Limits below 2 mean "no limit".
pub fn shorten(s: &str, limit: usize) -> String {
    if limit < 2 || s.chars().count() <= limit {
        return s.to_string();
    }
    let mut out: String = s.chars().take(limit - 1).collect();
    out.push(ELLIPSIS);
    out
}

/// Drop every character outside 7-bit ASCII.
pub fn fold_ascii(s: &str) -> String {
    s.chars().filter(char::is_ascii).collect()
}

/// Apply `fold_ascii` only when asked to.
pub fn maybe_ascii(s: String, ascii_only: bool) -> String {
    if ascii_only {
        fold_ascii(&s)
    } else {
        s
    }
}

/// Hard cap for one chatbox line.
pub fn trim_chatbox(s: &str) -> String {
    shorten(s, MAX_MESSAGE_LEN)
}

/// Runs of whitespace become one space; ends are trimmed.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
