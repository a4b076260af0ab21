//! Pending outbound requests and their on-disk line format.
//!
//! Each entry is stored as `destination|raw_request|enqueue_timestamp`. The
//! destination is split off at the first `|` and the timestamp at the last,
//! so a raw request may itself contain `|` (directory payloads do). Raw
//! requests may also span several lines; backslashes and newlines are
//! escaped so every entry stays on one line.

/// Separator between the three fields of a queue line.
pub const QUEUE_SEPARATOR: char = '|';

/// A request that could not be delivered and waits for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Address the request was meant for.
    pub destination: String,
    /// Fully-formed request string, exactly as first attempted.
    pub raw_request: String,
    /// When the request was queued, `YYYY-MM-DD HH:MM:SS`.
    pub enqueued_at: String,
}

impl PendingRequest {
    /// Render as a single queue line (no trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.destination,
            escape(&self.raw_request),
            self.enqueued_at,
            sep = QUEUE_SEPARATOR
        )
    }

    /// Parse a queue line. Returns `None` for blank or malformed lines.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        let (destination, rest) = line.split_once(QUEUE_SEPARATOR)?;
        let (raw, enqueued_at) = rest.rsplit_once(QUEUE_SEPARATOR)?;
        if destination.is_empty() {
            return None;
        }
        Some(Self {
            destination: destination.to_string(),
            raw_request: unescape(raw),
            enqueued_at: enqueued_at.to_string(),
        })
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
