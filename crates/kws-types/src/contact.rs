//! Contacts and the serialized directory format.
//!
//! A directory is exchanged (and stored on disk) as plain text, one contact
//! per line:
//!
//! ```text
//! username;identity;last_contact;display_name;address;status|
//! ```
//!
//! The trailing `|` is always written and optional on read. Lines with fewer
//! than six fields are dropped without complaint.

use std::fmt;

/// Field separator inside a directory line.
pub const FIELD_SEPARATOR: char = ';';

/// Optional line terminator written after the last field.
pub const LINE_TERMINATOR: char = '|';

/// Number of fields in a directory line.
pub const CONTACT_FIELDS: usize = 6;

/// Last known reachability of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactStatus {
    /// The last probe was answered.
    Online,
    /// The last probe failed, or the peer was never probed.
    #[default]
    Offline,
}

impl ContactStatus {
    /// Wire/disk spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Online => "online",
            ContactStatus::Offline => "offline",
        }
    }

    /// Parse the wire/disk spelling. Anything unrecognised reads as offline.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("online") {
            ContactStatus::Online
        } else {
            ContactStatus::Offline
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One known peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// The peer's self-chosen user name.
    pub username: String,
    /// Opaque unique token naming the peer. Unique within a directory.
    pub identity: String,
    /// Last successful contact, `YYYY-MM-DD HH:MM:SS`.
    pub last_seen: String,
    /// Human-assigned label. Not unique.
    pub display_name: String,
    /// Reachable endpoint: a host, or `host:port`.
    pub address: String,
    /// Last known reachability.
    pub status: ContactStatus,
}

impl Contact {
    /// Parse a single directory line.
    ///
    /// Returns `None` for blank lines and lines with fewer than six fields.
    /// Fields past the sixth are ignored.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let line = line.strip_suffix(LINE_TERMINATOR).unwrap_or(line);
        if line.is_empty() {
            return None;
        }
        let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if parts.len() < CONTACT_FIELDS {
            return None;
        }
        Some(Self {
            username: parts[0].to_string(),
            identity: parts[1].to_string(),
            last_seen: parts[2].to_string(),
            display_name: parts[3].to_string(),
            address: parts[4].to_string(),
            status: ContactStatus::parse(parts[5]),
        })
    }

    /// Render this contact as a directory line, including the trailing `|`.
    pub fn to_line(&self) -> String {
        format!(
            "{};{};{};{};{};{}{}",
            self.username,
            self.identity,
            self.last_seen,
            self.display_name,
            self.address,
            self.status,
            LINE_TERMINATOR
        )
    }

    /// True if `selector` is this contact's identity or display name.
    pub fn matches(&self, selector: &str) -> bool {
        self.identity == selector || self.display_name == selector
    }
}

/// Parse a serialized directory. Malformed lines are skipped.
pub fn parse_directory(text: &str) -> Vec<Contact> {
    text.lines().filter_map(Contact::from_line).collect()
}

/// Serialize a directory, one line per contact, newline-terminated.
pub fn serialize_directory(contacts: &[Contact]) -> String {
    let mut out = String::new();
    for contact in contacts {
        out.push_str(&contact.to_line());
        out.push('\n');
    }
    out
}
