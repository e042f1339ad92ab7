//!
//! src/types.rs  Andrew Belles  Oct 18th, 2026
//!
//! Canonical record types shared by the sync engine, the store,
//! the exporter and the stats reporter
//!

use std::fmt;

use crate::errors::BackupError;

/// The two histories last.fm exposes per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrobbleType {
    Recent,
    Loved
}

impl ScrobbleType {
    /// Collection key used both in the api response and the table name
    pub fn as_str(self) -> &'static str {
        match self {
            ScrobbleType::Recent => "recenttracks",
            ScrobbleType::Loved  => "lovedtracks"
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            ScrobbleType::Recent => "user.getrecenttracks",
            ScrobbleType::Loved  => "user.getlovedtracks"
        }
    }
}

impl fmt::Display for ScrobbleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// last.fm user name; letter first, then letters, digits, '-' or '_'
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn parse(s: &str) -> Result<Self, BackupError> {
        let mut chars = s.chars();
        let valid = match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                let rest = chars.as_str();
                !rest.is_empty() && rest.chars().all(|c| {
                    c.is_ascii_alphanumeric() || c == '-' || c == '_'
                })
            },
            _ => false
        };

        if !valid {
            return Err(BackupError::InvalidInput(format!(
                "invalid username {s:?} (only letters, numbers, - and _, \
                 must begin with a letter)"
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One independently synced stream: a user's history of a single type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    pub username: Username,
    pub kind: ScrobbleType
}

impl Partition {
    pub fn new(username: Username, kind: ScrobbleType) -> Self {
        Self { username, kind }
    }

    /// Bare table name, as listed in sqlite_master
    pub fn table_name(&self) -> String {
        format!("{}_{}", self.username, self.kind.as_str())
    }

    /// Quoted identifier of the backing table, e.g. "alice_recenttracks".
    /// Safe to splice into sql since `Username` is validated.
    pub fn table(&self) -> String {
        format!("\"{}\"", self.table_name())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.username, self.kind)
    }
}

/// One play (or love) event. Absent identifiers and albums are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrobble {
    pub timestamp: i64,
    pub artist: String,
    pub artist_mbid: String,
    pub track: String,
    pub track_mbid: String,
    pub album: String,
    pub album_mbid: String,
    pub kind: ScrobbleType
}
