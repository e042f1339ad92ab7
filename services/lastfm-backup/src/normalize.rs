//!
//! src/normalize.rs  Andrew Belles  Oct 18th, 2026
//!
//! Strict intermediate schema for one history page and the conversion
//! of its entries into canonical scrobbles. Shape violations fail here
//! instead of leaking half filled records into the store.
//!

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::BackupError;
use crate::types::{Scrobble, ScrobbleType};

/// One parsed page: reported page count plus entries in source order
#[derive(Debug)]
pub struct Page {
    pub total_pages: u32,
    pub entries: Vec<RawTrack>
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(default, deserialize_with = "one_or_many")]
    track: Vec<RawTrack>,
    #[serde(rename = "@attr")]
    attr: RawPageAttr
}

#[derive(Debug, Deserialize)]
struct RawPageAttr {
    #[serde(rename = "totalPages", deserialize_with = "lenient_u32")]
    total_pages: u32
}

/// Artist/album object; recent tracks carry the label under "#text",
/// loved tracks under "name"
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNamed {
    #[serde(rename = "#text")]
    text: Option<String>,
    name: Option<String>,
    mbid: Option<String>
}

impl RawNamed {
    fn label(&self, kind: ScrobbleType) -> Option<&str> {
        match kind {
            ScrobbleType::Recent => self.text.as_deref(),
            ScrobbleType::Loved  => self.name.as_deref()
        }
    }

    fn mbid(&self) -> String {
        self.mbid.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDate {
    uts: Value
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTrackAttr {
    nowplaying: Option<Value>
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    name: Option<String>,
    mbid: Option<String>,
    artist: Option<RawNamed>,
    album: Option<RawNamed>,
    date: Option<RawDate>,
    #[serde(rename = "@attr")]
    attr: Option<RawTrackAttr>
}

impl RawTrack {
    fn is_now_playing(&self) -> bool {
        match self.attr.as_ref().and_then(|a| a.nowplaying.as_ref()) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty() && s != "false" && s != "0",
            Some(Value::Number(n)) => n.as_i64() != Some(0),
            _ => false
        }
    }
}

/// The api collapses a one element list into a bare object
fn one_or_many<'de, D>(de: D) -> Result<Vec<RawTrack>, D::Error>
where
    D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<RawTrack>),
        One(Box<RawTrack>)
    }

    Ok(match OneOrMany::deserialize(de)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(t) => vec![*t]
    })
}

/// Page counts arrive as strings ("12") but accept plain numbers too
fn lenient_u32<'de, D>(de: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrInt {
        Int(u32),
        Str(String)
    }

    match StrOrInt::deserialize(de)? {
        StrOrInt::Int(n) => Ok(n),
        StrOrInt::Str(s) => s.trim().parse::<u32>().map_err(serde::de::Error::custom)
    }
}

fn malformed(what: impl Into<String>) -> BackupError {
    BackupError::Malformed(what.into())
}

/// Pull `<collection>.track` and `<collection>["@attr"].totalPages` out of
/// a raw response
pub fn parse_page(body: &Value, kind: ScrobbleType) -> Result<Page, BackupError> {
    let collection = body.get(kind.as_str()).ok_or_else(|| {
        malformed(format!("response has no {} object", kind.as_str()))
    })?;

    let raw = RawCollection::deserialize(collection)
        .map_err(|e| malformed(format!("{}: {e}", kind.as_str())))?;

    Ok( Page { total_pages: raw.attr.total_pages, entries: raw.track } )
}

fn parse_uts(uts: &Value) -> Result<i64, BackupError> {
    match uts {
        Value::String(s) => s.trim().parse::<i64>()
            .map_err(|e| malformed(format!("date.uts {s:?}: {e}"))),
        Value::Number(n) => n.as_i64()
            .ok_or_else(|| malformed(format!("date.uts {n} is not an integer"))),
        other => Err(malformed(format!("date.uts has unexpected value {other}")))
    }
}

/// Turn one page entry into a scrobble, or `None` for the "now playing"
/// entry at the head of the recent tracks listing
pub fn normalize(entry: &RawTrack, kind: ScrobbleType) ->
    Result<Option<Scrobble>, BackupError> {
    if kind == ScrobbleType::Recent && entry.is_now_playing() {
        return Ok(None);
    }

    let artist = entry.artist.as_ref().ok_or_else(|| malformed("entry without artist"))?;
    let artist_name = artist.label(kind)
        .ok_or_else(|| malformed("artist without a name"))?;
    let track = entry.name.as_deref()
        .ok_or_else(|| malformed("entry without track name"))?;
    let date = entry.date.as_ref()
        .ok_or_else(|| malformed(format!("{track:?} has no date")))?;
    let timestamp = parse_uts(&date.uts)?;

    let (album, album_mbid) = match &entry.album {
        Some(album) => (album.label(kind).unwrap_or_default().to_string(), album.mbid()),
        None => (String::new(), String::new())
    };

    Ok(Some(Scrobble {
        timestamp,
        artist: artist_name.to_string(),
        artist_mbid: artist.mbid(),
        track: track.to_string(),
        track_mbid: entry.mbid.clone().unwrap_or_default(),
        album,
        album_mbid,
        kind
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn normalize_page(page: &Page, kind: ScrobbleType) -> Result<Vec<Scrobble>, BackupError> {
        let mut out = Vec::new();
        for entry in &page.entries {
            out.extend(normalize(entry, kind)?);
        }
        Ok(out)
    }

    fn recent_body() -> Value {
        json!({
            "recenttracks": {
                "track": [
                    {
                        "artist": {"mbid": "", "#text": "Tame Impala"},
                        "@attr": {"nowplaying": "true"},
                        "mbid": "",
                        "album": {"mbid": "", "#text": "Currents"},
                        "name": "Let It Happen"
                    },
                    {
                        "artist": {"mbid": "63aa26c3", "#text": "Tame Impala"},
                        "mbid": "t-1",
                        "album": {"mbid": "a-1", "#text": "Currents"},
                        "name": "Eventually",
                        "date": {"uts": "1700000100", "#text": "14 Nov 2023, 22:15"}
                    },
                    {
                        "artist": {"mbid": "", "#text": "Boards of Canada"},
                        "mbid": "",
                        "album": {"mbid": "", "#text": ""},
                        "name": "Roygbiv",
                        "date": {"uts": "1700000000"}
                    }
                ],
                "@attr": {"user": "alice", "page": "1", "totalPages": "12", "total": "2400"}
            }
        })
    }

    #[test]
    fn recent_page_skips_now_playing() {
        let page = parse_page(&recent_body(), ScrobbleType::Recent).unwrap();
        assert_eq!(page.total_pages, 12);
        assert_eq!(page.entries.len(), 3);

        let scrobbles = normalize_page(&page, ScrobbleType::Recent).unwrap();
        assert_eq!(scrobbles.len(), 2);
        assert_eq!(scrobbles[0], Scrobble {
            timestamp: 1_700_000_100,
            artist: "Tame Impala".into(),
            artist_mbid: "63aa26c3".into(),
            track: "Eventually".into(),
            track_mbid: "t-1".into(),
            album: "Currents".into(),
            album_mbid: "a-1".into(),
            kind: ScrobbleType::Recent
        });
        assert_eq!(scrobbles[1].timestamp, 1_700_000_000);
        assert_eq!(scrobbles[1].album, "");
    }

    #[test]
    fn loved_entries_read_name_and_default_album() {
        let body = json!({
            "lovedtracks": {
                "track": [{
                    "artist": {"name": "Radiohead", "mbid": "a74b1b7f", "url": "x"},
                    "mbid": "",
                    "name": "Reckoner",
                    "date": {"uts": "1600000000"},
                    "@attr": {"nowplaying": "true"}
                }],
                "@attr": {"totalPages": 1}
            }
        });

        let page = parse_page(&body, ScrobbleType::Loved).unwrap();
        let scrobbles = normalize_page(&page, ScrobbleType::Loved).unwrap();

        // the nowplaying marker means nothing for loved tracks
        assert_eq!(scrobbles.len(), 1);
        let s = &scrobbles[0];
        assert_eq!(s.artist, "Radiohead");
        assert_eq!(s.artist_mbid, "a74b1b7f");
        assert_eq!((s.album.as_str(), s.album_mbid.as_str()), ("", ""));
        assert_eq!(s.kind, ScrobbleType::Loved);
    }

    #[test]
    fn single_entry_object_and_empty_history() {
        let single = json!({
            "lovedtracks": {
                "track": {
                    "artist": {"name": "Low", "mbid": ""},
                    "name": "Lullaby",
                    "date": {"uts": "42"}
                },
                "@attr": {"totalPages": "1"}
            }
        });
        let page = parse_page(&single, ScrobbleType::Loved).unwrap();
        assert_eq!(page.entries.len(), 1);

        let empty = json!({"recenttracks": {"track": [], "@attr": {"totalPages": "0"}}});
        let page = parse_page(&empty, ScrobbleType::Recent).unwrap();
        assert_eq!(page.total_pages, 0);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn bad_timestamp_fails_the_page() {
        let body = json!({
            "recenttracks": {
                "track": [{
                    "artist": {"#text": "Low"},
                    "name": "Lullaby",
                    "date": {"uts": "yesterday"}
                }],
                "@attr": {"totalPages": "1"}
            }
        });
        let page = parse_page(&body, ScrobbleType::Recent).unwrap();
        assert!(matches!(
            normalize_page(&page, ScrobbleType::Recent),
            Err(BackupError::Malformed(_))
        ));
    }

    #[test]
    fn missing_structure_is_malformed() {
        let wrong_type = json!({"lovedtracks": {"track": [], "@attr": {"totalPages": "1"}}});
        assert!(matches!(
            parse_page(&wrong_type, ScrobbleType::Recent),
            Err(BackupError::Malformed(_))
        ));

        let no_attr = json!({"recenttracks": {"track": []}});
        assert!(matches!(
            parse_page(&no_attr, ScrobbleType::Recent),
            Err(BackupError::Malformed(_))
        ));

        // loved entry read with the recent layout has no "#text"
        let body = json!({
            "lovedtracks": {
                "track": [{"artist": {"name": "Low"}, "name": "x", "date": {"uts": "1"}}],
                "@attr": {"totalPages": "1"}
            }
        });
        let page = parse_page(&body, ScrobbleType::Loved).unwrap();
        assert!(matches!(
            normalize(&page.entries[0], ScrobbleType::Recent),
            Err(BackupError::Malformed(_))
        ));
    }
}
