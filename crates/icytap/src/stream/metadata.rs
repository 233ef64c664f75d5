//! Metadata types and ICY parsing
//!
//! Pure data types and parsing functions for ICY (Icecast/Shoutcast) metadata.
//! Nothing here performs I/O.

use std::collections::hash_map::{self, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::IcyError;

/// Key carrying the current track in most ICY streams
pub const STREAM_TITLE: &str = "StreamTitle";

/// Key carrying an optional URL (artwork, station page) in ICY streams
pub const STREAM_URL: &str = "StreamUrl";

/// Decoded key/value pairs from one metadata block.
///
/// Keys are unique; when a block repeats a key the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetadataRecord {
    fields: HashMap<String, String>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
        self.fields.iter()
    }

    /// `StreamTitle` value, if present
    pub fn stream_title(&self) -> Option<&str> {
        self.get(STREAM_TITLE)
    }

    /// `StreamUrl` value, if present
    pub fn stream_url(&self) -> Option<&str> {
        self.get(STREAM_URL)
    }

    /// Interpret `StreamTitle` as an artist/title pair.
    ///
    /// Returns `None` when the block carries no `StreamTitle` at all.
    pub fn now_playing(&self) -> Option<StreamMetadata> {
        self.stream_title().map(StreamMetadata::from_icy_title)
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.fields
    }
}

impl From<HashMap<String, String>> for MetadataRecord {
    fn from(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for MetadataRecord {
    type Item = (String, String);
    type IntoIter = hash_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a MetadataRecord {
    type Item = (&'a String, &'a String);
    type IntoIter = hash_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Now-playing information with artist/title split
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl StreamMetadata {
    /// Create metadata from an ICY title string.
    ///
    /// Splits on first ` - ` separator: "Artist - Title" → artist="Artist", title="Title".
    /// If no separator found, the whole string becomes the title.
    pub fn from_icy_title(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self {
                title: None,
                artist: None,
            };
        }

        match raw.split_once(" - ") {
            Some((artist, title)) => Self {
                title: non_empty(title),
                artist: non_empty(artist),
            },
            None => Self {
                title: Some(raw.to_string()),
                artist: None,
            },
        }
    }
}

impl fmt::Display for StreamMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.artist, &self.title) {
            (Some(a), Some(t)) => write!(f, "{a} - {t}"),
            (Some(a), None) => f.write_str(a),
            (None, Some(t)) => f.write_str(t),
            (None, None) => Ok(()),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parse the text of a metadata block into key/value pairs.
///
/// ICY metadata format: `StreamTitle='Artist - Song';StreamUrl='...';`
///
/// Segments are split on `;`. A segment without `=`, or with `=` as its first
/// character, is skipped. Values wrapped in a single-quote pair are unwrapped.
pub fn parse_metadata(text: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new();
    for segment in text.split(';') {
        let Some(eq) = segment.find('=') else {
            continue;
        };
        if eq == 0 {
            continue;
        }
        let key = &segment[..eq];
        let rest = &segment[eq + 1..];
        let value = if rest.len() >= 2 && rest.starts_with('\'') && rest.ends_with('\'') {
            &rest[1..rest.len() - 1]
        } else {
            rest
        };
        record.insert(key, value);
    }
    record
}

/// Character encoding of metadata text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl TextEncoding {
    /// Resolve an optional encoding label, defaulting to UTF-8.
    pub fn from_label(label: Option<&str>) -> Result<Self, IcyError> {
        label.map_or(Ok(Self::Utf8), str::parse::<Self>)
    }

    /// Canonical label
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }

    /// Strictly decode `bytes`.
    pub fn decode(self, bytes: &[u8]) -> Result<String, DecodeError> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| DecodeError {
                    encoding: self,
                    offset: e.valid_up_to(),
                }),
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(DecodeError {
                    encoding: self,
                    offset,
                }),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
        }
    }
}

impl FromStr for TextEncoding {
    type Err = IcyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Ok(Self::Latin1),
            "us-ascii" | "ascii" => Ok(Self::Ascii),
            _ => Err(IcyError::UnsupportedEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata bytes that are not valid in the configured encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    pub encoding: TextEncoding,
    /// Offset of the first offending byte
    pub offset: usize,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} sequence at byte {}",
            self.encoding, self.offset
        )
    }
}

impl std::error::Error for DecodeError {}

/// Decode a raw metadata block payload.
///
/// The payload is cut at the first NUL byte (blocks are NUL-padded to a
/// multiple of 16 bytes), then decoded with `encoding`.
pub fn decode_block(raw_block: &[u8], encoding: TextEncoding) -> Result<String, DecodeError> {
    let end = raw_block
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(raw_block.len());
    encoding.decode(&raw_block[..end])
}
