//! Streaming parser for listening-history export files.
//!
//! An export is a single JSON array of play records. The array is scanned
//! incrementally so arbitrarily large files never need a whole-document
//! DOM; each element is then decoded on its own, and a bad element skips
//! one record instead of failing the job.

use crate::history::{PlayEvent, TrackRef};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use thiserror::Error;

/// Upper bound for a single array element. Real play records are well
/// under a kilobyte.
const MAX_RECORD_BYTES: usize = 1 << 20;

const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is not a JSON array")]
    NotAnArray,
    #[error("malformed JSON payload: {0}")]
    Malformed(String),
    #[error("payload ends before the array is closed")]
    Truncated,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One decoded array element: either a usable play candidate or a skip
/// with its reason.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecord {
    Event(PlayEvent),
    Invalid(&'static str),
}

/// Incremental reader over the elements of a top-level JSON array.
///
/// Yields each element's raw bytes; content validation is left to serde.
/// Once the closing bracket is seen the reader is fused and keeps
/// returning None.
pub struct JsonArrayReader<R: Read> {
    reader: BufReader<R>,
    started: bool,
    finished: bool,
}

impl<R: Read> JsonArrayReader<R> {
    pub fn new(input: R) -> JsonArrayReader<R> {
        JsonArrayReader {
            reader: BufReader::new(input),
            started: false,
            finished: false,
        }
    }

    pub fn next_element(&mut self) -> Result<Option<Vec<u8>>, ParseError> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            match self.next_non_whitespace()? {
                Some(b'[') => self.started = true,
                _ => return Err(ParseError::NotAnArray),
            }
        }

        let first = match self.next_non_whitespace()? {
            None => return Err(ParseError::Truncated),
            Some(b']') => {
                self.finished = true;
                return Ok(None);
            }
            Some(byte) => byte,
        };

        let mut element = vec![first];
        match first {
            b'{' | b'[' => self.read_container(&mut element)?,
            b'"' => self.read_string(&mut element)?,
            _ => self.read_scalar(&mut element)?,
        }

        match self.next_non_whitespace()? {
            Some(b',') => {}
            Some(b']') => self.finished = true,
            Some(other) => {
                return Err(ParseError::Malformed(format!(
                    "unexpected '{}' after element",
                    other as char
                )))
            }
            None => return Err(ParseError::Truncated),
        }
        Ok(Some(element))
    }

    fn next_byte(&mut self) -> Result<Option<u8>, ParseError> {
        let buf = self.reader.fill_buf()?;
        match buf.first().copied() {
            Some(byte) => {
                self.reader.consume(1);
                Ok(Some(byte))
            }
            None => Ok(None),
        }
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, ParseError> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    fn next_non_whitespace(&mut self) -> Result<Option<u8>, ParseError> {
        loop {
            match self.next_byte()? {
                Some(byte) if byte.is_ascii_whitespace() => continue,
                other => return Ok(other),
            }
        }
    }

    fn push_checked(element: &mut Vec<u8>, byte: u8) -> Result<(), ParseError> {
        if element.len() >= MAX_RECORD_BYTES {
            return Err(ParseError::Malformed("record too large".to_string()));
        }
        element.push(byte);
        Ok(())
    }

    /// Reads the remainder of an object or array element. Only bracket
    /// balance and string boundaries matter here.
    fn read_container(&mut self, element: &mut Vec<u8>) -> Result<(), ParseError> {
        let mut depth = 1usize;
        let mut in_string = false;
        let mut escaped = false;
        while depth > 0 {
            let byte = self.next_byte()?.ok_or(ParseError::Truncated)?;
            Self::push_checked(element, byte)?;
            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
            } else {
                match byte {
                    b'"' => in_string = true,
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => depth -= 1,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn read_string(&mut self, element: &mut Vec<u8>) -> Result<(), ParseError> {
        let mut escaped = false;
        loop {
            let byte = self.next_byte()?.ok_or(ParseError::Truncated)?;
            Self::push_checked(element, byte)?;
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                return Ok(());
            }
        }
    }

    /// Bare scalars (numbers, literals) end at the separator, which stays
    /// unconsumed for the caller.
    fn read_scalar(&mut self, element: &mut Vec<u8>) -> Result<(), ParseError> {
        loop {
            match self.peek_byte()? {
                None | Some(b',') | Some(b']') => return Ok(()),
                Some(byte) if byte.is_ascii_whitespace() => return Ok(()),
                Some(byte) => {
                    self.next_byte()?;
                    Self::push_checked(element, byte)?;
                }
            }
        }
    }
}

/// Counts the elements of a JSON array without decoding them. Used to set
/// a job's total before processing starts.
pub fn count_records<R: Read>(input: R) -> Result<u64, ParseError> {
    let mut reader = JsonArrayReader::new(input);
    let mut count = 0u64;
    while reader.next_element()?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// Raw record as found in export files. Field aliases cover both the
/// simple account export and the extended streaming-history export.
#[derive(Deserialize)]
struct RawPlayRecord {
    #[serde(alias = "endTime", alias = "ts")]
    end_time: Option<String>,
    #[serde(alias = "artistName", alias = "master_metadata_album_artist_name")]
    artist_name: Option<String>,
    #[serde(alias = "trackName", alias = "master_metadata_track_name")]
    track_name: Option<String>,
    #[serde(alias = "msPlayed")]
    ms_played: Option<i64>,
    #[serde(alias = "spotify_track_uri")]
    provider_track_id: Option<String>,
}

/// Decode one array element into a play candidate. Failures here are
/// per-record: they become skips, never job failures.
pub fn parse_record(bytes: &[u8]) -> ParsedRecord {
    let raw: RawPlayRecord = match serde_json::from_slice(bytes) {
        Ok(raw) => raw,
        Err(_) => return ParsedRecord::Invalid("unrecognized record shape"),
    };
    let Some(track_name) = raw.track_name.filter(|s| !s.is_empty()) else {
        return ParsedRecord::Invalid("missing track name");
    };
    let Some(artist_name) = raw.artist_name.filter(|s| !s.is_empty()) else {
        return ParsedRecord::Invalid("missing artist name");
    };
    let Some(raw_time) = raw.end_time else {
        return ParsedRecord::Invalid("missing timestamp");
    };
    let Some(played_at) = parse_timestamp(&raw_time) else {
        return ParsedRecord::Invalid("unparseable timestamp");
    };
    ParsedRecord::Event(PlayEvent {
        track: TrackRef::new(track_name, artist_name, raw.provider_track_id),
        played_at,
        ms_played: raw.ms_played.unwrap_or(0),
    })
}

/// Accepts RFC 3339 (`ts` in extended exports) or the naive
/// `YYYY-MM-DD HH:MM` of simple exports, read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
