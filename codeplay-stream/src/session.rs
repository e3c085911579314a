//! Line-oriented session file codec.
//!
//! ```text
//! mode=go/go:text/x-go
//! speed=1.5
//! data=<base64 of the JSON records array>
//! initial=<base64 of the initial document>
//! ```
//!
//! Lines may come in any order. Unknown lines are skipped and a line that
//! fails to decode leaves the matching part of the session untouched.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use codeplay_core::{normalize, ChangeRecord, Stream};
use log::{debug, error, warn};

use crate::error::SessionError;

const MODE: &str = "mode=";
const SPEED: &str = "speed=";
const DATA: &str = "data=";
const INITIAL: &str = "initial=";

/// Editor language mode, written as `directory:mime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorMode {
    pub directory: String,
    pub mime: String,
}

impl EditorMode {
    pub fn new(directory: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            mime: mime.into(),
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (directory, mime) = text.trim().split_once(':')?;
        if directory.is_empty() || mime.is_empty() {
            return None;
        }
        Some(Self::new(directory, mime))
    }
}

impl Default for EditorMode {
    fn default() -> Self {
        Self::new("go/go", "text/x-go")
    }
}

impl fmt::Display for EditorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.directory, self.mime)
    }
}

/// Decoded contents of a session file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFile {
    pub mode: Option<EditorMode>,
    pub speed: Option<f64>,
    pub initial_value: Option<String>,
    pub records: Vec<ChangeRecord>,
}

impl SessionFile {
    pub fn from_stream(stream: &Stream) -> Self {
        Self {
            mode: None,
            speed: None,
            initial_value: Some(stream.initial_value.clone()),
            records: stream.records.clone(),
        }
    }

    pub fn with_mode(mut self, mode: EditorMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// The recorded stream. A missing initial value means an empty document.
    pub fn stream(&self) -> Stream {
        Stream::new(self.initial_value.clone().unwrap_or_default(), self.records.clone())
    }

    /// Decode session text. Never fails; see [`SessionFile::merge_from`].
    pub fn parse(text: &str) -> Self {
        let mut session = Self::default();
        session.merge_from(text);
        session
    }

    /// Apply every recognised line of `text` onto this session.
    pub fn merge_from(&mut self, text: &str) {
        for line in text.split('\n') {
            let line = line.trim_end_matches('\r');
            if let Err(e) = self.merge_line(line) {
                error!("Skipping session line {:?}: {}", preview(line), e);
            }
        }
    }

    fn merge_line(&mut self, line: &str) -> Result<(), SessionError> {
        if let Some(value) = line.strip_prefix(MODE) {
            match EditorMode::parse(value) {
                Some(mode) => self.mode = Some(mode),
                None => warn!("Ignoring malformed editor mode {:?}", value),
            }
        } else if let Some(value) = line.strip_prefix(SPEED) {
            self.speed = Some(parse_speed(value)?);
        } else if let Some(value) = line.strip_prefix(DATA) {
            self.records = decode_records(value)?;
        } else if let Some(value) = line.strip_prefix(INITIAL) {
            self.initial_value = Some(decode_text(value)?);
        } else if !line.trim().is_empty() {
            debug!("Ignoring unrecognised session line {:?}", preview(line));
        }
        Ok(())
    }

    /// Encode as session text.
    pub fn write(&self) -> Result<String, SessionError> {
        let mut lines = Vec::with_capacity(4);
        if let Some(mode) = &self.mode {
            lines.push(format!("{MODE}{mode}"));
        }
        if let Some(speed) = self.speed {
            lines.push(format!("{SPEED}{speed}"));
        }
        lines.push(format!("{DATA}{}", encode_records(&self.records)?));
        if let Some(initial) = &self.initial_value {
            lines.push(format!("{INITIAL}{}", B64.encode(initial)));
        }
        Ok(lines.join("\n"))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        fs::write(path, self.write()?)?;
        debug!("Saved {} records to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Read and decode a session file. Only I/O can fail.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let session = Self::parse(&text);
        debug!("Loaded {} records from {}", session.records.len(), path.display());
        Ok(session)
    }
}

pub fn encode_records(records: &[ChangeRecord]) -> Result<String, SessionError> {
    Ok(B64.encode(serde_json::to_vec(records)?))
}

/// Decode a `data=` payload. Inserts exported in the editor's replace-range
/// shape come back [`normalize`]d.
pub fn decode_records(payload: &str) -> Result<Vec<ChangeRecord>, SessionError> {
    let bytes = B64.decode(payload.trim())?;
    Ok(normalize(serde_json::from_slice(&bytes)?))
}

fn decode_text(payload: &str) -> Result<String, SessionError> {
    let bytes = B64.decode(payload.trim())?;
    Ok(String::from_utf8(bytes)?)
}

fn parse_speed(value: &str) -> Result<f64, SessionError> {
    match value.trim().parse::<f64>() {
        Ok(speed) if speed.is_finite() && speed > 0.0 => Ok(speed),
        _ => Err(SessionError::InvalidSpeed(value.to_string())),
    }
}

fn preview(line: &str) -> &str {
    match line.char_indices().nth(40) {
        Some((end, _)) => &line[..end],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeplay_core::{DocumentSink, Operation, Position, TextBuffer};

    fn sample() -> SessionFile {
        let records = vec![
            ChangeRecord::new(0, Operation::insert(Position::new(0, 0), "package main")),
            ChangeRecord::new(80, Operation::insert(Position::new(0, 12), "\n")),
            ChangeRecord::new(
                120,
                Operation::select(Position::new(0, 0), Position::new(0, 7)),
            ),
        ];
        SessionFile::from_stream(&Stream::new("// 世界\n", records))
            .with_mode(EditorMode::default())
            .with_speed(1.5)
    }

    #[test]
    fn test_write_then_parse() {
        let session = sample();
        let text = session.write().unwrap();
        assert!(text.starts_with("mode=go/go:text/x-go\nspeed=1.5\ndata="));
        assert_eq!(SessionFile::parse(&text), session);
    }

    #[test]
    fn test_lines_in_any_order() {
        let text = sample().write().unwrap();
        let mut lines: Vec<&str> = text.lines().collect();
        lines.reverse();
        assert_eq!(SessionFile::parse(&lines.join("\r\n")), sample());
    }

    #[test]
    fn test_file_without_initial_line() {
        let data = encode_records(&sample().records).unwrap();
        let text = format!("mode=javascript/javascript:text/javascript\nspeed=1\ndata={data}");
        let session = SessionFile::parse(&text);
        assert_eq!(session.initial_value, None);
        assert_eq!(session.speed, Some(1.0));
        assert_eq!(session.mode, Some(EditorMode::new("javascript/javascript", "text/javascript")));
        assert_eq!(session.stream().initial_value, "");
        assert_eq!(session.records.len(), 3);
    }

    #[test]
    fn test_bad_data_leaves_records_untouched() {
        let mut session = sample();
        session.merge_from("data=%%%not-base64%%%");
        assert_eq!(session.records.len(), 3);

        let not_json = B64.encode("{\"time\":");
        session.merge_from(&format!("data={not_json}"));
        assert_eq!(session.records.len(), 3);
    }

    #[test]
    fn test_bad_speed_and_mode_ignored() {
        let session = SessionFile::parse("speed=fast\nspeed=-2\nmode=nocolon\nlanguage=go\n\n");
        assert_eq!(session, SessionFile::default());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_records("@@"), Err(SessionError::Base64(_))));
        assert!(matches!(decode_records(&B64.encode("[1]")), Err(SessionError::Json(_))));
        assert!(matches!(decode_text(&B64.encode([0xffu8, 0xfe])), Err(SessionError::Utf8(_))));
        assert!(matches!(parse_speed("0"), Err(SessionError::InvalidSpeed(_))));
    }

    #[test]
    fn test_unknown_operations_survive_decoding() {
        let json = r#"[{"time":1,"change":{"origin":"+fold"}},{"time":2,"change":{"origin":"+input","from":{"line":0,"ch":0},"to":{"line":0,"ch":1},"text":["a"]}}]"#;
        let records = decode_records(&B64.encode(json)).unwrap();
        assert_eq!(records[0].change, Operation::Unknown);
        assert_eq!(records[1].change, Operation::insert(Position::new(0, 0), "a"));
    }

    #[test]
    fn test_paste_records_replay() {
        let json = r#"[{"time":0,"change":{"origin":"paste","from":{"line":0,"ch":0},"to":{"line":0,"ch":0},"text":["hello"],"removed":[""]}}]"#;
        let session = SessionFile::parse(&format!("data={}", B64.encode(json)));
        assert_eq!(session.records[0].change, Operation::insert(Position::new(0, 0), "hello"));
        assert_eq!(session.stream().final_value(), "hello");
    }

    #[test]
    fn test_exported_records_replay_like_the_editor() {
        // Two keystrokes, then "Z" typed over the selected "bc".
        let json = r#"[
            {"time":0,"change":{"origin":"+input","from":{"line":0,"ch":0},"to":{"line":0,"ch":0},"text":["a"],"removed":[""]}},
            {"time":50,"change":{"origin":"+input","from":{"line":0,"ch":1},"to":{"line":0,"ch":1},"text":["b"],"removed":[""]}},
            {"time":90,"change":{"origin":"+input","from":{"line":0,"ch":2},"to":{"line":0,"ch":2},"text":["c"],"removed":[""]}},
            {"time":400,"change":{"origin":"+input","from":{"line":0,"ch":1},"to":{"line":0,"ch":3},"text":["Z"],"removed":["bc"]}}
        ]"#;
        let records = decode_records(&B64.encode(json)).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[3].change, Operation::delete(Position::new(0, 1), Position::new(0, 3)));
        assert_eq!(TextBuffer::replay("", &records).value(), "aZ");
    }
}
