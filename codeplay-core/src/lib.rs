//! # codeplay-core — operation model for recorded editing sessions
//!
//! A session is an ordered list of timestamped [`ChangeRecord`]s applied on
//! top of an initial document value. Records are produced by the
//! [`recorder::Recorder`] as a person types, and replayed against a
//! [`buffer::DocumentSink`] by the player in `codeplay-stream`.
//!
//! ```text
//! ┌──────────────┐  user_edit   ┌──────────────┐  record()   ┌──────────┐
//! │ editor host  │ ───────────► │  TextBuffer  │ ──────────► │ Recorder │
//! └──────────────┘              │ (DocumentSink)│ observer   └────┬─────┘
//!                               └──────▲───────┘                  │
//!                                      │ apply_change             ▼
//!                               ┌──────┴───────┐             ┌──────────┐
//!                               │    Player    │ ◄────────── │  Stream  │
//!                               └──────────────┘             └──────────┘
//! ```

use serde::{Deserialize, Serialize};

pub mod buffer;
pub mod recorder;

pub use buffer::{DocumentError, DocumentSink, EditObserver, SharedSink, TextBuffer};
pub use recorder::Recorder;

/// Zero-indexed line/column location. Columns count Unicode scalar values.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub ch: u32,
}

impl Position {
    pub fn new(line: u32, ch: u32) -> Self {
        Self { line, ch }
    }
}

/// Selection endpoints. `anchor` stays put while `head` follows the caret.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    /// A selection whose endpoints coincide is just a caret.
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }
}

/// A single editing operation.
///
/// Serialized with the recorder's `origin` tags. Tags this version does not
/// know about decode into [`Operation::Unknown`] so newer session files still
/// load; consumers skip them.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "origin")]
pub enum Operation {
    /// Insert `text` (one entry per line) at `from`. `to` is the caret
    /// position right after the inserted text.
    ///
    /// Editor exports use the replace-range shape instead: `to` ends the
    /// range the text overwrites and `removed` holds that range's text. See
    /// [`Operation::replaced_range`] and [`normalize`].
    #[serde(rename = "+input", alias = "paste")]
    Insert {
        from: Position,
        to: Position,
        text: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        removed: Vec<String>,
        /// Milliseconds the inserted run should be spread over at playback.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<i64>,
    },
    /// Remove the range `from..to`.
    #[serde(rename = "+delete")]
    Delete { from: Position, to: Position },
    #[serde(rename = "+select")]
    Select { range: Selection },
    /// Full-buffer reset marker. Carries nothing and replays as a no-op.
    #[serde(rename = "+setValue")]
    SetValue {},
    #[serde(other)]
    Unknown,
}

/// Discriminant of an [`Operation`], used when grouping records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Insert,
    Delete,
    Select,
    SetValue,
    Unknown,
}

impl Operation {
    /// Insert of `text` at `from` without a duration. Line breaks in `text`
    /// split it into one entry per line.
    pub fn insert(from: Position, text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        let to = end_of_insert(from, &lines);
        Operation::Insert {
            from,
            to,
            text: lines,
            removed: Vec::new(),
            duration: None,
        }
    }

    pub fn delete(from: Position, to: Position) -> Self {
        Operation::Delete { from, to }
    }

    pub fn select(anchor: Position, head: Position) -> Self {
        Operation::Select {
            range: Selection::new(anchor, head),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Select { .. } => OperationKind::Select,
            Operation::SetValue {} => OperationKind::SetValue,
            Operation::Unknown => OperationKind::Unknown,
        }
    }

    /// The line an edit happens on: `from` for edits, the head for selections.
    pub fn line(&self) -> Option<u32> {
        match self {
            Operation::Insert { from, .. } | Operation::Delete { from, .. } => Some(from.line),
            Operation::Select { range } => Some(range.head.line),
            Operation::SetValue {} | Operation::Unknown => None,
        }
    }

    /// Inserted text joined with `\n`, or `None` for anything but an insert.
    pub fn inserted_text(&self) -> Option<String> {
        match self {
            Operation::Insert { text, .. } => Some(text.join("\n")),
            _ => None,
        }
    }

    /// True when the inserted text contains whitespace, line breaks included.
    pub fn has_whitespace(&self) -> bool {
        match self {
            Operation::Insert { text, .. } => {
                text.len() > 1 || text.iter().any(|l| l.chars().any(char::is_whitespace))
            }
            _ => false,
        }
    }

    /// Whether the operation stays on one line.
    pub fn is_single_line(&self) -> bool {
        match self {
            Operation::Insert { from, to, text, .. } => text.len() <= 1 && from.line == to.line,
            Operation::Delete { from, to } => from.line == to.line,
            Operation::Select { range } => range.anchor.line == range.head.line,
            Operation::SetValue {} | Operation::Unknown => false,
        }
    }

    pub fn duration(&self) -> Option<i64> {
        match self {
            Operation::Insert { duration, .. } => *duration,
            _ => None,
        }
    }

    /// Range an insert in the replace-range shape types over.
    ///
    /// That is the case when `to` lies past `from` and either `removed`
    /// carries text or `to` is not the caret after the inserted text.
    pub fn replaced_range(&self) -> Option<(Position, Position)> {
        let Operation::Insert {
            from,
            to,
            text,
            removed,
            ..
        } = self
        else {
            return None;
        };
        let overwrites =
            removed.iter().any(|l| !l.is_empty()) || *to != end_of_insert(*from, text);
        (to > from && overwrites).then_some((*from, *to))
    }
}

/// Caret position after inserting `lines` at `from`.
pub fn end_of_insert(from: Position, lines: &[String]) -> Position {
    match lines {
        [] => from,
        [only] => Position::new(from.line, from.ch + only.chars().count() as u32),
        [.., last] => Position::new(
            from.line + (lines.len() - 1) as u32,
            last.chars().count() as u32,
        ),
    }
}

/// Rewrite inserts recorded in the replace-range shape: a `Delete` of the
/// overwritten range at the same time, then an `Insert` whose `to` is the
/// caret after its text. Everything else passes through.
pub fn normalize(records: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let replaced = record.change.replaced_range();
        let ChangeRecord { time, change } = record;
        match change {
            Operation::Insert {
                from,
                text,
                duration,
                ..
            } => {
                if let Some((start, end)) = replaced {
                    out.push(ChangeRecord::new(time, Operation::delete(start, end)));
                }
                let to = end_of_insert(from, &text);
                let insert = Operation::Insert {
                    from,
                    to,
                    text,
                    removed: Vec::new(),
                    duration,
                };
                out.push(ChangeRecord::new(time, insert));
            }
            change => out.push(ChangeRecord::new(time, change)),
        }
    }
    out
}

/// One timestamped operation. `time` is milliseconds since an arbitrary epoch.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ChangeRecord {
    pub time: i64,
    pub change: Operation,
}

impl ChangeRecord {
    pub fn new(time: i64, change: Operation) -> Self {
        Self { time, change }
    }

    /// Time at which the record has fully played out.
    pub fn end_time(&self) -> i64 {
        self.time + self.change.duration().unwrap_or(0).max(0)
    }
}

/// A recorded session: an initial document plus the records replayed on it.
///
/// Records are kept in non-decreasing `time` order.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub initial_value: String,
    pub records: Vec<ChangeRecord>,
}

impl Stream {
    pub fn new(initial_value: impl Into<String>, records: Vec<ChangeRecord>) -> Self {
        Self {
            initial_value: initial_value.into(),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Time of the first record.
    pub fn start(&self) -> Option<i64> {
        self.records.first().map(|r| r.time)
    }

    /// Time of the last record, including its playback duration.
    pub fn end(&self) -> Option<i64> {
        self.records.last().map(ChangeRecord::end_time)
    }

    pub fn is_ordered(&self) -> bool {
        is_ordered(&self.records)
    }

    /// Final document content after replaying every record.
    pub fn final_value(&self) -> String {
        TextBuffer::replay(&self.initial_value, &self.records).value()
    }

    /// Index of the first record at or after `time`, clamped to the last
    /// record. `None` only for an empty stream.
    pub fn index_at(&self, time: i64) -> Option<usize> {
        let last = self.records.len().checked_sub(1)?;
        Some(self.records.iter().position(|r| r.time >= time).unwrap_or(last))
    }

    /// Fraction of the stream's span elapsed at `time`, within `0.0..=1.0`.
    ///
    /// A stream whose span is empty counts as fully played.
    pub fn progress_at(&self, time: i64) -> f64 {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) if end > start => {
                ((time - start) as f64 / (end - start) as f64).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    /// Time at `fraction` of the stream's span.
    pub fn time_at(&self, fraction: f64) -> Option<i64> {
        let (start, end) = (self.start()?, self.end()?);
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        Some(start + ((end - start) as f64 * fraction).round() as i64)
    }
}

/// Whether `records` are sorted by time, ties allowed.
pub fn is_ordered(records: &[ChangeRecord]) -> bool {
    records.windows(2).all(|w| w[0].time <= w[1].time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_json_tags() {
        let op = Operation::insert(Position::new(0, 5), "a");
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"origin\":\"+input\""));
        assert!(!json.contains("duration"));

        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_unknown_origin_is_tolerated() {
        let json = r#"{"time":10,"change":{"origin":"+fold","from":{"line":0,"ch":0}}}"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.change, Operation::Unknown);
        assert_eq!(record.change.kind(), OperationKind::Unknown);
    }

    #[test]
    fn test_set_value_round_trips_empty() {
        let json = r#"{"origin":"+setValue"}"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(op, Operation::SetValue {});
    }

    #[test]
    fn test_insert_end_position() {
        let op = Operation::insert(Position::new(2, 4), "ab\ncde");
        match op {
            Operation::Insert { to, text, .. } => {
                assert_eq!(text, vec!["ab".to_string(), "cde".to_string()]);
                assert_eq!(to, Position::new(3, 3));
            }
            _ => panic!("Wrong operation"),
        }
    }

    #[test]
    fn test_whitespace_detection() {
        assert!(Operation::insert(Position::new(0, 0), " ").has_whitespace());
        assert!(Operation::insert(Position::new(0, 0), "\n").has_whitespace());
        assert!(!Operation::insert(Position::new(0, 0), "x").has_whitespace());
        assert!(!Operation::delete(Position::new(0, 0), Position::new(0, 1)).has_whitespace());
    }

    #[test]
    fn test_stream_bounds_include_duration() {
        let mut insert = Operation::insert(Position::new(0, 0), "abc");
        if let Operation::Insert { duration, .. } = &mut insert {
            *duration = Some(250);
        }
        let stream = Stream::new(
            "",
            vec![
                ChangeRecord::new(100, Operation::insert(Position::new(0, 0), "x")),
                ChangeRecord::new(200, insert),
            ],
        );
        assert_eq!(stream.start(), Some(100));
        assert_eq!(stream.end(), Some(450));
        assert!(stream.is_ordered());
    }

    #[test]
    fn test_index_at_clamps() {
        let stream = Stream::new(
            "",
            (0..5)
                .map(|i| ChangeRecord::new(i * 10, Operation::insert(Position::new(0, i as u32), "a")))
                .collect(),
        );
        assert_eq!(stream.index_at(-100), Some(0));
        assert_eq!(stream.index_at(15), Some(2));
        assert_eq!(stream.index_at(20), Some(2));
        assert_eq!(stream.index_at(999), Some(4));
        assert_eq!(Stream::default().index_at(0), None);
    }

    #[test]
    fn test_progress_and_time_mapping() {
        let stream = Stream::new(
            "",
            vec![
                ChangeRecord::new(100, Operation::insert(Position::new(0, 0), "a")),
                ChangeRecord::new(300, Operation::insert(Position::new(0, 1), "b")),
            ],
        );
        assert_eq!(stream.progress_at(200), 0.5);
        assert_eq!(stream.progress_at(0), 0.0);
        assert_eq!(stream.progress_at(1_000), 1.0);
        assert_eq!(stream.time_at(0.25), Some(150));

        let single = Stream::new("", vec![ChangeRecord::new(5, Operation::SetValue {})]);
        assert_eq!(single.progress_at(5), 1.0);
    }

    #[test]
    fn test_paste_decodes_as_insert() {
        let json = r#"{"origin":"paste","from":{"line":0,"ch":0},"to":{"line":0,"ch":0},"text":["he","llo"]}"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(op.kind(), OperationKind::Insert);
        assert_eq!(op.inserted_text().as_deref(), Some("he\nllo"));
    }

    #[test]
    fn test_normalize_recomputes_caret() {
        // Editor exports put `to` at `from` for a plain insert.
        let json = r#"[{"time":0,"change":{"origin":"+input","from":{"line":1,"ch":5},"to":{"line":1,"ch":5},"text":["a"],"removed":[""]}}]"#;
        let records: Vec<ChangeRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].change.replaced_range(), None);

        let records = normalize(records);
        assert_eq!(records, vec![ChangeRecord::new(0, Operation::insert(Position::new(1, 5), "a"))]);
    }

    #[test]
    fn test_normalize_splits_typed_over_selection() {
        let json = r#"[{"time":7,"change":{"origin":"+input","from":{"line":0,"ch":0},"to":{"line":0,"ch":3},"text":["X"],"removed":["abc"]}}]"#;
        let records = normalize(serde_json::from_str(json).unwrap());
        assert_eq!(
            records,
            vec![
                ChangeRecord::new(7, Operation::delete(Position::new(0, 0), Position::new(0, 3))),
                ChangeRecord::new(7, Operation::insert(Position::new(0, 0), "X")),
            ]
        );
        assert_eq!(Stream::new("abcdef", records).final_value(), "Xdef");
    }

    #[test]
    fn test_removed_text_marks_same_length_replacement() {
        // One character typed over a one-character selection: `to` happens to
        // equal the caret, only `removed` tells it apart.
        let json = r#"{"origin":"+input","from":{"line":0,"ch":0},"to":{"line":0,"ch":1},"text":["X"],"removed":["a"]}"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(op.replaced_range(), Some((Position::new(0, 0), Position::new(0, 1))));
        assert_eq!(Operation::insert(Position::new(0, 0), "X").replaced_range(), None);
    }

    #[test]
    fn test_stream_serializes_camel_case() {
        let stream = Stream::new("fn main() {}", Vec::new());
        let json = serde_json::to_string(&stream).unwrap();
        assert!(json.contains("initialValue"));
    }
}
