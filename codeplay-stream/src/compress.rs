//! Stream compression: merge keystroke-level records into runs.
//!
//! ```text
//!  a  b  c  ␣  d  e         level 1: same kind → same line → adjacent
//!  └──┬──┘  └──┬──┘  ───►   "abc" (duration t_c − t_a), " de"
//!    run      run
//!
//!  x  ⌫  y                  level 2: typo elision first, then merge
//!  └─┬─┘     ───►           "y" at t_x
//!  elided
//! ```
//!
//! Compression is a pure function. It never reorders records and never
//! changes the document a full replay produces.

use codeplay_core::{normalize, ChangeRecord, Operation, OperationKind, Position, Stream};
use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// How aggressively records are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum CompressionLevel {
    /// No compression.
    Identity = 0,
    /// Merge adjacent keystrokes, breaking runs at whitespace.
    #[default]
    Adjacent = 1,
    /// Swallow backspaced typos, then merge across word boundaries.
    Typos = 2,
    /// As `Typos`, with selections dropped.
    Aggressive = 3,
}

impl TryFrom<u8> for CompressionLevel {
    type Error = OptionsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Identity),
            1 => Ok(Self::Adjacent),
            2 => Ok(Self::Typos),
            3 => Ok(Self::Aggressive),
            other => Err(OptionsError::InvalidLevel(other)),
        }
    }
}

impl From<CompressionLevel> for u8 {
    fn from(level: CompressionLevel) -> Self {
        level as u8
    }
}

/// Compress `records` at `level`.
///
/// Above level 0 the records are [`normalize`]d first, so inserts in the
/// replace-range shape merge like any other keystroke.
pub fn compress(records: &[ChangeRecord], level: CompressionLevel) -> Vec<ChangeRecord> {
    if level == CompressionLevel::Identity {
        return records.to_vec();
    }
    let records = normalize(records.to_vec());
    match level {
        CompressionLevel::Identity => records,
        CompressionLevel::Adjacent => merge_adjacent(&records, false),
        CompressionLevel::Typos => merge_adjacent(&elide_typos(&records), true),
        CompressionLevel::Aggressive => {
            // Selections go first so they cannot split runs a second pass would join.
            let edits: Vec<ChangeRecord> = records
                .into_iter()
                .filter(|r| r.change.kind() != OperationKind::Select)
                .collect();
            merge_adjacent(&elide_typos(&edits), true)
        }
    }
}

/// Compressed copy of `stream`. The initial value is kept as is.
pub fn compress_stream(stream: &Stream, level: CompressionLevel) -> Stream {
    Stream::new(stream.initial_value.clone(), compress(&stream.records, level))
}

/// `stream.compressed(level)` for [`Stream`].
pub trait CompressStream {
    fn compressed(&self, level: CompressionLevel) -> Stream;
}

impl CompressStream for Stream {
    fn compressed(&self, level: CompressionLevel) -> Stream {
        compress_stream(self, level)
    }
}

/// Collapse maximal adjacent runs into single records.
///
/// `across_words` lets runs continue over whitespace.
pub fn merge_adjacent(records: &[ChangeRecord], across_words: bool) -> Vec<ChangeRecord> {
    records
        .chunk_by(same_kind)
        .flat_map(|run| run.chunk_by(same_line))
        .flat_map(move |run| run.chunk_by(move |a, b| adjacent(&a.change, &b.change, across_words)))
        .map(collapse)
        .collect()
}

/// Remove Insert/Delete pairs where the delete backspaces over the last
/// inserted character.
///
/// Works as a stack so that removing one pair exposes the insert beneath it.
/// The first record kept after an elided pair takes over the insert's time.
pub fn elide_typos(records: &[ChangeRecord]) -> Vec<ChangeRecord> {
    let mut out: Vec<ChangeRecord> = Vec::with_capacity(records.len());
    let mut inherited: Option<i64> = None;

    for record in records {
        if let Operation::Delete { from, to } = &record.change {
            if let Some(top) = out.last_mut() {
                match undo_tail(&mut top.change, *from, *to) {
                    Undo::Removed => {
                        let time = top.time;
                        out.pop();
                        inherited = Some(inherited.map_or(time, |t| t.min(time)));
                        continue;
                    }
                    Undo::Trimmed => continue,
                    Undo::Kept => {}
                }
            }
        }

        let mut record = record.clone();
        if let Some(time) = inherited.take() {
            record.time = time;
        }
        out.push(record);
    }
    out
}

enum Undo {
    Removed,
    Trimmed,
    Kept,
}

fn undo_tail(top: &mut Operation, del_from: Position, del_to: Position) -> Undo {
    let (del_from, del_to) = ordered(del_from, del_to);
    let Operation::Insert { from, to, text, .. } = top else {
        return Undo::Kept;
    };
    if text.len() != 1 || from.line != to.line || to.ch <= from.ch {
        return Undo::Kept;
    }
    if del_to != *to || del_from.line != to.line || del_from.ch + 1 != to.ch {
        return Undo::Kept;
    }

    if text[0].chars().count() <= 1 {
        return Undo::Removed;
    }
    text[0].pop();
    to.ch -= 1;
    Undo::Trimmed
}

fn ordered(a: Position, b: Position) -> (Position, Position) {
    if b < a {
        (b, a)
    } else {
        (a, b)
    }
}

fn mergeable(kind: OperationKind) -> bool {
    matches!(
        kind,
        OperationKind::Insert | OperationKind::Delete | OperationKind::Select
    )
}

fn same_kind(a: &ChangeRecord, b: &ChangeRecord) -> bool {
    let kind = a.change.kind();
    mergeable(kind) && kind == b.change.kind()
}

fn same_line(a: &ChangeRecord, b: &ChangeRecord) -> bool {
    match (&a.change, &b.change) {
        (Operation::Select { range: x }, Operation::Select { range: y }) => {
            x.anchor.line == y.anchor.line || x.head.line == y.head.line
        }
        (prev, next) => prev.line().is_some() && prev.line() == next.line(),
    }
}

fn adjacent(prev: &Operation, next: &Operation, across_words: bool) -> bool {
    if !prev.is_single_line() || !next.is_single_line() {
        return false;
    }
    match (prev, next) {
        (Operation::Insert { to: caret, .. }, Operation::Insert { from, text, .. }) => {
            let one_char = text.len() == 1 && text[0].chars().count() == 1;
            one_char && from == caret && (across_words || !next.has_whitespace())
        }
        (Operation::Delete { from: prev_from, to: prev_to }, Operation::Delete { from, to }) => {
            let (prev_from, _) = ordered(*prev_from, *prev_to);
            let (from, to) = ordered(*from, *to);
            to.ch == from.ch + 1 && to == prev_from
        }
        // Merged selections keep only their final range, so runs are keyed
        // on the stable anchor to stay comparable after merging.
        (Operation::Select { range: x }, Operation::Select { range: y }) => {
            x.anchor == y.anchor && x.head.line == y.head.line
        }
        _ => false,
    }
}

fn collapse(run: &[ChangeRecord]) -> ChangeRecord {
    let (first, last) = match run {
        [first, .., last] => (first, last),
        [only] => return only.clone(),
        [] => unreachable!("chunk_by never yields empty runs"),
    };

    let change = match (&first.change, &last.change) {
        (Operation::Insert { from, .. }, Operation::Insert { to, .. }) => Operation::Insert {
            from: *from,
            to: *to,
            text: vec![run
                .iter()
                .filter_map(|r| r.change.inserted_text())
                .collect::<String>()],
            removed: Vec::new(),
            duration: Some(last.end_time() - first.time),
        },
        (Operation::Delete { from: f0, to: t0 }, Operation::Delete { from: f1, to: t1 }) => {
            Operation::Delete {
                from: ordered(*f1, *t1).0,
                to: ordered(*f0, *t0).1,
            }
        }
        (Operation::Select { .. }, Operation::Select { range }) => Operation::Select { range: *range },
        _ => first.change.clone(),
    };

    ChangeRecord::new(first.time, change)
}
