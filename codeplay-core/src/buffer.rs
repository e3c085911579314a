//! Document sink contract and the in-memory [`TextBuffer`] implementing it.
//!
//! The player only ever talks to a document through [`DocumentSink`]; an
//! editor widget implements the same trait to receive replayed operations.
//! `TextBuffer` is the reference implementation: a vector of lines with a
//! selection and a read-only flag.

use std::sync::{Arc, Mutex};

use log::{trace, warn};
use thiserror::Error;

use crate::{ChangeRecord, Operation, Position, Selection};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Document is frozen during playback")]
    Frozen,
}

/// The text buffer operations are applied to.
pub trait DocumentSink: Send {
    /// Replace the entire buffer content.
    fn set_value(&mut self, text: &str);

    /// Current buffer content.
    fn value(&self) -> String;

    /// Apply one operation. `SetValue` is ignored silently, `Unknown` is
    /// ignored with a warning.
    fn apply_change(&mut self, op: &Operation);

    /// Make the buffer read-only for human input.
    fn freeze(&mut self);

    fn unfreeze(&mut self);
}

/// A sink shared between the player and the host that renders it.
pub type SharedSink<S> = Arc<Mutex<S>>;

/// Callback receiving every human edit applied to a [`TextBuffer`].
pub type EditObserver = Box<dyn FnMut(&Operation) + Send>;

/// Line-vector text document.
pub struct TextBuffer {
    lines: Vec<String>,
    selection: Option<Selection>,
    frozen: bool,
    observer: Option<EditObserver>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new("")
    }
}

impl std::fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBuffer")
            .field("lines", &self.lines)
            .field("selection", &self.selection)
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl TextBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            lines: split_lines(text),
            selection: None,
            frozen: false,
            observer: None,
        }
    }

    /// Wrap a fresh buffer for sharing with a player.
    pub fn shared(text: &str) -> SharedSink<Self> {
        Arc::new(Mutex::new(Self::new(text)))
    }

    /// Replay `records` on top of `initial` and return the resulting buffer.
    pub fn replay(initial: &str, records: &[ChangeRecord]) -> Self {
        let mut buffer = Self::new(initial);
        for record in records {
            buffer.apply_change(&record.change);
        }
        buffer
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Register the recording hook. Replaces any previous observer.
    pub fn set_observer(&mut self, observer: EditObserver) {
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Apply an edit made by a person and report it to the observer.
    ///
    /// Rejected while frozen so human input never interleaves with replay.
    pub fn user_edit(&mut self, op: Operation) -> Result<(), DocumentError> {
        if self.frozen {
            return Err(DocumentError::Frozen);
        }
        self.apply_change(&op);
        if let Some(observer) = self.observer.as_mut() {
            observer(&op);
        }
        Ok(())
    }

    /// Clip a position into the document.
    pub fn clip(&self, pos: Position) -> Position {
        let last = self.lines.len().saturating_sub(1);
        let line = (pos.line as usize).min(last);
        let len = self.lines[line].chars().count() as u32;
        Position::new(line as u32, pos.ch.min(len))
    }

    fn byte_offset(&self, pos: Position) -> usize {
        let line = &self.lines[pos.line as usize];
        line.char_indices()
            .nth(pos.ch as usize)
            .map(|(b, _)| b)
            .unwrap_or(line.len())
    }

    fn insert(&mut self, at: Position, text: &[String]) {
        if text.is_empty() {
            return;
        }
        let at = self.clip(at);
        let offset = self.byte_offset(at);
        let row = at.line as usize;
        let tail = self.lines[row].split_off(offset);
        self.lines[row].push_str(&text[0]);

        if text.len() == 1 {
            self.lines[row].push_str(&tail);
            return;
        }

        let mut rest: Vec<String> = text[1..].to_vec();
        if let Some(last) = rest.last_mut() {
            last.push_str(&tail);
        }
        let after = self.lines.split_off(row + 1);
        self.lines.extend(rest);
        self.lines.extend(after);
    }

    fn delete(&mut self, from: Position, to: Position) {
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        let from = self.clip(from);
        let to = self.clip(to);
        let start = self.byte_offset(from);
        let end = self.byte_offset(to);

        if from.line == to.line {
            self.lines[from.line as usize].replace_range(start..end, "");
            return;
        }

        let suffix = self.lines[to.line as usize][end..].to_string();
        let first = &mut self.lines[from.line as usize];
        first.truncate(start);
        first.push_str(&suffix);
        self.lines.drain(from.line as usize + 1..=to.line as usize);
    }
}

impl DocumentSink for TextBuffer {
    fn set_value(&mut self, text: &str) {
        self.lines = split_lines(text);
        self.selection = None;
    }

    fn value(&self) -> String {
        self.lines.join("\n")
    }

    fn apply_change(&mut self, op: &Operation) {
        trace!("apply {:?}", op.kind());
        match op {
            Operation::Insert { from, text, .. } => {
                if let Some((start, end)) = op.replaced_range() {
                    self.delete(start, end);
                }
                self.insert(*from, text);
            }
            Operation::Delete { from, to } => self.delete(*from, *to),
            Operation::Select { range } => {
                self.selection = Some(Selection::new(self.clip(range.anchor), self.clip(range.head)));
            }
            Operation::SetValue {} => {}
            Operation::Unknown => warn!("Skipping unrecognized operation"),
        }
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn unfreeze(&mut self) {
        self.frozen = false;
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_owned).collect()
}
