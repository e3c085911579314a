//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use codeplay_core::{
    ChangeRecord, DocumentSink, Operation, Position, Recorder, SharedSink, Stream, TextBuffer,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scripted person typing into a [`TextBuffer`] while a [`Recorder`] listens.
pub struct Typist {
    buffer: TextBuffer,
    recorder: Recorder,
    caret: Position,
    clock: i64,
}

impl Typist {
    pub fn new(initial: &str) -> Self {
        let buffer = TextBuffer::new(initial);
        let last = buffer.line_count().saturating_sub(1);
        let ch = buffer.line(last).map_or(0, |l| l.chars().count());
        Self {
            buffer,
            recorder: Recorder::new(initial),
            caret: Position::new(last as u32, ch as u32),
            clock: 0,
        }
    }

    fn edit(&mut self, gap: i64, op: Operation) {
        self.clock += gap;
        self.recorder.record(self.clock, op.clone());
        self.buffer.apply_change(&op);
    }

    pub fn wait(&mut self, ms: i64) -> &mut Self {
        self.clock += ms;
        self
    }

    /// One insert per character at the caret.
    pub fn type_text(&mut self, text: &str, gap: i64) -> &mut Self {
        for c in text.chars() {
            let op = Operation::insert(self.caret, &c.to_string());
            if let Operation::Insert { to, .. } = &op {
                self.caret = *to;
            }
            self.edit(gap, op);
        }
        self
    }

    pub fn backspace(&mut self, count: u32, gap: i64) -> &mut Self {
        for _ in 0..count.min(self.caret.ch) {
            let from = Position::new(self.caret.line, self.caret.ch - 1);
            self.edit(gap, Operation::delete(from, self.caret));
            self.caret = from;
        }
        self
    }

    pub fn select(&mut self, anchor: Position, head: Position, gap: i64) -> &mut Self {
        self.edit(gap, Operation::select(anchor, head));
        self
    }

    pub fn move_to(&mut self, caret: Position) -> &mut Self {
        self.caret = caret;
        self
    }

    pub fn value(&self) -> String {
        self.buffer.value()
    }

    pub fn finish(&self) -> Stream {
        self.recorder.stream()
    }
}

/// A short Go file typed with typos, corrections, indentation and selections.
pub fn go_session() -> Stream {
    let mut t = Typist::new("");
    t.type_text("package main\n\n", 60)
        .wait(400)
        .type_text("import \"fmt\"\n\n", 70)
        .type_text("fucn", 65)
        .backspace(3, 110)
        .type_text("unc main() {\n", 70)
        .type_text("    fmt.Prinln", 55)
        .backspace(2, 90)
        .type_text("tln(\"hello\")\n", 60)
        .type_text("}", 80)
        .wait(900)
        .select(Position::new(5, 4), Position::new(5, 7), 120)
        .select(Position::new(5, 4), Position::new(5, 11), 40)
        .select(Position::new(5, 4), Position::new(5, 16), 40)
        .move_to(Position::new(5, 24))
        .type_text("ln", 75)
        .backspace(2, 100);
    let stream = t.finish();
    assert_eq!(stream.final_value(), t.value());
    stream
}

/// `count` single-character inserts on one line at the given times.
pub fn keystrokes(times: impl IntoIterator<Item = i64>) -> Vec<ChangeRecord> {
    times
        .into_iter()
        .enumerate()
        .map(|(i, time)| {
            let c = char::from(b'a' + (i % 26) as u8);
            ChangeRecord::new(time, Operation::insert(Position::new(0, i as u32), &c.to_string()))
        })
        .collect()
}

/// Sink that logs every operation handed to it.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub buffer: TextBuffer,
    pub applied: Vec<Operation>,
}

impl CountingSink {
    pub fn shared() -> SharedSink<Self> {
        Arc::new(Mutex::new(Self::default()))
    }
}

impl DocumentSink for CountingSink {
    fn set_value(&mut self, text: &str) {
        self.buffer.set_value(text);
    }

    fn value(&self) -> String {
        self.buffer.value()
    }

    fn apply_change(&mut self, op: &Operation) {
        self.applied.push(op.clone());
        self.buffer.apply_change(op);
    }

    fn freeze(&mut self) {
        self.buffer.freeze();
    }

    fn unfreeze(&mut self) {
        self.buffer.unfreeze();
    }
}
