//! In-memory list of recordings made in one editing session.

use codeplay_core::Stream;
use log::debug;
use uuid::Uuid;

use crate::compress::{compress_stream, CompressionLevel};

/// A stored recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub id: Uuid,
    pub label: String,
    pub stream: Stream,
    /// Compression level the stream was produced at.
    pub level: CompressionLevel,
}

/// Recordings in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct RecordingLibrary {
    recordings: Vec<Recording>,
    added: usize,
}

impl RecordingLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an uncompressed recording labelled "Recording N".
    pub fn add(&mut self, stream: Stream) -> Uuid {
        self.insert(stream, CompressionLevel::Identity)
    }

    fn insert(&mut self, stream: Stream, level: CompressionLevel) -> Uuid {
        self.added += 1;
        let recording = Recording {
            id: Uuid::new_v4(),
            label: format!("Recording {}", self.added),
            stream,
            level,
        };
        let id = recording.id;
        debug!("Added {} ({} records)", recording.label, recording.stream.len());
        self.recordings.push(recording);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&Recording> {
        self.recordings.iter().find(|r| r.id == id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Recording> {
        let index = self.recordings.iter().position(|r| r.id == id)?;
        Some(self.recordings.remove(index))
    }

    /// Store a copy of recording `id` compressed at `level` and return the
    /// copy's id.
    pub fn compress(&mut self, id: Uuid, level: CompressionLevel) -> Option<Uuid> {
        let source = self.get(id)?;
        let stream = compress_stream(&source.stream, level);
        debug!(
            "Compressed {} from {} to {} records at level {}",
            source.label,
            source.stream.len(),
            stream.len(),
            u8::from(level)
        );
        let level = level.max(source.level);
        Some(self.insert(stream, level))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recording> {
        self.recordings.iter()
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeplay_core::{ChangeRecord, Operation, Position};

    fn word(text: &str) -> Stream {
        let records = text
            .chars()
            .enumerate()
            .map(|(i, c)| {
                ChangeRecord::new(
                    i as i64 * 50,
                    Operation::insert(Position::new(0, i as u32), &c.to_string()),
                )
            })
            .collect();
        Stream::new("", records)
    }

    #[test]
    fn test_labels_count_up() {
        let mut library = RecordingLibrary::new();
        let first = library.add(word("ab"));
        library.add(word("cd"));
        library.remove(first);
        let third = library.add(word("ef"));

        assert_eq!(library.len(), 2);
        assert_eq!(library.get(third).unwrap().label, "Recording 3");
        let labels: Vec<&str> = library.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["Recording 2", "Recording 3"]);
    }

    #[test]
    fn test_compress_adds_copy() {
        let mut library = RecordingLibrary::new();
        let id = library.add(word("hello"));
        let copy = library.compress(id, CompressionLevel::Adjacent).unwrap();

        assert_ne!(copy, id);
        assert_eq!(library.len(), 2);
        assert_eq!(library.get(id).unwrap().stream.len(), 5);

        let compressed = library.get(copy).unwrap();
        assert_eq!(compressed.stream.len(), 1);
        assert_eq!(compressed.level, CompressionLevel::Adjacent);
        assert_eq!(compressed.stream.final_value(), "hello");
    }

    #[test]
    fn test_missing_ids() {
        let mut library = RecordingLibrary::new();
        let ghost = Uuid::new_v4();
        assert!(library.get(ghost).is_none());
        assert!(library.remove(ghost).is_none());
        assert!(library.compress(ghost, CompressionLevel::Typos).is_none());
        assert!(library.is_empty());
    }
}
