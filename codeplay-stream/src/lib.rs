//! # codeplay-stream — compression, playback and storage of recorded sessions
//!
//! Takes the [`codeplay_core::Stream`]s a recorder produces and turns them
//! back into a live typing replay.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  compress()   ┌─────────────┐   apply()   ┌─────────────┐
//! │  Recorder   │ ────────────► │   Stream    │ ──────────► │   Player    │
//! │  (core)     │               │  (merged)   │             │ (tokio task)│
//! └─────────────┘               └──────┬──────┘             └──────┬──────┘
//!                                      │                           │ apply_change
//!                               write()│ parse()                   ▼
//!                               ┌──────┴──────┐             ┌─────────────┐
//!                               │ SessionFile │             │DocumentSink │
//!                               │ (mode/data) │             │  (editor)   │
//!                               └─────────────┘             └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`compress`] — Level 0-3 record merging and typo elision
//! - [`player`] — Timed playback with pause, seek and decile snapshots
//! - [`session`] — `mode=` / `speed=` / `data=` session file codec
//! - [`library`] — Recordings kept during an editing session
//! - [`error`] — Session and option errors

pub mod compress;
pub mod error;
pub mod library;
pub mod player;
pub mod session;

// Re-exports for convenience
pub use compress::{
    compress, compress_stream, elide_typos, merge_adjacent, CompressStream, CompressionLevel,
};
pub use error::{OptionsError, SessionError};
pub use library::{Recording, RecordingLibrary};
pub use player::{
    Cursor, EventKind, FrameHost, ListenerId, PlaybackOptions, PlaybackState, Player,
    PlayerEvent, Snapshot, SnapshotTable, TokioHost,
};
pub use session::{EditorMode, SessionFile};
