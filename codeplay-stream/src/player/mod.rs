//! Timed replay of a [`Stream`] onto a [`DocumentSink`].
//!
//! ```text
//!            play / resume(t)
//!   Idle ───────────────────────► Playing ──── last record ───► Done
//!                                  │   ▲                         │
//!                       pause /    │   │ resume                  │ play
//!                       set_speed  ▼   │                         │
//!                                 Paused ◄──── reset / seek ─────┘
//! ```
//!
//! `reset` rebuilds the document synchronously, starting from the closest
//! decile snapshot when one exists. Playback itself runs on a Tokio task
//! that applies records in batches, sleeping on the [`FrameHost`] between
//! records and yielding to it between batches.
//!
//! Locks are always taken player state first, sink second, and never held
//! while a listener runs or while the playback task is suspended.

pub mod cadence;
pub mod events;
pub mod host;
pub mod options;
pub mod snapshot;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use codeplay_core::{normalize, ChangeRecord, DocumentSink, Operation, SharedSink, Stream};
use log::{debug, error, trace, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub use events::{EventKind, ListenerId, PlayerEvent};
pub use host::{FrameHost, TokioHost};
pub use options::{PlaybackOptions, PlaybackState};
pub use snapshot::{Snapshot, SnapshotTable};

use events::Listeners;
use options::validate_speed;

/// Index and time of the last fully applied record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub index: usize,
    pub time: i64,
}

struct Inner {
    stream: Arc<Stream>,
    snapshots: SnapshotTable,
    cursor: Option<Cursor>,
    /// Time of the last applied step, keystrokes of a merged run included.
    playhead: Option<i64>,
    state: PlaybackState,
    options: PlaybackOptions,
    /// Bumped whenever running playback must stop.
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

impl Inner {
    fn is_live(&self, epoch: u64) -> bool {
        self.state == PlaybackState::Playing && self.epoch == epoch
    }

    fn cancel(&mut self) {
        self.epoch += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Shared<S> {
    sink: SharedSink<S>,
    host: Arc<dyn FrameHost>,
    inner: Mutex<Inner>,
    listeners: Listeners,
}

/// Replays a recorded stream against a document.
///
/// Cloning is cheap and every clone drives the same playback.
pub struct Player<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for Player<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: DocumentSink + 'static> Player<S> {
    pub fn new(sink: SharedSink<S>) -> Self {
        Self::with_options(sink, PlaybackOptions::default())
    }

    pub fn with_options(sink: SharedSink<S>, options: PlaybackOptions) -> Self {
        Self::with_host(sink, options, Arc::new(TokioHost))
    }

    /// Player suspending on a custom host clock.
    ///
    /// Invalid options are replaced by the defaults.
    pub fn with_host(sink: SharedSink<S>, options: PlaybackOptions, host: Arc<dyn FrameHost>) -> Self {
        let options = match options.validate() {
            Ok(()) => options,
            Err(e) => {
                warn!("Rejected playback options ({}), using defaults", e);
                PlaybackOptions::default()
            }
        };
        Self {
            shared: Arc::new(Shared {
                sink,
                host,
                inner: Mutex::new(Inner {
                    stream: Arc::new(Stream::default()),
                    snapshots: SnapshotTable::new(),
                    cursor: None,
                    playhead: None,
                    state: PlaybackState::Idle,
                    options,
                    epoch: 0,
                    task: None,
                }),
                listeners: Listeners::default(),
            }),
        }
    }

    /// Load a new stream. Stops playback and forgets snapshots and cursor.
    ///
    /// Records are [`normalize`]d, so an insert typed over a selection may
    /// become two records.
    pub fn apply(&self, initial_value: impl Into<String>, records: Vec<ChangeRecord>) {
        self.apply_stream(Stream::new(initial_value, records));
    }

    pub fn apply_stream(&self, mut stream: Stream) {
        if !stream.is_ordered() {
            warn!("Stream records out of time order, sorting {} records", stream.len());
            stream.records.sort_by_key(|r| r.time);
        }
        stream.records = normalize(stream.records);
        let mut inner = self.shared.inner();
        inner.cancel();
        if inner.state == PlaybackState::Playing {
            lock(&self.shared.sink).unfreeze();
        }
        debug!("Loaded stream with {} records", stream.len());
        inner.stream = Arc::new(stream);
        inner.snapshots.clear();
        inner.cursor = None;
        inner.playhead = None;
        inner.state = PlaybackState::Idle;
    }

    /// Start or continue playback and return the time it continues from.
    ///
    /// From `Done` this restarts at the first record. While already playing
    /// it only reports the cursor.
    pub fn play(&self) -> Option<i64> {
        let (state, cursor, start) = {
            let inner = self.shared.inner();
            (inner.state, inner.cursor, inner.stream.start())
        };
        match state {
            PlaybackState::Playing => cursor.map(|c| c.time),
            PlaybackState::Done => self.resume(start),
            PlaybackState::Idle | PlaybackState::Paused => self.resume(None),
        }
    }

    /// Rebuild the document at `timestamp` (or the cursor) and play on from
    /// the following record. A no-op on an empty stream.
    pub fn resume(&self, timestamp: Option<i64>) -> Option<i64> {
        self.pause();

        let (epoch, index, time) = {
            let mut inner = self.shared.inner();
            let index = match (timestamp, inner.cursor) {
                (Some(t), _) => inner.stream.index_at(t),
                (None, Some(cursor)) => Some(cursor.index),
                (None, None) => inner.stream.index_at(i64::MIN),
            };
            let Some(index) = index else {
                debug!("Resume ignored: stream is empty");
                return None;
            };
            if Handle::try_current().is_err() {
                error!("Resume needs a Tokio runtime, staying paused");
                return None;
            }

            let time = self.shared.rebuild(&mut inner, index);
            inner.epoch += 1;
            inner.state = PlaybackState::Playing;
            lock(&self.shared.sink).freeze();
            (inner.epoch, index, time)
        };

        debug!("Playing from record {} at {}", index, time);
        self.shared.listeners.emit(&PlayerEvent::Playing { timestamp: time });

        let mut inner = self.shared.inner();
        if inner.is_live(epoch) {
            let shared = self.shared.clone();
            inner.task = Some(tokio::spawn(run(shared, epoch, index + 1)));
        }
        Some(time)
    }

    /// Stop playback. The document keeps whatever the last applied step
    /// produced.
    pub fn pause(&self) {
        let timestamp = {
            let mut inner = self.shared.inner();
            inner.cancel();
            if inner.state != PlaybackState::Playing {
                return;
            }
            lock(&self.shared.sink).unfreeze();
            inner.state = PlaybackState::Paused;
            inner.cursor.map(|c| c.time).unwrap_or_default()
        };
        debug!("Paused at {}", timestamp);
        self.shared.listeners.emit(&PlayerEvent::Paused { timestamp });
    }

    /// Pause, then rebuild the document through the first record at or after
    /// `timestamp`. Returns that record's index, `None` for an empty stream.
    pub fn reset(&self, timestamp: i64) -> Option<usize> {
        self.pause();
        let mut inner = self.shared.inner();
        let index = inner.stream.index_at(timestamp)?;
        self.shared.rebuild(&mut inner, index);
        if inner.state == PlaybackState::Done {
            inner.state = PlaybackState::Paused;
        }
        Some(index)
    }

    /// [`Player::reset`] to a fraction of the stream's span.
    pub fn seek(&self, fraction: f64) -> Option<usize> {
        let time = self.shared.inner().stream.time_at(fraction)?;
        self.reset(time)
    }

    /// Change playback speed. Pauses first if playing.
    pub fn set_speed(&self, speed: f64) {
        if let Err(e) = validate_speed(speed) {
            warn!("Ignoring speed change: {}", e);
            return;
        }
        if self.state() == PlaybackState::Playing {
            self.pause();
        }
        self.shared.inner().options.speed = speed;
    }

    /// Subscribe to one kind of event.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.add(kind, Arc::new(listener))
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.inner().state
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.shared.inner().cursor
    }

    /// Elapsed fraction of the stream at the last applied step.
    pub fn progress(&self) -> f64 {
        let inner = self.shared.inner();
        inner
            .playhead
            .map(|t| inner.stream.progress_at(t))
            .unwrap_or(0.0)
    }

    pub fn snapshots(&self) -> SnapshotTable {
        self.shared.inner().snapshots.clone()
    }

    pub fn options(&self) -> PlaybackOptions {
        self.shared.inner().options
    }

    pub fn stream(&self) -> Arc<Stream> {
        self.shared.inner().stream.clone()
    }

    pub fn sink(&self) -> SharedSink<S> {
        self.shared.sink.clone()
    }
}

impl<S: DocumentSink + 'static> Shared<S> {
    fn inner(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    /// Bring the sink to the state right after record `index` and park the
    /// cursor there. Returns the record's time.
    fn rebuild(&self, inner: &mut Inner, index: usize) -> i64 {
        let stream = inner.stream.clone();
        let time = stream.records[index].time;
        let decile = SnapshotTable::decile(stream.progress_at(time));

        let mut sink = lock(&self.sink);
        let from = match inner.snapshots.best_for(decile, index) {
            Some(snap) => {
                sink.set_value(&snap.value);
                snap.at_index + 1
            }
            None => {
                sink.set_value(&stream.initial_value);
                0
            }
        };
        for record in &stream.records[from..=index] {
            sink.apply_change(&record.change);
        }
        drop(sink);
        debug!("Rebuilt document at record {} replaying {} records", index, index + 1 - from);

        inner.cursor = Some(Cursor { index, time });
        inner.playhead = Some(time);
        time
    }

    /// Apply one step unless playback was stopped, then wait out the gap to
    /// `next_time`. `completes` marks the step that finishes a record.
    /// Returns whether playback should go on.
    async fn step(
        &self,
        epoch: u64,
        op: &Operation,
        time: i64,
        next_time: Option<i64>,
        completes: Option<Cursor>,
    ) -> bool {
        let (fraction, delay) = {
            let mut inner = self.inner();
            if !inner.is_live(epoch) {
                return false;
            }
            let mut sink = lock(&self.sink);
            trace!("Applying {:?} at {}", op.kind(), time);
            sink.apply_change(op);

            inner.playhead = Some(time);
            if let Some(cursor) = completes {
                inner.cursor = Some(cursor);
                let decile = SnapshotTable::decile(inner.stream.progress_at(cursor.time));
                if !inner.snapshots.contains(decile) {
                    inner.snapshots.record(decile, cursor.index, sink.value());
                    debug!("Snapshot for decile {} at record {}", decile, cursor.index);
                }
            }

            let delay = match next_time {
                Some(next) if !op.has_whitespace() => inner.options.scaled_delay(next - time),
                _ => Duration::ZERO,
            };
            (inner.stream.progress_at(time), delay)
        };

        self.listeners.emit(&PlayerEvent::Progress {
            fraction,
            next_delay_ms: delay.as_millis() as u64,
        });
        self.host.delay(delay).await;
        self.inner().is_live(epoch)
    }

    fn finish(&self, epoch: u64) {
        {
            let mut inner = self.inner();
            if !inner.is_live(epoch) {
                return;
            }
            inner.state = PlaybackState::Done;
            inner.task = None;
            let last = inner.stream.records.len().checked_sub(1);
            if let Some(index) = last {
                let time = inner.stream.records[index].time;
                inner.cursor = Some(Cursor { index, time });
                inner.playhead = inner.stream.end();
            }
            lock(&self.sink).unfreeze();
        }
        debug!("Playback done");
        self.listeners.emit(&PlayerEvent::Progress {
            fraction: 1.0,
            next_delay_ms: 0,
        });
        self.listeners.emit(&PlayerEvent::Done);
    }
}

/// Playback task body: applies records from `start` until the stream ends or
/// `epoch` goes stale.
async fn run<S: DocumentSink + 'static>(shared: Arc<Shared<S>>, epoch: u64, start: usize) {
    let stream = shared.inner().stream.clone();
    let records = &stream.records;
    let mut index = start;

    while index < records.len() {
        let batch_size = shared.inner().options.batch_size.max(1);
        let end = (index + batch_size).min(records.len());
        for i in index..end {
            let next_time = records.get(i + 1).map(|r| r.time);
            if !play_record(&shared, epoch, &records[i], i, next_time).await {
                trace!("Playback epoch {} stopped at record {}", epoch, i);
                return;
            }
        }
        index = end;
        shared.host.next_frame().await;
    }
    shared.finish(epoch);
}

async fn play_record<S: DocumentSink + 'static>(
    shared: &Shared<S>,
    epoch: u64,
    record: &ChangeRecord,
    index: usize,
    next_time: Option<i64>,
) -> bool {
    let done = Cursor {
        index,
        time: record.time,
    };
    let Some(steps) = cadence::expand(record) else {
        return shared
            .step(epoch, &record.change, record.time, next_time, Some(done))
            .await;
    };

    let last = steps.len() - 1;
    for (k, (time, op)) in steps.iter().enumerate() {
        let (next, completes) = if k == last {
            (next_time, Some(done))
        } else {
            (Some(steps[k + 1].0), None)
        };
        if !shared.step(epoch, op, *time, next, completes).await {
            return false;
        }
    }
    true
}
