//! Player event surface and listener registry.

use std::sync::{Arc, Mutex, PoisonError};

/// Events emitted while a stream plays.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playback started or resumed at `timestamp`.
    Playing { timestamp: i64 },
    /// Playback paused with the cursor at `timestamp`.
    Paused { timestamp: i64 },
    /// A record was applied. `next_delay_ms` is the wait before the next one.
    Progress { fraction: f64, next_delay_ms: u64 },
    /// Every record has been applied.
    Done,
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Playing { .. } => EventKind::Playing,
            PlayerEvent::Paused { .. } => EventKind::Paused,
            PlayerEvent::Progress { .. } => EventKind::Progress,
            PlayerEvent::Done => EventKind::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Playing,
    Paused,
    Progress,
    Done,
}

/// Handle returned by `Player::on`, consumed by `Player::off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(ListenerId, EventKind, Listener)>,
}

/// Subscriber table. Listeners are invoked outside the table lock, so a
/// listener may subscribe, unsubscribe or call back into the player.
#[derive(Default)]
pub(crate) struct Listeners {
    registry: Mutex<Registry>,
}

impl Listeners {
    pub fn add(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.entries.push((id, kind, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.entries.len();
        registry.entries.retain(|(entry, _, _)| *entry != id);
        registry.entries.len() != before
    }

    pub fn emit(&self, event: &PlayerEvent) {
        let kind = event.kind();
        let targets: Vec<Listener> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry
                .entries
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, l)| l.clone())
                .collect()
        };
        for listener in targets {
            listener(event);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}
