//! Decile snapshots of the document, used to shorten seeks.

/// Document content after the record at `at_index` was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub at_index: usize,
    pub value: String,
}

/// One optional snapshot per tenth of playback progress.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTable {
    slots: [Option<Snapshot>; 10],
}

impl SnapshotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decile bucket for a progress fraction.
    pub fn decile(fraction: f64) -> usize {
        ((fraction.clamp(0.0, 1.0) * 10.0).floor() as usize).min(9)
    }

    pub fn contains(&self, decile: usize) -> bool {
        self.slots.get(decile).is_some_and(Option::is_some)
    }

    /// Store a snapshot unless the decile already has one.
    /// Returns whether it was stored.
    pub fn record(&mut self, decile: usize, at_index: usize, value: String) -> bool {
        match self.slots.get_mut(decile) {
            Some(slot) if slot.is_none() => {
                *slot = Some(Snapshot { at_index, value });
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, decile: usize) -> Option<&Snapshot> {
        self.slots.get(decile).and_then(Option::as_ref)
    }

    /// Latest snapshot at or below `decile` that does not lie past `index`.
    pub fn best_for(&self, decile: usize, index: usize) -> Option<&Snapshot> {
        let top = decile.min(9);
        self.slots[..=top]
            .iter()
            .rev()
            .flatten()
            .find(|snap| snap.at_index <= index)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Snapshot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(decile, slot)| slot.as_ref().map(|snap| (decile, snap)))
    }
}
