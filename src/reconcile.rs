//! Merging the stored episode list with a fresh guide fetch.
//!
//! The merge is keyed by normalized title and relies on insertion order:
//! a title keeps the slot it was first inserted at, and a later write for
//! the same title replaces the value in that slot. See [`reconcile`].

use std::collections::HashMap;

use crate::storage::Episode;

/// Title-keyed map that remembers insertion order.
///
/// `insert` on an existing title overwrites the value in place; new titles
/// are appended. Iteration follows slot order.
#[derive(Debug, Default)]
pub struct TitleIndex {
    slots: Vec<Episode>,
    positions: HashMap<String, usize>,
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, title: &str) -> Option<&Episode> {
        self.positions.get(title).map(|&i| &self.slots[i])
    }

    /// Insert or overwrite the entry for `episode.title`.
    pub fn insert(&mut self, episode: Episode) {
        match self.positions.get(&episode.title) {
            Some(&i) => self.slots[i] = episode,
            None => {
                self.positions.insert(episode.title.clone(), self.slots.len());
                self.slots.push(episode);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Values in slot order.
    pub fn into_episodes(self) -> Vec<Episode> {
        self.slots
    }
}

/// Merges `existing` (from storage) with `fetched` (server order, nearest
/// broadcast first) into a list unique by title.
///
/// 1. `existing` seeds the index; episodes with an empty title are dropped.
/// 2. `fetched` is walked in reverse. A fetched episode inherits `recorded`
///    from the entry already holding its title, then replaces that entry.
///    Because of the reversal, when one fetch contains the same title twice
///    the earlier (nearer) occurrence is written last and wins.
/// 3. The index is returned in slot order.
///
/// Fetched episodes with an empty title are kept; only the stored side is
/// filtered.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use showwatch::reconcile::reconcile;
/// use showwatch::storage::Episode;
///
/// let at = |d| Utc.with_ymd_and_hms(2024, 5, d, 21, 0, 0).unwrap();
/// let ep = |t: &str, d, r| Episode { title: t.into(), start_time: at(d), recorded: r, url: format!("u/{t}/{d}") };
///
/// let merged = reconcile(vec![ep("A", 1, true)], vec![ep("A", 8, false), ep("B", 9, false)]);
/// assert_eq!(merged.len(), 2);
/// assert!(merged[0].recorded);
/// assert_eq!(merged[0].start_time, at(8));
/// ```
pub fn reconcile(existing: Vec<Episode>, fetched: Vec<Episode>) -> Vec<Episode> {
    let mut index = TitleIndex::new();

    let stored = existing.len();
    for episode in existing {
        if episode.title.is_empty() {
            continue;
        }
        index.insert(episode);
    }
    let seeded = index.len();
    if seeded < stored {
        tracing::debug!(dropped = stored - seeded, "Ignoring stored episodes without a title");
    }

    let mut carried = 0usize;
    for mut episode in fetched.into_iter().rev() {
        if let Some(previous) = index.get(&episode.title) {
            episode.recorded = previous.recorded;
            if previous.recorded {
                carried += 1;
            }
        }
        index.insert(episode);
    }

    tracing::debug!(
        stored = seeded,
        merged = index.len(),
        recorded_carried = carried,
        "Episodes reconciled"
    );
    index.into_episodes()
}
