//! Append-only event log.

use serde::{Deserialize, Serialize};

/// Ordered, append-only sequence of events.
///
/// The log never reorders or drops an entry; its length doubles as the
/// cursor of the next event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog<E> {
    events: Vec<E>,
}

impl<E> Default for EventLog<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventLog<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append and return the index the event landed at
    pub fn append(&mut self, event: E) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    /// The first `until` events
    pub fn prefix(&self, until: usize) -> &[E] {
        &self.events[..until.min(self.events.len())]
    }

    pub fn get(&self, index: usize) -> Option<&E> {
        self.events.get(index)
    }

    /// Position the next appended event will take
    pub fn cursor(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.events.iter()
    }
}

impl<E> From<Vec<E>> for EventLog<E> {
    fn from(events: Vec<E>) -> Self {
        Self { events }
    }
}

impl<'a, E> IntoIterator for &'a EventLog<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
