//! Rotation ring for staggered account backups.
//!
//! Banks are never removed, so the ring is a plain `Vec` plus a modular
//! cursor. The cursor is atomic so the backup task can advance it while
//! holding only the ledger's shared lock.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct RotationRing {
    names: Vec<String>,
    cursor: AtomicUsize,
}

impl RotationRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: Vec::with_capacity(capacity),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Add a bank at the tail. The cursor is left where it is; on the first
    /// append it points at the new element.
    pub fn append(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// Move the cursor one step, wrapping after the last element.
    ///
    /// Returns the bank now under the cursor, or `None` if the ring is empty.
    pub fn advance(&self) -> Option<&str> {
        let len = self.names.len();
        if len == 0 {
            return None;
        }
        let prev = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        Some(self.names[(prev + 1) % len].as_str())
    }

    /// Bank under the cursor.
    pub fn current(&self) -> Option<&str> {
        let len = self.names.len();
        if len == 0 {
            return None;
        }
        let idx = self.cursor.load(Ordering::Acquire) % len;
        Some(self.names[idx].as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_of(names: &[&str]) -> RotationRing {
        let mut ring = RotationRing::new();
        for name in names {
            ring.append(*name);
        }
        ring
    }

    #[test]
    fn test_empty_ring() {
        let ring = RotationRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.current(), None);
        assert_eq!(ring.advance(), None);
    }

    #[test]
    fn test_first_append_sets_current() {
        let ring = ring_of(&["Alpha"]);
        assert_eq!(ring.current(), Some("Alpha"));
        assert_eq!(ring.advance(), Some("Alpha"));
        assert_eq!(ring.advance(), Some("Alpha"));
    }

    #[test]
    fn test_advance_wraps_around() {
        let ring = ring_of(&["A", "B", "C"]);
        assert_eq!(ring.current(), Some("A"));
        assert_eq!(ring.advance(), Some("B"));
        assert_eq!(ring.advance(), Some("C"));
        assert_eq!(ring.advance(), Some("A"));
        assert_eq!(ring.current(), Some("A"));
    }

    #[test]
    fn test_append_does_not_move_cursor() {
        let mut ring = ring_of(&["A", "B"]);
        assert_eq!(ring.advance(), Some("B"));
        ring.append("C");
        assert_eq!(ring.current(), Some("B"));
        assert_eq!(ring.advance(), Some("C"));
        assert_eq!(ring.advance(), Some("A"));
    }

    #[test]
    fn test_full_rotation_visits_each_once() {
        let ring = ring_of(&["A", "B", "C", "D"]);
        let visited: Vec<&str> = (0..ring.len()).filter_map(|_| ring.advance()).collect();
        assert_eq!(visited, vec!["B", "C", "D", "A"]);

        let mut sorted = visited.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn test_iter_preserves_insertion_order() {
        let ring = ring_of(&["Zeta", "Alpha", "Mu"]);
        let names: Vec<&str> = ring.iter().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mu"]);
    }
}
