//! Fixed-capacity arena of connection slots.
//!
//! Slots are addressed by small stable integers. Allocation pops a free list,
//! so admission is O(1) and the capacity is a hard admission-control limit.

use std::fmt;

/// Handle of an occupied slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct SlotArena<T> {
    entries: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> SlotArena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self {
            entries,
            // reversed so the lowest index is handed out first
            free: (0..capacity).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupy the lowest free slot with a value built from its id, or return
    /// `None` when every slot is taken.
    pub fn insert_with<F>(&mut self, value: F) -> Option<SlotId>
    where
        F: FnOnce(SlotId) -> T,
    {
        let idx = self.free.pop()?;
        let id = SlotId(idx);
        self.entries[idx] = Some(value(id));
        Some(id)
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let value = self.entries.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(value)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.entries.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.entries.get_mut(id.0)?.as_mut()
    }

    /// Empty every slot, returning the values in slot order
    pub fn drain(&mut self) -> Vec<T> {
        let drained: Vec<T> = self.entries.iter_mut().filter_map(Option::take).collect();
        self.free = (0..self.entries.len()).rev().collect();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupy<T>(arena: &mut SlotArena<T>, value: T) -> Option<SlotId> {
        arena.insert_with(|_| value)
    }

    #[test]
    fn capacity_is_a_hard_limit() {
        let mut arena = SlotArena::with_capacity(2);
        assert!(occupy(&mut arena, "a").is_some());
        assert!(occupy(&mut arena, "b").is_some());
        assert!(occupy(&mut arena, "c").is_none());
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.capacity(), 2);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut arena = SlotArena::with_capacity(3);
        let a = occupy(&mut arena, 'a').unwrap();
        let b = occupy(&mut arena, 'b').unwrap();
        assert_eq!((a.to_string(), b.to_string()), ("0".into(), "1".into()));

        assert_eq!(arena.remove(a), Some('a'));
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.get(b), Some(&'b'));

        let c = occupy(&mut arena, 'c').unwrap();
        assert_eq!(c, a);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn insert_with_sees_its_own_id() {
        let mut arena = SlotArena::with_capacity(1);
        let id = arena.insert_with(|id| id.to_string()).unwrap();
        assert_eq!(arena.get(id).map(String::as_str), Some("0"));
        assert!(arena.insert_with(|_| String::new()).is_none());
    }

    #[test]
    fn drain_releases_everything() {
        let mut arena = SlotArena::with_capacity(4);
        for i in 0..3 {
            occupy(&mut arena, i).unwrap();
        }
        assert_eq!(arena.drain(), vec![0, 1, 2]);
        assert!(arena.is_empty());
        assert!(occupy(&mut arena, 9).is_some());
    }
}
