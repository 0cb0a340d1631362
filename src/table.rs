//! Fixed-capacity handle table
//!
//! Open streams are referred to by small integer ids rather than pointers.
//! Ids start at 1, so a zero id never names an entry.

use std::fmt::Display;
use std::num::NonZeroUsize;

use crate::{Error, Result};

/// Default number of remote streams that may be open at once.
pub const DEFAULT_MAX_OPEN_HANDLES: usize = 20;

/// Id of an entry in a [HandleTable].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(NonZeroUsize);

impl HandleId {
    pub fn get(&self) -> usize {
        self.0.get()
    }

    fn from_slot(slot: usize) -> Self {
        Self(NonZeroUsize::MIN.saturating_add(slot))
    }

    fn slot(&self) -> usize {
        self.0.get() - 1
    }
}

impl Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

impl TryFrom<usize> for HandleId {
    type Error = std::num::TryFromIntError;

    fn try_from(value: usize) -> std::result::Result<Self, Self::Error> {
        NonZeroUsize::try_from(value).map(Self)
    }
}

#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> HandleTable<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Store `value` in the lowest free slot.
    pub fn register(&mut self, value: T) -> Result<HandleId> {
        let capacity = self.capacity();
        let (slot, entry) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.is_none())
            .ok_or(Error::TableFull { capacity })?;
        *entry = Some(value);
        Ok(HandleId::from_slot(slot))
    }

    /// The entry for `id`, or `None` if it is out of range or free.
    pub fn lookup(&mut self, id: HandleId) -> Option<&mut T> {
        self.slots.get_mut(id.slot()).and_then(Option::as_mut)
    }

    /// Remove the entry for `id`, freeing its slot.
    pub fn release(&mut self, id: HandleId) -> Option<T> {
        self.slots.get_mut(id.slot()).and_then(Option::take)
    }

    /// Remove every entry.
    pub fn drain(&mut self) -> impl Iterator<Item = (HandleId, T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, entry)| Some((HandleId::from_slot(slot), entry.take()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> HandleId {
        HandleId::try_from(n).unwrap()
    }

    #[test]
    fn test_register_until_full() {
        let mut table = HandleTable::new(3);
        assert!(table.is_empty());
        let ids: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|v| table.register(v).unwrap())
            .collect();
        assert_eq!(ids.iter().map(HandleId::get).collect::<Vec<_>>(), [1, 2, 3]);
        assert!(table.is_full());

        let err = table.register("d").unwrap_err();
        assert!(matches!(err, Error::TableFull { capacity: 3 }));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_release_reuses_slot() {
        let mut table = HandleTable::new(2);
        let a = table.register("a").unwrap();
        let b = table.register("b").unwrap();

        assert_eq!(table.release(a), Some("a"));
        assert_eq!(table.release(a), None);
        assert_eq!(table.lookup(a), None);

        let c = table.register("c").unwrap();
        assert_eq!(c, a);
        assert_eq!(table.lookup(c).copied(), Some("c"));
        assert_eq!(table.lookup(b).copied(), Some("b"));
    }

    #[test]
    fn test_lookup_out_of_range() {
        let mut table = HandleTable::<u8>::new(2);
        assert_eq!(table.lookup(id(3)), None);
        assert_eq!(table.release(id(100)), None);
        assert!(HandleId::try_from(0).is_err());
    }

    #[test]
    fn test_drain() {
        let mut table = HandleTable::new(4);
        table.register(1).unwrap();
        let two = table.register(2).unwrap();
        table.register(3).unwrap();
        table.release(two);

        let drained: Vec<_> = table.drain().map(|(id, v)| (id.get(), v)).collect();
        assert_eq!(drained, [(1, 1), (3, 3)]);
        assert!(table.is_empty());
    }
}
