use std::collections::BTreeMap;
use std::num::NonZeroU64;

use crate::error::BridgeError;

/// Identifier of a snapshot held by one component.
///
/// Ids are never reused within a component, so a stale id can never alias a
/// newer snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(NonZeroU64);

impl StateId {
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(StateId)
    }

    pub fn as_raw(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry<S> {
    snapshot: S,
    /// Bytes produced by the last size query, consumed by serialize.
    encoded: Option<Vec<u8>>,
}

/// Snapshots owned by one component, keyed by [`StateId`].
pub struct SnapshotStore<S> {
    next_id: u64,
    entries: BTreeMap<StateId, Entry<S>>,
}

impl<S> Default for SnapshotStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SnapshotStore<S> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, snapshot: S) -> StateId {
        let id = StateId::from_raw(self.next_id).unwrap_or(StateId(NonZeroU64::MIN));
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.entries.insert(
            id,
            Entry {
                snapshot,
                encoded: None,
            },
        );
        id
    }

    pub fn get(&self, id: StateId) -> Result<&S, BridgeError> {
        self.entries
            .get(&id)
            .map(|e| &e.snapshot)
            .ok_or_else(|| unknown(id))
    }

    /// Overwrites the snapshot behind `id`, returning the previous one.
    pub fn replace(&mut self, id: StateId, snapshot: S) -> Result<S, BridgeError> {
        let entry = self.entries.get_mut(&id).ok_or_else(|| unknown(id))?;
        entry.encoded = None;
        Ok(std::mem::replace(&mut entry.snapshot, snapshot))
    }

    /// Removes a snapshot, handing it back for release. Unknown ids yield
    /// `None` and are logged.
    pub fn remove(&mut self, id: StateId) -> Option<S> {
        match self.entries.remove(&id) {
            Some(entry) => Some(entry.snapshot),
            None => {
                tracing::warn!(state = %id, "Ignoring release of unknown snapshot");
                None
            }
        }
    }

    /// Remembers the encoded form of a snapshot and returns its length.
    pub fn cache_encoded(&mut self, id: StateId, bytes: Vec<u8>) -> Result<usize, BridgeError> {
        let entry = self.entries.get_mut(&id).ok_or_else(|| unknown(id))?;
        let len = bytes.len();
        entry.encoded = Some(bytes);
        Ok(len)
    }

    /// Encoded bytes from the most recent size query, checked against the
    /// size the caller expects to receive.
    pub fn encoded(&self, id: StateId, expected_len: usize) -> Result<&[u8], BridgeError> {
        let entry = self.entries.get(&id).ok_or_else(|| unknown(id))?;
        let bytes = entry.encoded.as_deref().ok_or_else(|| {
            BridgeError::fatal(format!(
                "serialized size of snapshot {id} must be queried before serializing"
            ))
        })?;
        if bytes.len() != expected_len {
            return Err(BridgeError::fatal(format!(
                "serialize buffer size {expected_len} does not match queried size {} for snapshot {id}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Removes every snapshot, oldest first.
    pub fn drain(&mut self) -> Vec<S> {
        std::mem::take(&mut self.entries)
            .into_values()
            .map(|e| e.snapshot)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unknown(id: StateId) -> BridgeError {
    BridgeError::fatal(format!("unknown snapshot {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_and_nonzero() {
        let mut store = SnapshotStore::new();
        let a = store.insert("a");
        let b = store.insert("b");
        assert_ne!(a, b);
        assert!(a.as_raw() > 0);
        assert_eq!(*store.get(a).unwrap(), "a");
        assert_eq!(*store.get(b).unwrap(), "b");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut store = SnapshotStore::new();
        let a = store.insert(1);
        assert_eq!(store.remove(a), Some(1));
        let b = store.insert(2);
        assert_ne!(a, b);
        assert!(store.get(a).is_err());
    }

    #[test]
    fn removing_unknown_id_is_a_noop() {
        let mut store: SnapshotStore<u8> = SnapshotStore::new();
        let bogus = StateId::from_raw(42).unwrap();
        assert_eq!(store.remove(bogus), None);
        assert!(store.is_empty());
    }

    #[test]
    fn serialize_requires_matching_queried_size() {
        let mut store = SnapshotStore::new();
        let id = store.insert(());
        assert!(store.encoded(id, 3).unwrap_err().is_fatal());

        assert_eq!(store.cache_encoded(id, vec![1, 2, 3]).unwrap(), 3);
        assert_eq!(store.encoded(id, 3).unwrap(), &[1, 2, 3]);
        assert!(store.encoded(id, 4).unwrap_err().is_fatal());
    }

    #[test]
    fn replace_keeps_id_and_drops_cached_bytes() {
        let mut store = SnapshotStore::new();
        let id = store.insert("old");
        store.cache_encoded(id, vec![9]).unwrap();
        assert_eq!(store.replace(id, "new").unwrap(), "old");
        assert_eq!(*store.get(id).unwrap(), "new");
        assert!(store.encoded(id, 1).is_err());
    }

    #[test]
    fn drain_empties_store_in_insertion_order() {
        let mut store = SnapshotStore::new();
        store.insert("first");
        store.insert("second");
        assert_eq!(store.drain(), vec!["first", "second"]);
        assert!(store.is_empty());
    }

    #[test]
    fn zero_is_not_a_valid_id() {
        assert!(StateId::from_raw(0).is_none());
    }
}
