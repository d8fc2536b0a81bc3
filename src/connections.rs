//! Connection table tracking live handles

use crate::transport::ConnectionId;

/// Ordered collection of live connection handles.
///
/// Disconnected handles are invalidated in place during event dispatch and
/// physically removed by [`compact`](ConnectionTable::compact), which only
/// ever runs as a dedicated pre-pass at the start of the next tick.
/// Swap-remove makes removal O(1) but shifts later slots, which is exactly
/// why it must never run while a dispatch pass is iterating the table.
#[derive(Debug)]
pub struct ConnectionTable {
    slots: Vec<Option<ConnectionId>>,
}

impl ConnectionTable {
    /// Create a table with room for `capacity` handles before reallocating
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Append a newly accepted handle.
    ///
    /// The table never holds duplicates; the transport issues each handle
    /// exactly once.
    pub fn add(&mut self, conn: ConnectionId) {
        debug_assert!(!self.contains(conn), "duplicate handle {conn}");
        self.slots.push(Some(conn));
    }

    /// Whether `conn` is currently registered and valid
    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.slots.iter().any(|slot| *slot == Some(conn))
    }

    /// Mark the handle's slot for removal by the next [`compact`](Self::compact).
    ///
    /// Returns `false` if the handle was not registered (or already
    /// invalidated).
    pub fn invalidate(&mut self, conn: ConnectionId) -> bool {
        for slot in &mut self.slots {
            if *slot == Some(conn) {
                *slot = None;
                return true;
            }
        }
        false
    }

    /// Remove all invalidated slots, swap-with-last, returning how many
    /// were removed. Order is not preserved.
    pub fn compact(&mut self) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.slots.len() {
            if self.slots[i].is_none() {
                self.slots.swap_remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    /// Iterate the currently valid handles in table order.
    ///
    /// A fresh pass each call, not a persistent cursor.
    pub fn iter(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    /// Number of slots, including invalidated ones awaiting compaction.
    ///
    /// The dispatch loop indexes `0..slot_count()` so it can invalidate
    /// handles mid-pass without holding a borrow of the table.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The handle at slot `index`, if still valid
    pub fn get(&self, index: usize) -> Option<ConnectionId> {
        self.slots.get(index).copied().flatten()
    }

    /// Number of currently valid handles
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether the table holds no valid handles
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(raw: u64) -> ConnectionId {
        ConnectionId::from_raw(raw)
    }

    #[test]
    fn add_and_iterate_in_order() {
        let mut table = ConnectionTable::with_capacity(4);
        table.add(conn(1));
        table.add(conn(2));
        table.add(conn(3));

        let handles: Vec<_> = table.iter().collect();
        assert_eq!(handles, vec![conn(1), conn(2), conn(3)]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn invalidated_handle_is_hidden_but_slot_remains() {
        let mut table = ConnectionTable::with_capacity(4);
        table.add(conn(1));
        table.add(conn(2));

        assert!(table.invalidate(conn(1)));
        assert!(!table.contains(conn(1)));
        assert_eq!(table.len(), 1);
        // Slot survives until compact
        assert_eq!(table.slot_count(), 2);
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(1), Some(conn(2)));
    }

    #[test]
    fn invalidate_unknown_handle_is_noop() {
        let mut table = ConnectionTable::with_capacity(4);
        table.add(conn(1));
        assert!(!table.invalidate(conn(99)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn compact_swap_removes_all_invalid_slots() {
        let mut table = ConnectionTable::with_capacity(8);
        for raw in 1..=5 {
            table.add(conn(raw));
        }
        table.invalidate(conn(1));
        table.invalidate(conn(3));

        assert_eq!(table.compact(), 2);
        assert_eq!(table.slot_count(), 3);
        assert_eq!(table.len(), 3);
        for raw in [2, 4, 5] {
            assert!(table.contains(conn(raw)));
        }
    }

    #[test]
    fn compact_handles_adjacent_invalid_slots() {
        // Swap-remove pulls the last slot into the hole; adjacent holes must
        // not be skipped by the index walk.
        let mut table = ConnectionTable::with_capacity(8);
        for raw in 1..=4 {
            table.add(conn(raw));
        }
        table.invalidate(conn(3));
        table.invalidate(conn(4));

        assert_eq!(table.compact(), 2);
        assert_eq!(table.len(), 2);
        assert!(table.contains(conn(1)));
        assert!(table.contains(conn(2)));
    }

    #[test]
    fn compact_on_clean_table_removes_nothing() {
        let mut table = ConnectionTable::with_capacity(2);
        table.add(conn(1));
        assert_eq!(table.compact(), 0);
        assert_eq!(table.len(), 1);
    }
}
