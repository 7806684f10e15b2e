//! Open-addressing string map, the future symbol table.
//!
//! Values are non-negative `i32`s. Two negative values are reserved as slot
//! markers: [`ABSENT`] for a slot that was never used and [`TOMBSTONE`] for a
//! deleted one.

use anyhow::ensure;

/// Returned by [`SymbolMap::get`] when the key has no binding.
pub const ABSENT: i32 = -1;
/// Marker left in a slot after [`SymbolMap::delete`].
pub const TOMBSTONE: i32 = -2;

const MIN_CAPACITY: usize = 8;
const MAX_LOAD: f64 = 0.75;

#[derive(Debug, Clone, Copy)]
struct Entry<'a> {
    key: Option<&'a str>,
    value: i32,
}

impl Entry<'_> {
    const EMPTY: Self = Entry {
        key: None,
        value: ABSENT,
    };
}

/// Linear-probing hash map keyed by borrowed strings.
#[derive(Debug, Default, Clone)]
pub struct SymbolMap<'a> {
    /// Occupied plus tombstoned slots.
    count: usize,
    entries: Vec<Entry<'a>>,
}

impl<'a> SymbolMap<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `value`, overwriting any previous binding.
    pub fn set(&mut self, key: &'a str, value: i32) -> anyhow::Result<()> {
        ensure!(value >= 0, "symbol values must be non-negative, got {value}");

        if (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD {
            let capacity = if self.entries.len() < MIN_CAPACITY {
                MIN_CAPACITY
            } else {
                self.entries.len() * 2
            };
            self.adjust_capacity(capacity);
        }

        let index = find_slot(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_none() && entry.value == ABSENT {
            self.count += 1;
        }

        entry.key = Some(key);
        entry.value = value;
        Ok(())
    }

    /// The value bound to `key`, or [`ABSENT`].
    pub fn get(&self, key: &str) -> i32 {
        if self.entries.is_empty() {
            return ABSENT;
        }

        let entry = &self.entries[find_slot(&self.entries, key)];
        match entry.key {
            Some(_) => entry.value,
            None => ABSENT,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key) != ABSENT
    }

    /// Remove the binding for `key`, leaving a tombstone so probe chains stay
    /// intact. Missing keys are ignored.
    pub fn delete(&mut self, key: &str) {
        if self.entries.is_empty() {
            return;
        }

        let index = find_slot(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_some() {
            entry.key = None;
            entry.value = TOMBSTONE;
        }
    }

    /// Copy every live binding of `other` into `self`.
    pub fn add_all(&mut self, other: &SymbolMap<'a>) -> anyhow::Result<()> {
        for (key, value) in other.iter() {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Live bindings in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, i32)> + '_ {
        self.entries
            .iter()
            .filter_map(|entry| entry.key.map(|key| (key, entry.value)))
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Ratio of used (live or tombstoned) slots to capacity.
    pub fn load_factor(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.count as f64 / self.entries.len() as f64
        }
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let mut entries = vec![Entry::EMPTY; capacity];

        // Tombstones are dropped here, so the count starts over.
        self.count = 0;
        for entry in &self.entries {
            let Some(key) = entry.key else { continue };

            let index = find_slot(&entries, key);
            entries[index] = *entry;
            self.count += 1;
        }

        log::trace!(
            "symbol map grew from {} to {} slots",
            self.entries.len(),
            capacity
        );
        self.entries = entries;
    }
}

/// Index of the slot holding `key`, or of the slot where it should go: the
/// first tombstone on the probe chain if any, else the empty slot that ended it.
///
/// `entries` must be non-empty and contain at least one empty slot.
fn find_slot(entries: &[Entry<'_>], key: &str) -> usize {
    let capacity = entries.len();
    let mut index = hash_key(key) as usize % capacity;
    let mut tombstone = None;

    loop {
        let entry = &entries[index];
        match entry.key {
            Some(existing) if existing == key => return index,
            Some(_) => {}
            None if entry.value == ABSENT => return tombstone.unwrap_or(index),
            None => {
                tombstone.get_or_insert(index);
            }
        }

        index = (index + 1) % capacity;
    }
}

/// 32-bit FNV-1a.
fn hash_key(key: &str) -> u32 {
    key.bytes().fold(2166136261u32, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(16777619)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map() {
        let mut map = SymbolMap::new();
        assert_eq!(map.get("x"), ABSENT);
        map.delete("x");
        assert_eq!(map.capacity(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn set_get_overwrite() {
        let mut map = SymbolMap::new();
        map.set("x", 1).unwrap();
        map.set("y", 2).unwrap();
        map.set("x", 3).unwrap();

        assert_eq!(map.get("x"), 3);
        assert_eq!(map.get("y"), 2);
        assert_eq!(map.get("z"), ABSENT);
        assert!(map.contains_key("y"));
        assert!(!map.contains_key("z"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn keys_compare_by_content() {
        let source = String::from("count count");
        let (first, second) = (&source[0..5], &source[6..11]);
        assert_ne!(first.as_ptr(), second.as_ptr());

        let mut map = SymbolMap::new();
        map.set(first, 7).unwrap();
        assert_eq!(map.get(second), 7);
    }

    #[test]
    fn rejects_negative_values() {
        let mut map = SymbolMap::new();
        assert!(map.set("x", ABSENT).is_err());
        assert!(map.set("x", TOMBSTONE).is_err());
        assert_eq!(map.get("x"), ABSENT);
    }

    #[test]
    fn delete_leaves_probe_chain_intact() {
        let keys: Vec<String> = (0..6).map(|i| format!("k{i}")).collect();
        let mut map = SymbolMap::new();
        for (i, key) in keys.iter().enumerate() {
            map.set(key, i as i32).unwrap();
        }

        map.delete("k0");
        map.delete("k3");

        for (i, key) in keys.iter().enumerate() {
            let expected = if i == 0 || i == 3 { ABSENT } else { i as i32 };
            assert_eq!(map.get(key), expected, "key {key}");
        }
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn reinsert_after_delete() {
        let mut map = SymbolMap::new();
        map.set("a", 1).unwrap();
        map.delete("a");
        map.set("a", 2).unwrap();
        assert_eq!(map.get("a"), 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn grows_before_exceeding_load() {
        let keys: Vec<String> = (0..100).map(|i| format!("symbol_{i}")).collect();
        let mut map = SymbolMap::new();
        for (i, key) in keys.iter().enumerate() {
            map.set(key, i as i32).unwrap();
            assert!(map.load_factor() <= 0.75);
        }

        assert_eq!(map.capacity(), 256);
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(map.get(key), i as i32);
        }
    }

    #[test]
    fn add_all_copies_live_entries() {
        let mut from = SymbolMap::new();
        from.set("a", 1).unwrap();
        from.set("b", 2).unwrap();
        from.set("c", 3).unwrap();
        from.delete("b");

        let mut to = SymbolMap::new();
        to.set("a", 10).unwrap();
        to.set("d", 4).unwrap();
        to.add_all(&from).unwrap();

        assert_eq!(to.get("a"), 1);
        assert_eq!(to.get("b"), ABSENT);
        assert_eq!(to.get("c"), 3);
        assert_eq!(to.get("d"), 4);
    }

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(hash_key(""), 2166136261);
        assert_eq!(hash_key("a"), 0xe40c292c);
    }
}
