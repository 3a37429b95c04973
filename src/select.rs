//! Selectable collections
//!
//! `ActiveSet` is the foundation for every list in the inbox: thread areas,
//! groups, thread rows and the messages of an open thread. Items never carry
//! their own `active` flag; it lives next to them in the set so the single-
//! and multi-select invariants can only be changed through set operations.

use std::fmt;

use crate::error::{Error, Result};

/// Anything that can live in an [`ActiveSet`]. Items are unique by key.
pub trait Selectable {
    type Key: Clone + Eq + fmt::Debug + fmt::Display;

    fn key(&self) -> Self::Key;
}

/// Outcome of a selection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Activated,
    Deactivated,
}

impl SelectionChange {
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    item: T,
    active: bool,
}

#[derive(Debug, Clone)]
pub struct ActiveSet<T: Selectable> {
    entries: Vec<Entry<T>>,
    multi: bool,
    disallow_null: bool,
    /// Bumped on every selection change so observers can detect staleness
    revision: u64,
}

impl<T: Selectable> ActiveSet<T> {
    /// At most one active item.
    pub fn single() -> Self {
        Self {
            entries: Vec::new(),
            multi: false,
            disallow_null: false,
            revision: 0,
        }
    }

    /// Any number of active items.
    pub fn multi() -> Self {
        Self {
            multi: true,
            ..Self::single()
        }
    }

    /// Forbid deselecting the last active item through `change_active`.
    pub fn disallow_null(mut self) -> Self {
        self.disallow_null = true;
        self
    }

    /// Build a set from `(item, active)` pairs.
    pub fn with_items(mut self, items: impl IntoIterator<Item = (T, bool)>) -> Self {
        for (item, active) in items {
            self.push(item, active);
        }
        self
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Insert an item, or replace the item with the same key in place.
    /// Activating an item in a single-select set deactivates the others.
    pub fn push(&mut self, item: T, active: bool) {
        if active && !self.multi {
            self.clear_flags();
        }
        let key = item.key();
        match self.position(&key) {
            Some(pos) => {
                self.entries[pos].item = item;
                self.entries[pos].active = active;
            }
            None => self.entries.push(Entry { item, active }),
        }
        self.revision += 1;
    }

    /// Replace the whole contents with inactive items, dropping duplicate keys.
    pub fn replace(&mut self, items: impl IntoIterator<Item = T>) {
        self.entries.clear();
        for item in items {
            let key = item.key();
            if self.position(&key).is_some() {
                tracing::warn!("Dropping duplicate item {} from collection", key);
                continue;
            }
            self.entries.push(Entry {
                item,
                active: false,
            });
        }
        self.revision += 1;
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.position(key).map(|pos| &self.entries[pos].item)
    }

    /// Mutable access to an item's domain fields. Selection stays with the set.
    pub fn get_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        self.position(key).map(|pos| &mut self.entries[pos].item)
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<&T> {
        self.entries
            .iter()
            .map(|e| &e.item)
            .find(|item| predicate(item))
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.position(key).is_some()
    }

    pub fn is_active(&self, key: &T::Key) -> bool {
        self.position(key)
            .map(|pos| self.entries[pos].active)
            .unwrap_or(false)
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let pos = self.position(key)?;
        let entry = self.entries.remove(pos);
        if entry.active {
            self.revision += 1;
        }
        Some(entry.item)
    }

    /// Items with their active flag, in collection order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, bool)> {
        self.entries.iter().map(|e| (&e.item, e.active))
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.item)
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|e| &mut e.item)
    }

    pub fn first(&self) -> Option<&T> {
        self.entries.first().map(|e| &e.item)
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last().map(|e| &e.item)
    }

    /// All active items (what a multi-select set reports).
    pub fn active(&self) -> Vec<&T> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| &e.item)
            .collect()
    }

    /// The active item of a single-select set.
    pub fn active_one(&self) -> Option<&T> {
        self.entries.iter().find(|e| e.active).map(|e| &e.item)
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.active).count()
    }

    pub fn active_keys(&self) -> Vec<T::Key> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.item.key())
            .collect()
    }

    /// Set every active item inactive. No-op when nothing is active.
    pub fn deactivate(&mut self) -> &mut Self {
        if self.clear_flags() {
            self.revision += 1;
        }
        self
    }

    /// Toggle the item's selection while preserving the set's invariants.
    ///
    /// - with `disallow_null`, an already active item stays active
    /// - in a single-select set, activating an item deactivates the others first
    /// - in a multi-select set only the target is touched
    pub fn change_active(&mut self, key: &T::Key) -> Result<SelectionChange> {
        let pos = self.require(key)?;

        if self.disallow_null && self.entries[pos].active {
            return Ok(SelectionChange::Unchanged);
        }
        if !self.multi && !self.entries[pos].active {
            self.clear_flags();
        }

        let entry = &mut self.entries[pos];
        entry.active = !entry.active;
        self.revision += 1;

        Ok(if entry.active {
            SelectionChange::Activated
        } else {
            SelectionChange::Deactivated
        })
    }

    /// Make sure the item is active, without ever toggling it off.
    pub fn select(&mut self, key: &T::Key) -> Result<SelectionChange> {
        let pos = self.require(key)?;
        if self.entries[pos].active {
            return Ok(SelectionChange::Unchanged);
        }
        self.change_active(key)
    }

    /// Activate or deactivate every item. Activating all is only valid for
    /// multi-select sets.
    pub fn set_all(&mut self, active: bool) -> Result<&mut Self> {
        if active && !self.multi && self.entries.len() > 1 {
            return Err(Error::InvariantViolation(
                "cannot activate every item of a single-select collection".to_string(),
            ));
        }
        let mut changed = false;
        for entry in &mut self.entries {
            changed |= entry.active != active;
            entry.active = active;
        }
        if changed {
            self.revision += 1;
        }
        Ok(self)
    }

    fn position(&self, key: &T::Key) -> Option<usize> {
        self.entries.iter().position(|e| &e.item.key() == key)
    }

    fn require(&self, key: &T::Key) -> Result<usize> {
        self.position(key).ok_or_else(|| {
            tracing::error!("Selection targeted item {} not in collection", key);
            Error::InvariantViolation(format!("item {} is not in this collection", key))
        })
    }

    fn clear_flags(&mut self) -> bool {
        let mut changed = false;
        for entry in &mut self.entries {
            changed |= entry.active;
            entry.active = false;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Animal(&'static str);

    impl Selectable for Animal {
        type Key = &'static str;

        fn key(&self) -> Self::Key {
            self.0
        }
    }

    fn animals() -> Vec<(Animal, bool)> {
        vec![
            (Animal("bear"), false),
            (Animal("cat"), true),
            (Animal("owl"), false),
        ]
    }

    #[test]
    fn test_multi_allows_several_active() {
        let mut set = ActiveSet::multi().with_items(animals());
        assert_eq!(set.active(), vec![&Animal("cat")]);

        set.change_active(&"bear").unwrap();
        assert_eq!(set.active_count(), 2);
        assert!(set.is_active(&"cat"));
    }

    #[test]
    fn test_multi_never_deactivates_others() {
        let mut set = ActiveSet::multi().with_items(animals());
        let sequence = ["bear", "owl", "cat", "bear", "owl", "owl", "cat"];
        for key in sequence {
            let before: Vec<_> = set
                .iter()
                .filter(|(a, _)| a.0 != key)
                .map(|(a, active)| (a.0, active))
                .collect();
            set.change_active(&key).unwrap();
            let after: Vec<_> = set
                .iter()
                .filter(|(a, _)| a.0 != key)
                .map(|(a, active)| (a.0, active))
                .collect();
            assert_eq!(before, after);
        }
    }

    #[test]
    fn test_nullable_single_can_reach_zero_active() {
        let mut set = ActiveSet::single().with_items(animals());
        assert_eq!(set.active_one(), Some(&Animal("cat")));

        let change = set.change_active(&"cat").unwrap();
        assert_eq!(change, SelectionChange::Deactivated);
        assert!(set.active_one().is_none());
        assert!(set.active().is_empty());
    }

    #[test]
    fn test_single_disallow_null_keeps_exactly_one_active() {
        let mut set = ActiveSet::single().disallow_null().with_items(vec![
            (Animal("one"), true),
            (Animal("two"), false),
            (Animal("three"), false),
        ]);

        assert_eq!(
            set.change_active(&"one").unwrap(),
            SelectionChange::Unchanged
        );
        assert_eq!(set.active_one(), Some(&Animal("one")));

        let sequence = ["two", "two", "three", "one", "one", "three", "two"];
        for key in sequence {
            set.change_active(&key).unwrap();
            assert_eq!(set.active_count(), 1);
            assert_eq!(set.active_one(), Some(&Animal(key)));
        }
    }

    #[test]
    fn test_deactivate_clears_everything() {
        let mut set = ActiveSet::multi().with_items(animals());
        set.change_active(&"owl").unwrap();
        let revision = set.revision();

        set.deactivate();
        assert_eq!(set.active_count(), 0);
        assert!(set.revision() > revision);

        // Nothing active: no revision bump
        let revision = set.revision();
        set.deactivate();
        assert_eq!(set.revision(), revision);
    }

    #[test]
    fn test_unknown_key_is_invariant_violation() {
        let mut set = ActiveSet::single().with_items(animals());
        let err = set.change_active(&"unicorn").unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(set.active_one(), Some(&Animal("cat")));
    }

    #[test]
    fn test_select_never_toggles_off() {
        let mut set = ActiveSet::single().with_items(animals());
        assert_eq!(set.select(&"cat").unwrap(), SelectionChange::Unchanged);
        assert!(set.is_active(&"cat"));

        assert_eq!(set.select(&"owl").unwrap(), SelectionChange::Activated);
        assert_eq!(set.active_keys(), vec!["owl"]);
    }

    #[test]
    fn test_set_all_respects_single_select() {
        let mut single = ActiveSet::single().with_items(animals());
        assert!(single.set_all(true).is_err());
        single.set_all(false).unwrap();
        assert_eq!(single.active_count(), 0);

        let mut multi = ActiveSet::multi().with_items(animals());
        multi.set_all(true).unwrap();
        assert_eq!(multi.active_count(), 3);
    }

    #[test]
    fn test_replace_resets_selection_and_dedupes() {
        let mut set = ActiveSet::multi().with_items(animals());
        set.replace(vec![Animal("fox"), Animal("fox"), Animal("elk")]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.active_count(), 0);
    }

    #[test]
    fn test_push_single_select_moves_activation() {
        let mut set = ActiveSet::single().with_items(animals());
        set.push(Animal("fox"), true);
        assert_eq!(set.active_keys(), vec!["fox"]);
        assert_eq!(set.len(), 4);
    }
}
