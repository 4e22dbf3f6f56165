//! Bookkeeping that ties external particle indices and particle identities to
//! solver-side entries.
//!
//! Entries live in a slot arena threaded as a doubly linked list (insertion
//! order). Two hash maps resolve an external index or a [`ParticleId`] to the
//! slot. Every live entry is reachable exactly once through each of the three.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use super::SpaceChargeError;
use crate::particle::ParticleId;

/// Handle to a live registry slot. Stays valid until the entry is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotKey(usize);

#[derive(Clone, Debug)]
pub struct RegistryEntry<T> {
    pub id: ParticleId,
    pub ext_index: usize,
    pub payload: T,
    prev: Option<SlotKey>,
    next: Option<SlotKey>,
}

#[derive(Clone, Debug)]
pub struct ParticleRegistry<T> {
    slots: Vec<Option<RegistryEntry<T>>>,
    free: Vec<usize>,
    head: Option<SlotKey>,
    tail: Option<SlotKey>,
    by_index: HashMap<usize, SlotKey>,
    by_particle: HashMap<ParticleId, SlotKey>,
}

impl<T> Default for ParticleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ParticleRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            by_index: HashMap::new(),
            by_particle: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Append a new entry. Nothing is modified when either key is taken.
    pub fn insert(&mut self, id: ParticleId, ext_index: usize, payload: T) -> Result<SlotKey, SpaceChargeError> {
        if self.by_index.contains_key(&ext_index) {
            return Err(SpaceChargeError::DuplicateIndex(ext_index));
        }
        if self.by_particle.contains_key(&id) {
            return Err(SpaceChargeError::DuplicateParticle(id));
        }

        let entry = RegistryEntry {
            id,
            ext_index,
            payload,
            prev: self.tail,
            next: None,
        };
        let key = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                SlotKey(slot)
            }
            None => {
                self.slots.push(Some(entry));
                SlotKey(self.slots.len() - 1)
            }
        };

        match self.tail {
            Some(tail) => self[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.by_index.insert(ext_index, key);
        self.by_particle.insert(id, key);
        Ok(key)
    }

    /// Remove the entry under `ext_index` from the list and both maps.
    pub fn remove(&mut self, ext_index: usize) -> Result<RegistryEntry<T>, SpaceChargeError> {
        let key = self
            .by_index
            .remove(&ext_index)
            .ok_or(SpaceChargeError::UnknownIndex(ext_index))?;
        let entry = self.slots[key.0]
            .take()
            .ok_or(SpaceChargeError::UnknownIndex(ext_index))?;
        self.by_particle.remove(&entry.id);

        match entry.prev {
            Some(prev) => self[prev].next = entry.next,
            None => self.head = entry.next,
        }
        match entry.next {
            Some(next) => self[next].prev = entry.prev,
            None => self.tail = entry.prev,
        }
        self.free.push(key.0);
        Ok(entry)
    }

    pub fn key_by_index(&self, ext_index: usize) -> Result<SlotKey, SpaceChargeError> {
        self.by_index
            .get(&ext_index)
            .copied()
            .ok_or(SpaceChargeError::UnknownIndex(ext_index))
    }

    pub fn key_by_particle(&self, id: ParticleId) -> Result<SlotKey, SpaceChargeError> {
        self.by_particle
            .get(&id)
            .copied()
            .ok_or(SpaceChargeError::UnknownParticle(id))
    }

    pub fn contains_index(&self, ext_index: usize) -> bool {
        self.by_index.contains_key(&ext_index)
    }

    pub fn get(&self, key: SlotKey) -> Option<&RegistryEntry<T>> {
        self.slots.get(key.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut RegistryEntry<T>> {
        self.slots.get_mut(key.0).and_then(Option::as_mut)
    }

    /// Live entries in insertion order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { registry: self, cursor: self.head }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.by_index.clear();
        self.by_particle.clear();
    }
}

impl<T> Index<SlotKey> for ParticleRegistry<T> {
    type Output = RegistryEntry<T>;

    fn index(&self, key: SlotKey) -> &Self::Output {
        match self.get(key) {
            Some(entry) => entry,
            None => panic!("registry slot {} is not live", key.0),
        }
    }
}

impl<T> IndexMut<SlotKey> for ParticleRegistry<T> {
    fn index_mut(&mut self, key: SlotKey) -> &mut Self::Output {
        match self.get_mut(key) {
            Some(entry) => entry,
            None => panic!("registry slot {} is not live", key.0),
        }
    }
}

pub struct Iter<'a, T> {
    registry: &'a ParticleRegistry<T>,
    cursor: Option<SlotKey>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (SlotKey, &'a RegistryEntry<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let entry = self.registry.get(key)?;
        self.cursor = entry.next;
        Some((key, entry))
    }
}
