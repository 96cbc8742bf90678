//! Concurrent store of live Thunderbits with category, owner and role indices
//!
//! Every write for an id runs while holding that id's slot in the primary
//! table, so writes to one id serialize and writes to different ids only meet
//! on shard locks. Index writes happen inside that window: added before the
//! primary insert, removed before the primary removal. Readers copy an index
//! bucket and confirm each id against the primary table, so they never hand
//! out an id the primary table does not hold.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use thunderbit_core::{BitId, CategoryId, Error, Result, Role, Thunderbit};
use tracing::debug;

/// Bucket counts per index, for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub categories: usize,
    pub owners: usize,
    pub roles: usize,
}

pub struct RuntimeRegistry {
    bits: DashMap<BitId, Arc<Thunderbit>>,
    by_category: DashMap<CategoryId, Vec<BitId>>,
    by_owner: DashMap<String, Vec<BitId>>,
    by_role: DashMap<Role, Vec<BitId>>,
}

impl Default for RuntimeRegistry {
    fn default() -> Self { Self::new() }
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self {
            bits: DashMap::new(),
            by_category: DashMap::new(),
            by_owner: DashMap::new(),
            by_role: DashMap::new(),
        }
    }

    pub fn register(&self, bit: Thunderbit) -> Result<Arc<Thunderbit>> {
        let id = bit.id();
        match self.bits.entry(id) {
            Entry::Occupied(_) => Err(Error::AlreadyRegistered(id)),
            Entry::Vacant(slot) => {
                index_insert(&self.by_category, bit.category(), id);
                index_insert(&self.by_role, bit.role(), id);
                if let Some(owner) = &bit.owner {
                    index_insert(&self.by_owner, owner.clone(), id);
                }
                let bit = Arc::new(bit);
                slot.insert(bit.clone());
                debug!(bit = %id, category = %bit.category(), "registered");
                Ok(bit)
            }
        }
    }

    /// Remove `id` and every index entry for it. Unknown ids are a no-op.
    pub fn unregister(&self, id: BitId) -> Option<Arc<Thunderbit>> {
        match self.bits.entry(id) {
            Entry::Vacant(_) => None,
            Entry::Occupied(slot) => {
                let bit = slot.get().clone();
                self.drop_from_indices(&bit);
                slot.remove();
                debug!(bit = %id, "unregistered");
                Some(bit)
            }
        }
    }

    pub fn lookup(&self, id: BitId) -> Result<Arc<Thunderbit>> {
        self.bits
            .get(&id)
            .map(|b| b.clone())
            .ok_or_else(|| Error::bit_not_found(id))
    }

    pub fn contains(&self, id: BitId) -> bool {
        self.bits.contains_key(&id)
    }

    pub fn by_category(&self, category: CategoryId) -> Vec<Arc<Thunderbit>> {
        self.resolve(&self.by_category, &category, |b| b.category() == category)
    }

    pub fn by_owner(&self, owner: &str) -> Vec<Arc<Thunderbit>> {
        self.resolve(&self.by_owner, owner, |b| b.owner.as_deref() == Some(owner))
    }

    pub fn by_role(&self, role: Role) -> Vec<Arc<Thunderbit>> {
        self.resolve(&self.by_role, &role, |b| b.role() == role)
    }

    /// Replace the bit with `f(bit)`. Identity fields are restored from the
    /// stored bit and the owner index follows an owner change.
    ///
    /// `f` runs while the id's slot is held and must not call back into the
    /// registry.
    pub fn update<F>(&self, id: BitId, f: F) -> Result<Arc<Thunderbit>>
    where
        F: FnOnce(&Thunderbit) -> Thunderbit,
    {
        let mut slot = match self.bits.entry(id) {
            Entry::Occupied(slot) => slot,
            Entry::Vacant(_) => return Err(Error::bit_not_found(id)),
        };
        let current = slot.get().clone();
        let next = f(&*current).with_identity_of(&current);
        next.validate()?;

        if next.owner != current.owner {
            if let Some(old) = &current.owner {
                index_remove(&self.by_owner, old, id);
            }
            if let Some(new) = &next.owner {
                index_insert(&self.by_owner, new.clone(), id);
            }
            debug!(bit = %id, from = ?current.owner, to = ?next.owner, "owner changed");
        }
        let next = Arc::new(next);
        slot.insert(next.clone());
        Ok(next)
    }

    pub fn count(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn ids(&self) -> Vec<BitId> {
        self.bits.iter().map(|e| *e.key()).collect()
    }

    /// Unregister everything currently present.
    pub fn clear(&self) {
        for id in self.ids() {
            self.unregister(id);
        }
    }

    pub fn index_stats(&self) -> IndexStats {
        IndexStats {
            categories: self.by_category.len(),
            owners: self.by_owner.len(),
            roles: self.by_role.len(),
        }
    }

    fn drop_from_indices(&self, bit: &Thunderbit) {
        let id = bit.id();
        index_remove(&self.by_category, &bit.category(), id);
        index_remove(&self.by_role, &bit.role(), id);
        if let Some(owner) = &bit.owner {
            index_remove(&self.by_owner, owner, id);
        }
    }

    fn resolve<K, Q>(
        &self,
        index: &DashMap<K, Vec<BitId>>,
        key: &Q,
        keep: impl Fn(&Thunderbit) -> bool,
    ) -> Vec<Arc<Thunderbit>>
    where
        K: Eq + Hash + std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        // Copy the bucket so no index lock is held while reading the primary table.
        let ids = match index.get(key) {
            Some(bucket) => bucket.clone(),
            None => return Vec::new(),
        };
        ids.into_iter()
            .filter_map(|id| self.bits.get(&id).map(|b| b.clone()))
            .filter(|b| keep(b.as_ref()))
            .collect()
    }
}

fn index_insert<K: Eq + Hash>(index: &DashMap<K, Vec<BitId>>, key: K, id: BitId) {
    let mut bucket = index.entry(key).or_default();
    if !bucket.contains(&id) {
        bucket.push(id);
    }
}

fn index_remove<K: Eq + Hash + Clone>(index: &DashMap<K, Vec<BitId>>, key: &K, id: BitId) {
    if let Entry::Occupied(mut bucket) = index.entry(key.clone()) {
        bucket.get_mut().retain(|b| *b != id);
        if bucket.get().is_empty() {
            bucket.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thunderbit_core::Taxonomy;

    fn bit(cat: CategoryId, owner: Option<&str>) -> Thunderbit {
        let mut b = Thunderbit::new(&Taxonomy::builtin().get(cat).unwrap());
        b.owner = owner.map(str::to_string);
        b
    }

    #[test]
    fn register_twice_is_rejected() {
        let reg = RuntimeRegistry::new();
        let b = bit(CategoryId::Sensory, None);
        reg.register(b.clone()).unwrap();
        assert!(matches!(reg.register(b), Err(Error::AlreadyRegistered(_))));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn index_insert_deduplicates() {
        let index: DashMap<Role, Vec<BitId>> = DashMap::new();
        let id = BitId::new();
        index_insert(&index, Role::Critic, id);
        index_insert(&index, Role::Critic, id);
        assert_eq!(index.get(&Role::Critic).unwrap().len(), 1);
        index_remove(&index, &Role::Critic, id);
        assert!(index.is_empty());
    }

    #[test]
    fn unowned_bits_are_not_owner_indexed() {
        let reg = RuntimeRegistry::new();
        reg.register(bit(CategoryId::Motor, None)).unwrap();
        assert_eq!(reg.index_stats().owners, 0);
        assert_eq!(reg.index_stats().roles, 1);
    }
}
