//! Output collections, per-slice containers and the shared decode cache.
//!
//! A collection owns every record it holds and is keyed by the chamber hash.
//! Containers are per time slice. In trigger use many per-event requests hit
//! the same chambers; the shared cache arbitrates so the first caller builds
//! a collection and every later caller adopts it instead of re-decoding.

use std::sync::{Arc, RwLock};

use fxhash::FxHashMap;

use super::identifiers::{ElementHash, ElementId};
use super::records::{CoinRecord, HitRecord};

/// Ordered records of one chamber in one time slice.
#[derive(Debug, Clone)]
pub struct HitCollection {
    pub element: ElementId,
    pub hash: ElementHash,
    hits: Vec<HitRecord>,
}

impl HitCollection {
    pub fn new(element: ElementId, hash: ElementHash) -> Self {
        HitCollection {
            element,
            hash,
            hits: Vec::new(),
        }
    }

    pub fn push(&mut self, hit: HitRecord) {
        self.hits.push(hit);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HitRecord> {
        self.hits.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut HitRecord> {
        self.hits.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn contains_duplicate_of(&self, hit: &HitRecord) -> bool {
        self.hits.iter().any(|h| h.is_duplicate_of(hit))
    }
}

/// Ordered coincidence records of one chamber in one time slice.
#[derive(Debug, Clone)]
pub struct CoinCollection {
    pub element: ElementId,
    pub hash: ElementHash,
    coins: Vec<CoinRecord>,
}

impl CoinCollection {
    pub fn new(element: ElementId, hash: ElementHash) -> Self {
        CoinCollection {
            element,
            hash,
            coins: Vec::new(),
        }
    }

    pub fn push(&mut self, coin: CoinRecord) {
        self.coins.push(coin);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoinRecord> {
        self.coins.iter()
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn contains_duplicate_of(&self, coin: &CoinRecord) -> bool {
        self.coins.iter().any(|c| c.is_duplicate_of(coin))
    }
}

/// Mapping from chamber hash to committed collection, one per time slice.
/// Collections are reference counted so a container can share entries with
/// the decode cache without copying records.
#[derive(Debug, Clone, Default)]
pub struct HitContainer {
    map: FxHashMap<ElementHash, Arc<HitCollection>>,
}

impl HitContainer {
    pub fn get(&self, hash: ElementHash) -> Option<&Arc<HitCollection>> {
        self.map.get(&hash)
    }

    pub fn contains(&self, hash: ElementHash) -> bool {
        self.map.contains_key(&hash)
    }

    /// Commit a collection; fails when the identity is already taken.
    pub fn insert(&mut self, collection: Arc<HitCollection>) -> bool {
        let hash = collection.hash;
        if self.map.contains_key(&hash) {
            return false;
        }
        self.map.insert(hash, collection);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementHash, &Arc<HitCollection>)> {
        self.map.iter()
    }

    pub fn hashes(&self) -> impl Iterator<Item = ElementHash> + '_ {
        self.map.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoinContainer {
    map: FxHashMap<ElementHash, Arc<CoinCollection>>,
}

impl CoinContainer {
    pub fn get(&self, hash: ElementHash) -> Option<&Arc<CoinCollection>> {
        self.map.get(&hash)
    }

    pub fn contains(&self, hash: ElementHash) -> bool {
        self.map.contains_key(&hash)
    }

    pub fn insert(&mut self, collection: Arc<CoinCollection>) -> bool {
        let hash = collection.hash;
        if self.map.contains_key(&hash) {
            return false;
        }
        self.map.insert(hash, collection);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementHash, &Arc<CoinCollection>)> {
        self.map.iter()
    }

    pub fn hashes(&self) -> impl Iterator<Item = ElementHash> + '_ {
        self.map.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Shared, per-event decode cache used in trigger (seeded) mode.
///
/// Keys are (slice, chamber hash). The first decode call to finish a
/// collection publishes it; later calls detect it is present before doing
/// any geometry work and adopt the published one. Interior locking keeps
/// the publish step exclusive per key; lookups are concurrent reads.
#[derive(Debug, Default)]
pub struct SharedDecodeCache {
    hits: RwLock<FxHashMap<(usize, ElementHash), Arc<HitCollection>>>,
    coins: RwLock<FxHashMap<(usize, ElementHash), Arc<CoinCollection>>>,
}

impl SharedDecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit_present(&self, slice: usize, hash: ElementHash) -> bool {
        self.hits.read().unwrap().contains_key(&(slice, hash))
    }

    pub fn coin_present(&self, slice: usize, hash: ElementHash) -> bool {
        self.coins.read().unwrap().contains_key(&(slice, hash))
    }

    pub fn adopt_hits(&self, slice: usize, hash: ElementHash) -> Option<Arc<HitCollection>> {
        self.hits.read().unwrap().get(&(slice, hash)).cloned()
    }

    pub fn adopt_coins(&self, slice: usize, hash: ElementHash) -> Option<Arc<CoinCollection>> {
        self.coins.read().unwrap().get(&(slice, hash)).cloned()
    }

    /// Publish a finished collection. Returns false when another caller won
    /// the race for this key; the caller must treat that as a commit
    /// failure.
    pub fn publish_hits(&self, slice: usize, collection: &Arc<HitCollection>) -> bool {
        let mut map = self.hits.write().unwrap();
        match map.entry((slice, collection.hash)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(collection.clone());
                true
            }
        }
    }

    pub fn publish_coins(&self, slice: usize, collection: &Arc<CoinCollection>) -> bool {
        let mut map = self.coins.write().unwrap();
        match map.entry((slice, collection.hash)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(collection.clone());
                true
            }
        }
    }
}

/// Whether the decode call owns its output storage or shares the external
/// cache supplied by the trigger framework.
#[derive(Clone, Default)]
pub enum StorageMode {
    #[default]
    Owned,
    ExternallyCached(Arc<SharedDecodeCache>),
}

impl StorageMode {
    pub fn cache(&self) -> Option<&SharedDecodeCache> {
        match self {
            StorageMode::Owned => None,
            StorageMode::ExternallyCached(cache) => Some(cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::Station;

    fn element() -> ElementId {
        ElementId {
            station: Station::PivotDoublet,
            is_forward: false,
            eta: 1,
            phi: 1,
        }
    }

    #[test]
    fn test_container_rejects_double_commit() {
        let mut container = HitContainer::default();
        let collection = Arc::new(HitCollection::new(element(), ElementHash(3)));
        assert!(container.insert(collection.clone()));
        assert!(!container.insert(collection));
        assert!(container.contains(ElementHash(3)));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_cache_publish_is_construct_once() {
        let cache = SharedDecodeCache::new();
        let collection = Arc::new(HitCollection::new(element(), ElementHash(5)));
        assert!(!cache.hit_present(1, ElementHash(5)));
        assert!(cache.publish_hits(1, &collection));
        assert!(cache.hit_present(1, ElementHash(5)));
        // Same hash in another slice is a distinct key.
        assert!(!cache.hit_present(0, ElementHash(5)));
        // Second publisher loses the race.
        let rival = Arc::new(HitCollection::new(element(), ElementHash(5)));
        assert!(!cache.publish_hits(1, &rival));
        let adopted = cache.adopt_hits(1, ElementHash(5)).unwrap();
        assert!(Arc::ptr_eq(&adopted, &collection));
    }
}
