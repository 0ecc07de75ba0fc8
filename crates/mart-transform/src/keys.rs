//! Surrogate key assignment.
//!
//! Keys are minted per entity type from a monotonic counter. Natural keys are
//! trimmed and case-folded first, so `C001` and ` c001` share one key.

use std::collections::BTreeMap;

use tracing::trace;

use mart_model::{EntityType, SurrogateKey, normalize_natural_key};

/// Append-only `(entity type, natural key) -> surrogate key` map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    entries: BTreeMap<(EntityType, String), SurrogateKey>,
}

impl KeyMap {
    pub fn get(&self, entity: EntityType, natural_key: &str) -> Option<SurrogateKey> {
        self.entries
            .get(&(entity, normalize_natural_key(natural_key)))
            .copied()
    }

    pub fn contains(&self, entity: EntityType, natural_key: &str) -> bool {
        self.get(entity, natural_key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys held for one entity type.
    pub fn count(&self, entity: EntityType) -> usize {
        self.entries.keys().filter(|(e, _)| *e == entity).count()
    }

    /// Entries ordered by entity type, then normalized natural key.
    pub fn iter(&self) -> impl Iterator<Item = (EntityType, &str, SurrogateKey)> {
        self.entries
            .iter()
            .map(|((entity, natural), key)| (*entity, natural.as_str(), *key))
    }
}

/// A key proposed by [`SurrogateKeyAssigner::reserve`], not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAssignment {
    pub entity: EntityType,
    /// Normalized natural key.
    pub natural_key: String,
    pub key: SurrogateKey,
    /// `false` when the key was already in the map.
    pub fresh: bool,
}

/// Owns a run's [`KeyMap`] and the per-type counters that feed it.
#[derive(Debug, Clone, Default)]
pub struct SurrogateKeyAssigner {
    map: KeyMap,
    next: BTreeMap<EntityType, u64>,
}

impl SurrogateKeyAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_key(&self, entity: EntityType) -> SurrogateKey {
        SurrogateKey(self.next.get(&entity).copied().unwrap_or(1))
    }

    /// Existing key, or the key the next commit would mint. Does not mutate.
    pub fn reserve(&self, entity: EntityType, natural_key: &str) -> KeyAssignment {
        let natural_key = normalize_natural_key(natural_key);
        match self.map.entries.get(&(entity, natural_key.clone())) {
            Some(&key) => KeyAssignment {
                entity,
                natural_key,
                key,
                fresh: false,
            },
            None => KeyAssignment {
                entity,
                key: self.next_key(entity),
                natural_key,
                fresh: true,
            },
        }
    }

    /// Record a reserved key. Committing twice is harmless.
    pub fn commit(&mut self, assignment: KeyAssignment) -> SurrogateKey {
        let KeyAssignment {
            entity,
            natural_key,
            key,
            ..
        } = assignment;
        if let Some(&existing) = self.map.entries.get(&(entity, natural_key.clone())) {
            return existing;
        }
        trace!(entity = %entity, natural_key = %natural_key, key = %key, "minted key");
        self.insert(entity, natural_key, key);
        key
    }

    /// Existing key, or a freshly minted one.
    pub fn assign(&mut self, entity: EntityType, natural_key: &str) -> SurrogateKey {
        let assignment = self.reserve(entity, natural_key);
        self.commit(assignment)
    }

    /// Adopt a key already held by the store; later mints continue above it.
    pub fn seed(&mut self, entity: EntityType, natural_key: &str, key: SurrogateKey) {
        self.insert(entity, normalize_natural_key(natural_key), key);
    }

    fn insert(&mut self, entity: EntityType, natural_key: String, key: SurrogateKey) {
        self.map.entries.entry((entity, natural_key)).or_insert(key);
        let next = self.next.entry(entity).or_insert(1);
        *next = (*next).max(key.get() + 1);
    }

    pub fn get(&self, entity: EntityType, natural_key: &str) -> Option<SurrogateKey> {
        self.map.get(entity, natural_key)
    }

    pub fn key_map(&self) -> &KeyMap {
        &self.map
    }

    pub fn into_key_map(self) -> KeyMap {
        self.map
    }
}
