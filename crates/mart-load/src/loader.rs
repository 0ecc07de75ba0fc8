//! Dependency-ordered loading with quarantine on unresolved references.
//!
//! Customers and products load first, then orders, then order items. Each
//! batch is offered as drafts that still name their parents by natural key;
//! a draft whose parent has no surrogate key is quarantined without touching
//! the store. A surrogate key only enters the key map once its row is stored.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, info_span, warn};

use mart_model::{
    CanonicalEntity, CustomerDraft, EntityType, Issue, OrderDraft, OrderItemDraft, ProductDraft,
    RecordRef, RetryOptions, StageOutput, SurrogateKey, TerminalState,
};
use mart_transform::{KeyMap, SurrogateKeyAssigner};

use crate::error::{LoadError, Result};
use crate::storage::{InsertOutcome, Storage};

/// How often, and how patiently, transient insert failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one.
    pub attempts: u32,
    /// Attempt `n` is followed by a pause of `n * backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl From<&RetryOptions> for RetryPolicy {
    fn from(options: &RetryOptions) -> Self {
        Self {
            attempts: options.attempts.max(1),
            backoff: options.backoff(),
        }
    }
}

/// A parent an entity points at, by natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub entity: EntityType,
    pub natural_key: String,
    pub field: &'static str,
}

impl Reference {
    fn new(entity: EntityType, natural_key: &str, field: &'static str) -> Self {
        Self {
            entity,
            natural_key: natural_key.to_string(),
            field,
        }
    }
}

/// A draft the loader can key, resolve and store.
pub trait LoadCandidate {
    const ENTITY: EntityType;

    fn origin(&self) -> &RecordRef;

    fn natural_key(&self) -> &str;

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Build the entity; `None` when a parent key is missing from `keys`.
    fn build(self, key: SurrogateKey, keys: &KeyMap) -> Option<CanonicalEntity>;
}

impl LoadCandidate for CustomerDraft {
    const ENTITY: EntityType = EntityType::Customer;

    fn origin(&self) -> &RecordRef {
        &self.origin
    }

    fn natural_key(&self) -> &str {
        &self.customer_id
    }

    fn build(self, key: SurrogateKey, _keys: &KeyMap) -> Option<CanonicalEntity> {
        Some(CanonicalEntity::Customer(self.into_entity(key)))
    }
}

impl LoadCandidate for ProductDraft {
    const ENTITY: EntityType = EntityType::Product;

    fn origin(&self) -> &RecordRef {
        &self.origin
    }

    fn natural_key(&self) -> &str {
        &self.product_id
    }

    fn build(self, key: SurrogateKey, _keys: &KeyMap) -> Option<CanonicalEntity> {
        Some(CanonicalEntity::Product(self.into_entity(key)))
    }
}

impl LoadCandidate for OrderDraft {
    const ENTITY: EntityType = EntityType::Order;

    fn origin(&self) -> &RecordRef {
        &self.origin
    }

    fn natural_key(&self) -> &str {
        &self.transaction_id
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new(EntityType::Customer, &self.customer_id, "customer_id")]
    }

    fn build(self, key: SurrogateKey, keys: &KeyMap) -> Option<CanonicalEntity> {
        let customer_key = keys.get(EntityType::Customer, &self.customer_id)?;
        Some(CanonicalEntity::Order(self.into_entity(key, customer_key)))
    }
}

impl LoadCandidate for OrderItemDraft {
    const ENTITY: EntityType = EntityType::OrderItem;

    fn origin(&self) -> &RecordRef {
        &self.origin
    }

    fn natural_key(&self) -> &str {
        &self.line_id
    }

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference::new(EntityType::Order, &self.transaction_id, "transaction_id"),
            Reference::new(EntityType::Product, &self.product_id, "product_id"),
        ]
    }

    fn build(self, key: SurrogateKey, keys: &KeyMap) -> Option<CanonicalEntity> {
        let order_key = keys.get(EntityType::Order, &self.transaction_id)?;
        let product_key = keys.get(EntityType::Product, &self.product_id)?;
        Some(CanonicalEntity::OrderItem(
            self.into_entity(key, order_key, product_key),
        ))
    }
}

/// A record that reached the store, with the key it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub origin: RecordRef,
    pub key: SurrogateKey,
}

/// Writes drafts through a [`Storage`] and owns the run's key assignment.
pub struct ReferentialLoader<S> {
    store: S,
    keys: SurrogateKeyAssigner,
    retry: RetryPolicy,
}

impl<S: Storage> ReferentialLoader<S> {
    /// Create a loader; keys already held by `store` are adopted so a re-run
    /// updates rows instead of duplicating them.
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        let mut keys = SurrogateKeyAssigner::new();
        for entity in EntityType::LOAD_ORDER {
            let existing = store.existing_keys(entity);
            if !existing.is_empty() {
                debug!(entity = %entity, keys = existing.len(), "seeded keys from store");
            }
            for (natural_key, key) in existing {
                keys.seed(entity, &natural_key, key);
            }
        }
        Self { store, keys, retry }
    }

    pub fn keys(&self) -> &KeyMap {
        self.keys.key_map()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (S, KeyMap) {
        (self.store, self.keys.into_key_map())
    }

    /// Load one batch of a single entity type.
    ///
    /// Returns the loaded records; quarantined ones appear only as issues and
    /// terminal states. Fails only when retries are exhausted, leaving every
    /// earlier insert and key in place.
    pub fn load_batch<C: LoadCandidate>(&mut self, candidates: Vec<C>) -> Result<StageOutput<Loaded>> {
        let mut output = StageOutput::new();
        self.load_into(candidates, &mut output)?;
        Ok(output)
    }

    /// Like [`load_batch`](Self::load_batch), but records into `output` as it
    /// goes, so the records handled before a fatal error stay visible to the
    /// caller.
    pub fn load_into<C: LoadCandidate>(
        &mut self,
        candidates: Vec<C>,
        output: &mut StageOutput<Loaded>,
    ) -> Result<()> {
        let _span = info_span!("load", entity = %C::ENTITY, candidates = candidates.len()).entered();
        let loaded_before = output.count(TerminalState::Loaded);
        let quarantined_before = output.count(TerminalState::Quarantined);

        for candidate in candidates {
            let origin = candidate.origin().clone();
            let missing: Vec<Reference> = candidate
                .references()
                .into_iter()
                .filter(|reference| !self.keys.key_map().contains(reference.entity, &reference.natural_key))
                .collect();
            if let Some(reference) = missing.first() {
                let issue = Issue::quarantined(
                    origin.clone(),
                    Some(reference.field),
                    format!("missing parent {} '{}'", reference.entity, reference.natural_key),
                );
                debug!(record = %origin, parent = %reference.entity, "missing parent");
                output.quarantine(origin, issue);
                continue;
            }

            let natural_key = candidate.natural_key().to_string();
            let assignment = self.keys.reserve(C::ENTITY, &natural_key);
            let Some(entity) = candidate.build(assignment.key, self.keys.key_map()) else {
                let issue = Issue::quarantined(origin.clone(), None, "unresolved parent key");
                output.quarantine(origin, issue);
                continue;
            };

            match self.insert_with_retry(&entity, &natural_key)? {
                InsertOutcome::Inserted => {
                    let key = self.keys.commit(assignment);
                    output.terminated.push((origin.clone(), TerminalState::Loaded));
                    output.keep(Loaded { origin, key });
                }
                InsertOutcome::FkViolation(message) => {
                    let issue = Issue::quarantined(
                        origin.clone(),
                        None,
                        format!("rejected by store: {message}"),
                    );
                    output.quarantine(origin, issue);
                }
                // Exhaustion is reported by insert_with_retry.
                InsertOutcome::Transient(_) => {}
            }
        }

        info!(
            loaded = output.count(TerminalState::Loaded) - loaded_before,
            quarantined = output.count(TerminalState::Quarantined) - quarantined_before,
            "loaded batch"
        );
        Ok(())
    }

    fn insert_with_retry(&mut self, entity: &CanonicalEntity, natural_key: &str) -> Result<InsertOutcome> {
        let mut last_error = String::new();
        for attempt in 1..=self.retry.attempts {
            match self.store.insert_or_reject(entity) {
                InsertOutcome::Transient(message) => {
                    warn!(
                        entity = %entity.entity_type(),
                        natural_key,
                        attempt,
                        error = %message,
                        "transient insert failure"
                    );
                    last_error = message;
                    if attempt < self.retry.attempts {
                        thread::sleep(self.retry.backoff * attempt);
                    }
                }
                outcome => return Ok(outcome),
            }
        }
        Err(LoadError::RetriesExhausted {
            entity: entity.entity_type(),
            natural_key: natural_key.to_string(),
            attempts: self.retry.attempts,
            message: last_error,
        })
    }
}
