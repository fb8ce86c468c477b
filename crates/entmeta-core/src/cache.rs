//! Model cache with per-key slots and lazy forwarding proxies.
//!
//! A slot is reserved for a key before its model is built. Whoever reserves
//! it runs the build; everyone else (including recursive requests from the
//! build itself) receives an [`EntityModelRef`] that forwards to the slot's
//! outcome once it is published.
//!
//! Builds that hand each other proxies for unpublished slots form a build
//! group. A group publishes when its last build finishes, and a failed
//! member poisons every member that depends on it, directly or through the
//! cycle. A dependent is never published as a success next to a proxy that
//! later turns out dead.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, warn};

use crate::error::ModelError;
use crate::types::{EntityModel, ModelKey};

pub(crate) type BuildOutcome = Result<Arc<EntityModel>, ModelError>;

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

pub(crate) struct ModelSlot {
    key: ModelKey,
    outcome: OnceLock<BuildOutcome>,
    gate: Mutex<()>,
    published: Condvar,
}

impl ModelSlot {
    fn new(key: ModelKey) -> Self {
        Self {
            key,
            outcome: OnceLock::new(),
            gate: Mutex::new(()),
            published: Condvar::new(),
        }
    }

    pub(crate) fn key(&self) -> &ModelKey {
        &self.key
    }

    /// Publish the build outcome and wake every waiter. Only the first
    /// outcome is kept.
    fn publish(&self, outcome: BuildOutcome) {
        if self.outcome.set(outcome).is_err() {
            warn!(key = %self.key, "model slot published twice, keeping the first outcome");
        }
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.published.notify_all();
    }

    /// Outcome if already published. Never blocks.
    pub(crate) fn peek(&self) -> Option<&BuildOutcome> {
        self.outcome.get()
    }

    /// Outcome, blocking until the build publishes it.
    pub(crate) fn wait(&self) -> &BuildOutcome {
        if let Some(outcome) = self.outcome.get() {
            return outcome;
        }
        let mut guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = self.outcome.get() {
                return outcome;
            }
            guard = self
                .published
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Finishes the build with `BuildAborted` if it unwinds before finishing,
/// so waiters are never left parked on a slot nobody will fill.
pub(crate) struct PublishGuard<'a> {
    cache: &'a ModelCache,
    slot: &'a Arc<ModelSlot>,
    armed: bool,
}

impl<'a> PublishGuard<'a> {
    pub(crate) fn new(cache: &'a ModelCache, slot: &'a Arc<ModelSlot>) -> Self {
        Self {
            cache,
            slot,
            armed: true,
        }
    }

    pub(crate) fn finish(mut self, outcome: BuildOutcome) {
        self.armed = false;
        self.cache.finish(self.slot, outcome);
    }
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(key = %self.slot.key, "model build aborted");
            self.cache.finish(
                self.slot,
                Err(ModelError::BuildAborted {
                    key: self.slot.key.clone(),
                }),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Build groups
// ---------------------------------------------------------------------------

struct BuildGroup {
    /// Members whose build has not finished yet.
    building: usize,
    members: Vec<ModelKey>,
    /// `(dependent, dependency)` pairs, in the order builds asked for them.
    edges: Vec<(ModelKey, ModelKey)>,
    finished: Vec<(Arc<ModelSlot>, BuildOutcome)>,
}

#[derive(Default)]
struct BuildGroups {
    next_id: usize,
    group_of: HashMap<ModelKey, usize>,
    groups: HashMap<usize, BuildGroup>,
}

impl BuildGroups {
    fn open(&mut self, key: &ModelKey) {
        let id = self.next_id;
        self.next_id += 1;
        self.group_of.insert(key.clone(), id);
        self.groups.insert(
            id,
            BuildGroup {
                building: 1,
                members: vec![key.clone()],
                edges: Vec::new(),
                finished: Vec::new(),
            },
        );
    }

    fn merge(&mut self, into: usize, from: usize) {
        let Some(absorbed) = self.groups.remove(&from) else {
            return;
        };
        for key in &absorbed.members {
            self.group_of.insert(key.clone(), into);
        }
        if let Some(group) = self.groups.get_mut(&into) {
            group.building += absorbed.building;
            group.members.extend(absorbed.members);
            group.edges.extend(absorbed.edges);
            group.finished.extend(absorbed.finished);
        }
    }

    fn close(&mut self, id: usize) -> Option<BuildGroup> {
        let group = self.groups.remove(&id)?;
        for key in &group.members {
            self.group_of.remove(key);
        }
        Some(group)
    }
}

/// Failures of a completed group, spread from each failed member to the
/// members that depend on it until nothing changes.
fn group_failures(group: &BuildGroup) -> HashMap<ModelKey, ModelError> {
    let mut failures: HashMap<ModelKey, ModelError> = group
        .finished
        .iter()
        .filter_map(|(slot, outcome)| {
            outcome
                .as_ref()
                .err()
                .map(|err| (slot.key().clone(), err.clone()))
        })
        .collect();

    loop {
        let spread: Vec<(ModelKey, ModelError)> = group
            .edges
            .iter()
            .filter(|(dependent, _)| !failures.contains_key(dependent))
            .filter_map(|(dependent, dependency)| {
                failures
                    .get(dependency)
                    .map(|err| (dependent.clone(), err.clone()))
            })
            .collect();
        if spread.is_empty() {
            return failures;
        }
        for (dependent, err) in spread {
            failures.entry(dependent).or_insert(err);
        }
    }
}

// ---------------------------------------------------------------------------
// Lazy forwarding proxy
// ---------------------------------------------------------------------------

/// Handle to a cached model that may still be under construction.
///
/// The handle never builds anything. Reads forward to the published model,
/// waiting for an in-flight build to publish first.
#[derive(Clone)]
pub struct EntityModelRef {
    slot: Arc<ModelSlot>,
}

impl EntityModelRef {
    pub(crate) fn new(slot: Arc<ModelSlot>) -> Self {
        Self { slot }
    }

    pub fn key(&self) -> &ModelKey {
        self.slot.key()
    }

    pub fn reference(&self) -> &str {
        &self.slot.key().reference
    }

    pub fn entity_class(&self) -> &str {
        &self.slot.key().class
    }

    /// True once the model has been published successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self.slot.peek(), Some(Ok(_)))
    }

    /// Outcome if already published. Never blocks.
    pub(crate) fn outcome(&self) -> Option<&BuildOutcome> {
        self.slot.peek()
    }

    /// The published model, or `None` if its build failed.
    pub fn model(&self) -> Option<&EntityModel> {
        match self.slot.wait() {
            Ok(model) => Some(model.as_ref()),
            Err(err) => {
                warn!(key = %self.slot.key(), error = %err, "nested model build failed");
                None
            }
        }
    }

    pub fn resolve(&self) -> Result<Arc<EntityModel>, ModelError> {
        self.slot.wait().clone()
    }

    /// Both handles forward to the same cache slot.
    pub fn same_slot(&self, other: &EntityModelRef) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for EntityModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot.peek() {
            None => "building",
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
        };
        write!(f, "EntityModelRef({}, {state})", self.slot.key())
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub size: usize,
}

pub(crate) enum Reservation {
    /// Fresh slot: the caller must build and publish it.
    Claimed(Arc<ModelSlot>),
    /// Slot already reserved by an earlier request (possibly still building).
    Existing(Arc<ModelSlot>),
}

// Lock order: a `slots` shard, then `groups`. Nothing touches `slots` while
// holding `groups`.
#[derive(Default)]
pub(crate) struct ModelCache {
    slots: DashMap<ModelKey, Arc<ModelSlot>>,
    groups: Mutex<BuildGroups>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ModelCache {
    /// Return the slot for `key`, reserving it if absent. Exactly one caller
    /// ever receives `Claimed` for a key.
    pub(crate) fn reserve(&self, key: &ModelKey) -> Reservation {
        let existing = self.slots.get(key).map(|slot| Arc::clone(slot.value()));
        if let Some(slot) = existing {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(%key, "model cache hit");
            return Reservation::Existing(slot);
        }

        match self.slots.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "model cache hit (raced)");
                Reservation::Existing(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "model cache miss, slot reserved");
                let slot = Arc::new(ModelSlot::new(key.clone()));
                self.lock_groups().open(key);
                entry.insert(Arc::clone(&slot));
                Reservation::Claimed(slot)
            }
        }
    }

    fn lock_groups(&self) -> MutexGuard<'_, BuildGroups> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that the build of `dependent` holds a proxy for `dependency`.
    /// If the dependency is still unpublished the two builds share a group
    /// from now on. No-op for a published dependency.
    pub(crate) fn join(&self, dependent: &ModelKey, dependency: &ModelKey) {
        let mut groups = self.lock_groups();
        let (Some(into), Some(from)) = (
            groups.group_of.get(dependent).copied(),
            groups.group_of.get(dependency).copied(),
        ) else {
            return;
        };
        if into != from {
            debug!(%dependent, %dependency, "merging build groups");
            groups.merge(into, from);
        }
        if let Some(group) = groups.groups.get_mut(&into) {
            group.edges.push((dependent.clone(), dependency.clone()));
        }
    }

    /// Record the outcome of a claimed build. Publication waits until every
    /// build in the slot's group has finished.
    pub(crate) fn finish(&self, slot: &Arc<ModelSlot>, outcome: BuildOutcome) {
        let mut groups = self.lock_groups();
        let Some(id) = groups.group_of.get(slot.key()).copied() else {
            slot.publish(outcome);
            return;
        };
        let Some(group) = groups.groups.get_mut(&id) else {
            slot.publish(outcome);
            return;
        };

        group.building = group.building.saturating_sub(1);
        group.finished.push((Arc::clone(slot), outcome));
        if group.building > 0 {
            debug!(
                key = %slot.key(),
                pending = group.building,
                "model held back until its build group completes"
            );
            return;
        }

        let Some(group) = groups.close(id) else {
            return;
        };
        let failures = group_failures(&group);
        for (member, outcome) in group.finished {
            match (outcome, failures.get(member.key())) {
                (Ok(_), Some(err)) => {
                    warn!(key = %member.key(), error = %err, "model poisoned by a failed dependency");
                    member.publish(Err(err.clone()));
                }
                (outcome, _) => member.publish(outcome),
            }
        }
    }

    pub(crate) fn contains(&self, key: &ModelKey) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn keys(&self) -> Vec<ModelKey> {
        let mut keys: Vec<ModelKey> = self.slots.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    // Stats are best-effort; relaxed atomics are enough.
    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.slots.len(),
        }
    }
}
