//! In-memory change tracking: the recordset, per-entity states, and the FIFO
//! queue of pending writes.
//!
//! The tracker owns all three structures behind methods; callers can read
//! records and states but never mutate the maps directly, so the state
//! machine's transition rules cannot be bypassed.

use std::collections::HashMap;
use std::collections::VecDeque;

use uuid::Uuid;

use crate::core::traits::Entity;
use crate::error::{RepoError, Result};
use crate::uow::state::RecordState;

/// Tracker behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackerOptions {
    /// When a never-committed entity (Added / AddedThenModified) is deleted,
    /// also enqueue a Deleted write. The row does not exist in the database,
    /// so the resulting DELETE is a no-op at best; off by default.
    pub queue_delete_for_uncommitted: bool,
}

/// One queued write. Insert and update changes carry the entity snapshot;
/// deletes only need the identity.
#[derive(Debug, Clone)]
pub struct PendingChange<E> {
    pub id: Uuid,
    pub entity: Option<E>,
    pub state: RecordState,
}

/// Change tracker for one entity collection.
#[derive(Debug)]
pub struct ChangeTracker<E: Entity> {
    recordset: Vec<E>,
    states: HashMap<Uuid, RecordState>,
    queue: VecDeque<PendingChange<E>>,
    options: TrackerOptions,
}

impl<E: Entity> Default for ChangeTracker<E> {
    fn default() -> Self {
        Self::new(TrackerOptions::default())
    }
}

impl<E: Entity> ChangeTracker<E> {
    pub fn new(options: TrackerOptions) -> Self {
        Self {
            recordset: Vec::new(),
            states: HashMap::new(),
            queue: VecDeque::new(),
            options,
        }
    }

    /// Replace the recordset with a fresh read: every entity Unchanged, the
    /// pending queue discarded.
    pub fn reset(&mut self, entities: Vec<E>) {
        self.states = entities
            .iter()
            .map(|e| (e.entity_id(), RecordState::Unchanged))
            .collect();
        self.recordset = entities;
        self.queue.clear();
    }

    /// The tracked state of an identity; `Unknown` when never seen.
    pub fn entity_state(&self, id: Uuid) -> RecordState {
        self.states.get(&id).copied().unwrap_or(RecordState::Unknown)
    }

    /// All tracked records, including those staged for deletion.
    pub fn records(&self) -> &[E] {
        &self.recordset
    }

    pub fn record(&self, id: Uuid) -> Option<&E> {
        self.recordset.iter().find(|e| e.entity_id() == id)
    }

    /// Tracked records matching a caller predicate, in recordset order.
    pub fn records_where<P>(&self, predicate: P) -> Vec<&E>
    where
        P: Fn(&E) -> bool,
    {
        self.recordset.iter().filter(|e| predicate(e)).collect()
    }

    /// The first tracked record matching a caller predicate.
    pub fn find_record<P>(&self, predicate: P) -> Option<&E>
    where
        P: Fn(&E) -> bool,
    {
        self.recordset.iter().find(|e| predicate(e))
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Hand the whole pending queue to the commit coordinator, in FIFO order.
    pub fn take_pending(&mut self) -> Vec<PendingChange<E>> {
        self.queue.drain(..).collect()
    }

    pub fn clear_pending(&mut self) {
        self.queue.clear();
    }

    /// Track a brand-new entity.
    ///
    /// Registering an identity that is already tracked as anything but
    /// Deleted fails with `EntityAlreadyExists`. Re-adding a Deleted entity
    /// undoes the deletion: the snapshot is replaced and the entity is
    /// queued as Added again.
    pub fn register_new(&mut self, entity: E) -> Result<()> {
        let id = entity.entity_id();
        match self.entity_state(id) {
            RecordState::Unchanged
            | RecordState::Added
            | RecordState::AddedThenModified
            | RecordState::Modified => return Err(RepoError::EntityAlreadyExists(id)),
            RecordState::Deleted => {
                if self.replace_snapshot(&entity) {
                    self.states.insert(id, RecordState::Added);
                    self.enqueue(id, Some(entity), RecordState::Added);
                    return Ok(());
                }
                // Deleted state without a snapshot is stale; drop it and
                // treat the entity as unknown.
                self.states.remove(&id);
            }
            RecordState::Unknown => {}
        }

        self.states.insert(id, RecordState::Added);
        self.recordset.push(entity.clone());
        self.enqueue(id, Some(entity), RecordState::Added);
        Ok(())
    }

    /// Track a modification of an already-known entity.
    pub fn register_modified(&mut self, entity: E) -> Result<()> {
        let id = entity.entity_id();
        match self.entity_state(id) {
            RecordState::Unchanged | RecordState::Modified => {
                self.states.insert(id, RecordState::Modified);
            }
            RecordState::Added | RecordState::AddedThenModified => {
                self.states.insert(id, RecordState::AddedThenModified);
            }
            RecordState::Deleted => return Err(RepoError::EntityAlreadyDeleted(id)),
            RecordState::Unknown => return Err(RepoError::EntityNotFound(id)),
        }

        self.replace_snapshot(&entity);
        self.enqueue(id, Some(entity), RecordState::Modified);
        Ok(())
    }

    /// Upsert-style registration: add when unknown, modify when tracked.
    pub fn register_new_or_modified(&mut self, entity: E) -> Result<()> {
        let id = entity.entity_id();
        let is_new = match self.entity_state(id) {
            RecordState::Unchanged | RecordState::Modified => {
                self.states.insert(id, RecordState::Modified);
                false
            }
            RecordState::Added | RecordState::AddedThenModified => {
                self.states.insert(id, RecordState::AddedThenModified);
                false
            }
            RecordState::Deleted => {
                if self.replace_snapshot(&entity) {
                    self.states.insert(id, RecordState::Added);
                    self.enqueue(id, Some(entity), RecordState::Added);
                    return Ok(());
                }
                self.states.remove(&id);
                true
            }
            RecordState::Unknown => true,
        };

        if is_new {
            self.states.insert(id, RecordState::Added);
            self.recordset.push(entity.clone());
            self.enqueue(id, Some(entity), RecordState::Added);
        } else {
            self.replace_snapshot(&entity);
            self.enqueue(id, Some(entity), RecordState::Modified);
        }
        Ok(())
    }

    /// Stage a deletion.
    ///
    /// A committed entity stays in the recordset until the deletion commits;
    /// only its state changes. An entity that was never committed is removed
    /// outright, and a Deleted write is queued only when
    /// [`TrackerOptions::queue_delete_for_uncommitted`] is set.
    pub fn register_deleted(&mut self, id: Uuid) -> Result<()> {
        match self.entity_state(id) {
            RecordState::Unchanged | RecordState::Modified => {
                self.states.insert(id, RecordState::Deleted);
                let entity = self.record(id).cloned();
                self.enqueue(id, entity, RecordState::Deleted);
            }
            RecordState::Added | RecordState::AddedThenModified => {
                self.states.remove(&id);
                let position = self.recordset.iter().position(|e| e.entity_id() == id);
                let entity = position.map(|i| self.recordset.remove(i));
                if self.options.queue_delete_for_uncommitted {
                    self.enqueue(id, entity, RecordState::Deleted);
                }
            }
            RecordState::Deleted => return Err(RepoError::EntityAlreadyDeleted(id)),
            RecordState::Unknown => return Err(RepoError::EntityNotFound(id)),
        }
        Ok(())
    }

    /// Replace the stored snapshot of an entity; true when one existed.
    fn replace_snapshot(&mut self, entity: &E) -> bool {
        let id = entity.entity_id();
        match self.recordset.iter_mut().find(|e| e.entity_id() == id) {
            Some(slot) => {
                *slot = entity.clone();
                true
            }
            None => false,
        }
    }

    fn enqueue(&mut self, id: Uuid, entity: Option<E>, state: RecordState) {
        self.queue.push_back(PendingChange { id, entity, state });
    }
}
