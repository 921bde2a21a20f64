//! Per-session marshalling state
//!
//! A fresh [`State`] is created for every encode or decode call. It assigns wire
//! referent ids to pointer targets, remembers decoded referents so aliased
//! pointers resolve to the same value, and collects [`DataError`]s.

use crate::shape::Handle;
use crate::{DataError, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::warn;

/// Referent id of the first registered target; 0 encodes null
pub const FIRST_REFERENT_ID: u64 = 1;

#[derive(Debug)]
struct Referents {
    ids: HashMap<Handle, u64>,
    next_id: u64,
    decoded: HashMap<u64, Value>,
}

/// Session state of one encode or decode call
#[derive(Debug)]
pub struct State {
    referents: RwLock<Referents>,
    errors: Mutex<Vec<DataError>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub fn new() -> Self {
        Self {
            referents: RwLock::new(Referents {
                ids: HashMap::new(),
                next_id: FIRST_REFERENT_ID,
                decoded: HashMap::new(),
            }),
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Return the referent id of `handle`, assigning the next id on first
    /// sight. The flag is true only for the call that assigned the id.
    pub fn register(&self, handle: Handle) -> (u64, bool) {
        if let Some(&id) = self.referents.read().ids.get(&handle) {
            return (id, false);
        }
        let mut referents = self.referents.write();
        // Another thread may have registered it between the locks.
        if let Some(&id) = referents.ids.get(&handle) {
            return (id, false);
        }
        let id = referents.next_id;
        referents.next_id += 1;
        referents.ids.insert(handle, id);
        (id, true)
    }

    /// Referent id of an already registered handle
    pub fn lookup(&self, handle: Handle) -> Option<u64> {
        self.referents.read().ids.get(&handle).copied()
    }

    /// Handle that was assigned referent id `id`
    pub fn handle_for(&self, id: u64) -> Option<Handle> {
        self.referents
            .read()
            .ids
            .iter()
            .find_map(|(handle, &assigned)| (assigned == id).then_some(*handle))
    }

    /// Number of handles registered so far
    pub fn registered(&self) -> usize {
        self.referents.read().ids.len()
    }

    /// Value previously decoded for referent `id`
    pub fn referent(&self, id: u64) -> Option<Value> {
        self.referents.read().decoded.get(&id).cloned()
    }

    /// Remember the decoded target of referent `id`. The first value stored
    /// for an id wins.
    pub fn store_referent(&self, id: u64, value: Value) {
        self.referents.write().decoded.entry(id).or_insert(value);
    }

    pub fn add_error(&self, err: DataError) {
        warn!(code = err.code(), "{}", err);
        self.errors.lock().push(err);
    }

    /// Snapshot of the errors recorded so far
    pub fn errors(&self) -> Vec<DataError> {
        self.errors.lock().clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    /// Drain the recorded errors
    pub fn take_errors(&self) -> Vec<DataError> {
        std::mem::take(&mut *self.errors.lock())
    }
}
