//! Per-auth-file quota state machine
//!
//! Every refresh takes a generation from one monotonic counter. A completion
//! only lands when the cell is still loading that same generation, so a slow
//! response can never overwrite a newer one.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum QuotaState<T> {
    Idle,
    Loading { generation: u64 },
    Success(T),
    Error(String),
}

impl<T> QuotaState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, QuotaState::Loading { .. })
    }
}

/// Quota cells keyed by auth file identity
#[derive(Debug)]
pub struct QuotaCells<T> {
    cells: HashMap<String, QuotaState<T>>,
    next_generation: u64,
}

impl<T> Default for QuotaCells<T> {
    fn default() -> Self {
        Self {
            cells: HashMap::new(),
            next_generation: 1,
        }
    }
}

impl<T> QuotaCells<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// Start a refresh; `None` when one is already in flight for this cell
    pub fn begin(&mut self, id: &str) -> Option<u64> {
        if self.cells.get(id).is_some_and(QuotaState::is_loading) {
            return None;
        }
        Some(self.begin_forced(id))
    }

    /// Start a refresh that supersedes any in-flight one
    pub fn begin_forced(&mut self, id: &str) -> u64 {
        let generation = self.next_generation();
        self.cells
            .insert(id.to_string(), QuotaState::Loading { generation });
        generation
    }

    /// Land a result; returns `false` when it was stale and got discarded
    pub fn complete(&mut self, id: &str, generation: u64, result: Result<T, String>) -> bool {
        let Some(cell) = self.cells.get_mut(id) else {
            return false;
        };
        if !matches!(*cell, QuotaState::Loading { generation: current } if current == generation) {
            return false;
        }
        *cell = match result {
            Ok(value) => QuotaState::Success(value),
            Err(message) => QuotaState::Error(message),
        };
        true
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&QuotaState<T>> {
        self.cells.get(id)
    }

    /// Back to `Idle`; an in-flight completion for it will be discarded
    pub fn reset(&mut self, id: &str) {
        self.cells.remove(id);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
