use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::state::OpaqueStateValue;

#[derive(Debug, Default)]
struct SlotState {
    current: Option<OpaqueStateValue>,
    pending: Option<OpaqueStateValue>,
    is_pending: bool,
    pending_num_records: u64,
}

/// Checkpoint slot of one feed or stream.
///
/// `current` only ever receives a previous `pending` value; the record count accumulates
/// between swaps.
#[derive(Debug, Default)]
pub(crate) struct StateSlot {
    inner: Mutex<SlotState>,
}

impl StateSlot {
    pub(crate) fn new(initial: Option<OpaqueStateValue>) -> Self {
        Self {
            inner: Mutex::new(SlotState {
                current: initial.clone(),
                pending: initial,
                ..SlotState::default()
            }),
        }
    }

    pub(crate) fn current(&self) -> Option<OpaqueStateValue> {
        self.lock().current.clone()
    }

    pub(crate) fn set(&self, state: OpaqueStateValue, num_records: u64) {
        let mut inner = self.lock();
        inner.pending = Some(state);
        inner.is_pending = true;
        inner.pending_num_records = inner.pending_num_records.saturating_add(num_records);
    }

    /// Forgets everything; the cleared state itself is pending.
    pub(crate) fn reset(&self) {
        let mut inner = self.lock();
        inner.current = None;
        inner.pending = None;
        inner.is_pending = true;
        inner.pending_num_records = 0;
    }

    /// Moves `pending` into `current`.
    ///
    /// Returns the new current value and the record count it carries, or `None` when
    /// nothing was pending.
    pub(crate) fn swap(&self) -> Option<(Option<OpaqueStateValue>, u64)> {
        let mut inner = self.lock();
        if !inner.is_pending {
            return None;
        }
        inner.current = inner.pending.clone();
        inner.is_pending = false;
        let num_records = std::mem::take(&mut inner.pending_num_records);
        Some((inner.current.clone(), num_records))
    }

    /// Same as [`swap`](StateSlot::swap), falling back to the current value with no records.
    pub(crate) fn swap_or_current(&self) -> (bool, Option<OpaqueStateValue>, u64) {
        match self.swap() {
            Some((state, num_records)) => (true, state, num_records),
            None => (false, self.current(), 0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
