use std::sync::{Arc, Mutex, PoisonError};

enum Slot<T> {
    Waiting,
    Ready(T),
    Done,
}

/// One-shot exchange between a blocking worker and the async caller that
/// may stop waiting for it. Whichever side arrives last ends up owning the
/// value, so a resource produced after its caller gave up is never lost.
pub struct Handoff<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Handoff<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::Waiting),
        })
    }

    /// Worker side. Returns the value back when the caller has already
    /// abandoned the exchange; the worker must dispose of it.
    pub fn deliver(&self, value: T) -> Option<T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Slot::Waiting => {
                *slot = Slot::Ready(value);
                None
            }
            Slot::Ready(_) | Slot::Done => Some(value),
        }
    }

    /// Caller side. Takes the delivered value, if any.
    pub fn claim(&self) -> Option<T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, Slot::Done) {
            Slot::Ready(value) => Some(value),
            Slot::Waiting => {
                *slot = Slot::Waiting;
                None
            }
            Slot::Done => None,
        }
    }

    /// Caller side, on giving up. Closes the exchange and returns a value
    /// that was delivered but never claimed.
    pub fn abandon(&self) -> Option<T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, Slot::Done) {
            Slot::Ready(value) => Some(value),
            Slot::Waiting | Slot::Done => None,
        }
    }
}
