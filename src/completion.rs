use std::cell::RefCell;

use bytes::Bytes;
use parking_lot::ReentrantMutex;

use crate::error::Result;

/// Callback receives the terminal outcome of a send: the raw reply of the
/// browser service, or the error that ended the attempt.
pub type Callback = Box<dyn FnOnce(Result<Bytes>) + Send + 'static>;

enum Slot {
    Empty,
    Armed(Callback),
    Fired,
    Disarmed,
}

/// Completion is a single-assignment cell around a [`Callback`].
///
/// A callback can be armed once and then either fired or disarmed once;
/// every later `fire` or `disarm` is rejected. The lock is held while the
/// callback runs, so a `disarm` racing a `fire` from another thread returns
/// only after the callback has finished. The lock is reentrant, which lets the
/// callback itself call back into code that disarms this cell.
pub(crate) struct Completion {
    slot: ReentrantMutex<RefCell<Slot>>,
}

impl Default for Completion {
    fn default() -> Self {
        Completion {
            slot: ReentrantMutex::new(RefCell::new(Slot::Empty)),
        }
    }
}

impl Completion {
    /// Stores the callback. Gives it back if the cell was already used.
    pub(crate) fn arm(&self, callback: Callback) -> std::result::Result<(), Callback> {
        let guard = self.slot.lock();
        let mut slot = guard.borrow_mut();
        if matches!(*slot, Slot::Empty) {
            *slot = Slot::Armed(callback);
            Ok(())
        } else {
            Err(callback)
        }
    }

    /// Invokes the armed callback with `result`. Returns false if there was
    /// nothing to fire, in which case `result` is dropped.
    pub(crate) fn fire(&self, result: Result<Bytes>) -> bool {
        let guard = self.slot.lock();
        let callback = match guard.replace(Slot::Fired) {
            Slot::Armed(callback) => callback,
            other => {
                guard.replace(other);
                return false;
            }
        };

        callback(result);
        true
    }

    /// Drops the armed callback without invoking it. An empty cell stays
    /// empty so that it can still be armed later.
    pub(crate) fn disarm(&self) -> bool {
        let guard = self.slot.lock();
        let previous = guard.replace(Slot::Disarmed);
        match previous {
            Slot::Armed(callback) => {
                drop(callback);
                true
            }
            other => {
                guard.replace(other);
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        matches!(*self.slot.lock().borrow(), Slot::Armed(_))
    }
}
