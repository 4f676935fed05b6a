//! All-or-nothing updates to shared state.
//!
//! A [`Transaction`] holds the lock on a piece of state for its whole
//! lifetime and works on a staged copy. Only [`Transaction::commit`] writes
//! the copy back; dropping the transaction (on an error, or while unwinding
//! from a panic) discards every staged write. Committed state is therefore
//! never half-updated, which is also why a poisoned lock is safe to reuse.
//!
//! The guard returned by a commit keeps the lock, so work that must be
//! ordered with the change (emitting its event, say) can finish first.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;

/// Exclusive access to `T`, with writes staged until commit.
pub struct Transaction<'a, T: Clone> {
    guard: MutexGuard<'a, T>,
    staged: T,
}

impl<'a, T: Clone> Transaction<'a, T> {
    /// Lock the state and take a snapshot to stage writes against.
    pub fn begin(lock: &'a Mutex<T>) -> Self {
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let staged = guard.clone();
        Self { guard, staged }
    }

    /// The state as it was when the transaction began.
    pub fn committed(&self) -> &T {
        &self.guard
    }

    /// Publish the staged writes. The lock is released when the returned
    /// guard is dropped.
    pub fn commit(self) -> MutexGuard<'a, T> {
        let Self { mut guard, staged } = self;
        *guard = staged;
        guard
    }
}

impl<T: Clone> Deref for Transaction<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.staged
    }
}

impl<T: Clone> DerefMut for Transaction<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.staged
    }
}

/// Run `op` against a staged copy of the state, committing only if it succeeds.
pub fn atomically<T: Clone, R>(lock: &Mutex<T>, op: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
    let mut txn = Transaction::begin(lock);
    let output = op(&mut txn)?;
    txn.commit();
    Ok(output)
}

/// Read the committed state under the lock.
pub fn read<T, R>(lock: &Mutex<T>, op: impl FnOnce(&T) -> R) -> R {
    let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    op(&guard)
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::error::Error;

    #[test]
    fn commit_publishes_staged_writes() {
        let state = Mutex::new(vec![1, 2]);
        let mut txn = Transaction::begin(&state);
        txn.push(3);
        assert_eq!(txn.committed(), &vec![1, 2]);
        txn.commit();
        assert_eq!(read(&state, Clone::clone), vec![1, 2, 3]);
    }

    #[test]
    fn commit_keeps_the_lock_until_released() {
        let state = Mutex::new(vec![1]);
        let mut txn = Transaction::begin(&state);
        txn.push(2);
        let published = txn.commit();
        assert_eq!(*published, vec![1, 2]);
        assert!(state.try_lock().is_err());

        drop(published);
        assert_eq!(read(&state, Clone::clone), vec![1, 2]);
    }

    #[test]
    fn drop_discards_staged_writes() {
        let state = Mutex::new(vec![1, 2]);
        {
            let mut txn = Transaction::begin(&state);
            txn.clear();
        }
        assert_eq!(read(&state, Vec::len), 2);
    }

    #[test]
    fn failed_operation_changes_nothing() {
        let state = Mutex::new(vec![1]);
        let result: Result<()> = atomically(&state, |v| {
            v.push(2);
            Err(Error::Validation("second write rejected".into()))
        });
        assert!(result.is_err());
        assert_eq!(read(&state, Clone::clone), vec![1]);

        let len = atomically(&state, |v| {
            v.push(2);
            Ok(v.len())
        })
        .unwrap();
        assert_eq!(len, 2);
        assert_eq!(read(&state, Clone::clone), vec![1, 2]);
    }

    #[test]
    fn panic_mid_transaction_leaves_state_usable() {
        let state = Mutex::new(vec![1]);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut txn = Transaction::begin(&state);
            txn.push(2);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(state.is_poisoned());
        assert_eq!(read(&state, Clone::clone), vec![1]);
    }
}
