//! Locking without lock poisoning.
//!
//! Callbacks run on their own threads and are allowed to panic. A panic must never turn every later
//! `then`/`resolve` on the same promise into a knock-on panic, so all of the crate's locks are
//! acquired through [`lock`], which ignores the poison flag. None of the critical sections can
//! leave the guarded data in an inconsistent state.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
