pub mod canvas;
pub mod scene;
pub mod task;
pub mod tile;

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard from a poisoned lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
