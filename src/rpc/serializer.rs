//! Exclusive access to the single backend connection.
//!
//! [`AccessSerializer`] wraps the state it protects, so the only way to touch
//! the connection is through an [`AccessGuard`]. A guard is held for the
//! whole ensure → write → read sequence of one call; there is no pipelining.
//!
//! Guards are owned (`'static`), which lets a call hand its guard to a
//! spawned task and keep the connection locked even if the caller goes away.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Binary mutual exclusion around `T`.
///
/// Waiters are served in FIFO order (tokio's mutex is fair), which is the only
/// ordering guarantee given.
pub struct AccessSerializer<T> {
    inner: Arc<Mutex<T>>,
}

/// Proof that the holder is the only call using the protected state.
/// Dropping it releases the serializer.
pub struct AccessGuard<T> {
    guard: OwnedMutexGuard<T>,
}

impl<T> AccessSerializer<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Wait until every earlier call has released, then take the slot.
    ///
    /// Dropping the returned future while it waits leaves no trace.
    pub async fn acquire(&self) -> AccessGuard<T> {
        AccessGuard {
            guard: Arc::clone(&self.inner).lock_owned().await,
        }
    }

    /// Take the slot only if nobody holds it.
    #[cfg(test)]
    fn try_acquire(&self) -> Option<AccessGuard<T>> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| AccessGuard { guard })
    }
}

impl<T> Clone for AccessSerializer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Deref for AccessGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for AccessGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
