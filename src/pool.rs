//! Bounded handle pool with scoped acquisition.

use crate::context::QueryContext;
use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Upper bound on a single condvar wait so cancellation is noticed while
/// waiting for a free handle.
const WAIT_SLICE: Duration = Duration::from_millis(20);

pub(crate) struct Pool<T> {
    idle: Mutex<Vec<T>>,
    available: Condvar,
}

impl<T> Pool<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self {
            idle: Mutex::new(items),
            available: Condvar::new(),
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Takes a handle, waiting while all are in use. The handle goes back to
    /// the pool when the guard drops.
    pub(crate) fn get(&self, ctx: &QueryContext) -> Result<Pooled<'_, T>> {
        let mut idle = self.idle.lock();
        loop {
            ctx.check()?;
            if let Some(item) = idle.pop() {
                return Ok(Pooled {
                    pool: self,
                    item: Some(item),
                });
            }
            let wait = ctx
                .remaining()
                .map_or(WAIT_SLICE, |remaining| remaining.min(WAIT_SLICE));
            self.available.wait_for(&mut idle, wait);
        }
    }

    /// Removes every handle. Requires exclusive access, so no guard is live.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        std::mem::take(self.idle.get_mut())
    }

    fn put(&self, item: T) {
        self.idle.lock().push(item);
        self.available.notify_one();
    }
}

pub(crate) struct Pooled<'a, T> {
    pool: &'a Pool<T>,
    item: Option<T>,
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled item present until drop")
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled item present until drop")
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}
