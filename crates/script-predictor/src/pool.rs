//! Bounded pool of execution contexts

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::context::ExecutionContext;
use crate::error::PredictorError;

struct PoolInner {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<ExecutionContext>>,
    created: AtomicUsize,
}

impl PoolInner {
    fn create(&self) -> ExecutionContext {
        let id = self.created.fetch_add(1, Ordering::Relaxed);
        ExecutionContext::new(id)
    }
}

/// A bounded pool of reusable [`ExecutionContext`]s
///
/// At most `capacity` contexts are checked out at once. Callers beyond that
/// wait in FIFO order for a context to come back rather than failing.
/// Contexts are created lazily and live until the pool is dropped.
#[derive(Clone)]
pub struct ContextPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool")
            .field("capacity", &self.inner.capacity)
            .field("size", &self.size())
            .field("idle", &self.idle())
            .finish()
    }
}

impl ContextPool {
    /// Create a pool holding up to `capacity` contexts.
    ///
    /// With `warm_up` set, one context is created immediately and an empty
    /// script is run through it.
    pub fn new(capacity: usize, warm_up: bool) -> Result<Self, PredictorError> {
        if capacity == 0 {
            return Err(PredictorError::InvalidConfig(
                "pool capacity must be at least 1".to_string(),
            ));
        }

        let inner = Arc::new(PoolInner {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(Vec::with_capacity(capacity)),
            created: AtomicUsize::new(0),
        });

        if warm_up {
            let mut context = inner.create();
            context.warm_up().map_err(|e| PredictorError::Script {
                kind: "WarmUpError".to_string(),
                message: e.to_string(),
            })?;
            inner.idle.lock().push(context);
            tracing::debug!(capacity, "warmed up context pool");
        }

        Ok(Self { inner })
    }

    /// Check out a context, waiting for one to be released if all
    /// `capacity` contexts are in use.
    pub async fn acquire(&self) -> Result<PooledContext, PredictorError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PredictorError::PoolClosed)?;

        let idle = self.inner.idle.lock().pop();
        let context = idle.unwrap_or_else(|| self.inner.create());

        Ok(PooledContext {
            context: Some(context),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Return a context to the pool. Dropping the guard does the same.
    pub fn release(&self, context: PooledContext) {
        drop(context);
    }

    /// Stop handing out contexts. Pending and future `acquire` calls fail
    /// with [`PredictorError::PoolClosed`].
    pub fn close(&self) {
        self.inner.semaphore.close();
        self.inner.idle.lock().clear();
    }

    /// Maximum number of contexts.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of contexts created so far.
    pub fn size(&self) -> usize {
        self.inner.created.load(Ordering::Relaxed)
    }

    /// Number of contexts currently parked in the pool.
    pub fn idle(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Number of contexts that could be checked out right now.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }
}

/// A context checked out of a [`ContextPool`]
///
/// Exclusive to its holder; goes back to the pool on drop.
pub struct PooledContext {
    // Always `Some` until drop.
    context: Option<ExecutionContext>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl fmt::Debug for PooledContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledContext")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::expect_used)]
impl Deref for PooledContext {
    type Target = ExecutionContext;

    fn deref(&self) -> &Self::Target {
        self.context.as_ref().expect("pooled context used after release")
    }
}

#[allow(clippy::expect_used)]
impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context.as_mut().expect("pooled context used after release")
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        // Park the context before the permit is released so the next
        // waiter finds it instead of creating a new one.
        if let Some(context) = self.context.take()
            && !self.pool.semaphore.is_closed()
        {
            self.pool.idle.lock().push(context);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ContextPool::new(0, false).unwrap_err();
        assert!(matches!(err, PredictorError::InvalidConfig(_)));
    }

    #[test]
    fn test_warm_up_creates_one_context() {
        let pool = ContextPool::new(10, true).unwrap();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.idle(), 1);

        let cold = ContextPool::new(10, false).unwrap();
        assert_eq!(cold.size(), 0);
        assert_eq!(cold.idle(), 0);
    }

    #[tokio::test]
    async fn test_contexts_are_reused() {
        let pool = ContextPool::new(3, true).unwrap();

        let first = pool.acquire().await.unwrap();
        let id = first.id();
        pool.release(first);

        let second = pool.acquire().await.unwrap();
        assert_eq!(second.id(), id);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_contexts_created_lazily_up_to_capacity() {
        let pool = ContextPool::new(3, false).unwrap();

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();

        assert_eq!(pool.size(), 3);
        assert_eq!(pool.available(), 0);

        let mut ids = vec![a.id(), b.id(), c.id()];
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3, "each holder gets its own context");

        drop((a, b, c));
        assert_eq!(pool.idle(), 3);
        assert_eq!(pool.available(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_pool_blocks_until_release() {
        let pool = ContextPool::new(1, true).unwrap();
        let held = pool.acquire().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err(), "acquire should wait while the pool is exhausted");

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|c| c.id()) })
        };
        tokio::task::yield_now().await;
        let held_id = held.id();
        drop(held);

        let id = waiter.await.unwrap().unwrap();
        assert_eq!(id, held_id);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_acquire() {
        let pool = ContextPool::new(2, true).unwrap();
        pool.close();

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PredictorError::PoolClosed));
        assert_eq!(pool.idle(), 0);
    }
}
