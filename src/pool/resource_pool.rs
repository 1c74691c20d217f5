// src/pool/resource_pool.rs

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::errors::PoolError;
use crate::pool::options::{PoolLimits, PoolOptions};
use crate::pool::queue::WaitQueue;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A resource that can live in a [`ResourcePool`].
pub trait Poolable: Send + 'static {
    /// Clear per-use state before the resource is handed to the next user.
    fn reset(&mut self);

    /// Release OS-level resources when the pool discards this value.
    fn dispose(&mut self) {}
}

type Factory<T> = Box<dyn Fn() -> anyhow::Result<T> + Send + Sync>;

/// Exclusive handle to one pooled resource.
///
/// Identity is the `(pool, slot)` pair, so releasing is checked by handle
/// and never by comparing resource values.
///
/// A lease dropped without [`ResourcePool::release`] gives its slot up: the
/// resource is disposed (it may be mid-use) and the oldest waiter, if any,
/// gets a freshly created one.
pub struct Lease<T: Poolable> {
    pool_id: u64,
    slot: u64,
    resource: T,
    home: Weak<Shared<T>>,
}

impl<T: Poolable> Lease<T> {
    pub fn slot(&self) -> u64 {
        self.slot
    }

    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }
}

impl<T: Poolable> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.resource
    }
}

impl<T: Poolable> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.resource
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("pool_id", &self.pool_id)
            .field("slot", &self.slot)
            .field("resource", &self.resource)
            .finish()
    }
}

impl<T: Poolable> Drop for Lease<T> {
    fn drop(&mut self) {
        // Idle leases and leases the pool already took back are not locked.
        let Some(shared) = self.home.upgrade() else {
            return;
        };
        if !shared.forfeit(self.slot) {
            return;
        }
        warn!(pool = self.pool_id, slot = self.slot, "lease dropped without release; disposing resource");
        self.resource.dispose();
        shared.refill_waiter();
    }
}

/// Point-in-time view of the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub available: usize,
    pub locked: usize,
    pub created: usize,
    pub queued: usize,
    pub queue_remaining: usize,
    pub can_grow: bool,
    pub max_size: usize,
}

struct PoolState<T: Poolable> {
    available: VecDeque<Lease<T>>,
    locked: HashSet<u64>,
    created: usize,
    next_slot: u64,
    queue: WaitQueue<Lease<T>>,
    closed: bool,
}

/// Everything a lease needs to find its way home.
struct Shared<T: Poolable> {
    id: u64,
    limits: PoolLimits,
    factory: Factory<T>,
    state: Mutex<PoolState<T>>,
}

impl<T: Poolable> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a resource and mark its slot locked. Caller holds the lock.
    fn create(self: &Arc<Self>, state: &mut PoolState<T>) -> Result<Lease<T>, PoolError> {
        let resource = (self.factory)().map_err(|e| PoolError::Creation(format!("{e:#}")))?;
        let slot = state.next_slot;
        state.next_slot += 1;
        state.created += 1;
        state.locked.insert(slot);
        debug!(pool = self.id, slot, created = state.created, "created pooled resource");
        Ok(Lease {
            pool_id: self.id,
            slot,
            resource,
            home: Arc::downgrade(self),
        })
    }

    fn check_invariants(&self, state: &PoolState<T>) {
        debug_assert_eq!(state.available.len() + state.locked.len(), state.created);
        debug_assert!(state.created <= self.limits.max_size);
    }

    /// Forget a locked slot whose lease is going away. `false` when the slot
    /// was not locked.
    fn forfeit(&self, slot: u64) -> bool {
        let mut state = self.lock();
        if !state.locked.remove(&slot) {
            return false;
        }
        state.created -= 1;
        self.check_invariants(&state);
        true
    }

    /// Use freed capacity to serve the oldest waiter with a new resource.
    fn refill_waiter(self: &Arc<Self>) {
        let mut state = self.lock();
        state.queue.prune_abandoned();
        if state.closed || state.queue.is_empty() || state.created >= self.limits.max_size {
            return;
        }
        let lease = match self.create(&mut state) {
            Ok(lease) => lease,
            Err(e) => {
                warn!(pool = self.id, error = %e, "could not replace forfeited resource");
                return;
            }
        };
        match state.queue.hand_off(lease) {
            Ok(ticket) => debug!(pool = self.id, ticket, "handed replacement resource to waiter"),
            Err(lease) => {
                state.locked.remove(&lease.slot);
                state.available.push_back(lease);
            }
        }
        self.check_invariants(&state);
    }
}

/// Bounded pool with a FIFO wait queue.
///
/// Semantics:
/// - `acquire` prefers an idle resource (oldest first), then creates a new
///   one while `created < max_size`, then waits in the queue while the queue
///   has room, and otherwise fails with [`PoolError::QueueOverflow`].
/// - `release` resets the resource and hands it straight to the oldest
///   waiter; in that case the slot stays locked and never passes through
///   the idle list.
/// - Dropping a queued `acquire` future cancels the request. If a resource
///   was already in flight to it, the resource is released again.
/// - `available + locked == created <= max_size` holds after every
///   operation.
pub struct ResourcePool<T: Poolable> {
    shared: Arc<Shared<T>>,
}

pub struct ResourcePoolBuilder<T> {
    limits: PoolLimits,
    factory: Option<Factory<T>>,
}

impl<T: Poolable> ResourcePoolBuilder<T> {
    /// Use explicit limits. Out-of-range values are corrected the same way
    /// [`PoolOptions::resolve`] corrects configuration.
    pub fn limits(mut self, limits: PoolLimits) -> Self {
        self.limits = limits.normalized();
        self
    }

    pub fn options(mut self, options: &PoolOptions) -> Self {
        self.limits = options.resolve();
        self
    }

    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Build the pool and create `preallocated_size` idle resources.
    pub fn build(self) -> Result<ResourcePool<T>, PoolError> {
        let factory = self.factory.ok_or(PoolError::MissingFactory)?;
        let shared = Arc::new(Shared {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            limits: self.limits,
            factory,
            state: Mutex::new(PoolState {
                available: VecDeque::new(),
                locked: HashSet::new(),
                created: 0,
                next_slot: 0,
                queue: WaitQueue::new(),
                closed: false,
            }),
        });

        {
            let mut state = shared.lock();
            for _ in 0..shared.limits.preallocated_size {
                let lease = shared.create(&mut state)?;
                state.locked.remove(&lease.slot);
                state.available.push_back(lease);
            }
        }

        info!(
            pool = shared.id,
            max_size = shared.limits.max_size,
            preallocated = shared.limits.preallocated_size,
            max_queue_size = shared.limits.max_queue_size,
            "resource pool ready"
        );
        Ok(ResourcePool { shared })
    }
}

impl<T: Poolable> ResourcePool<T> {
    pub fn builder() -> ResourcePoolBuilder<T> {
        ResourcePoolBuilder {
            limits: PoolLimits::default(),
            factory: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn limits(&self) -> PoolLimits {
        self.shared.limits
    }

    /// Obtain exclusive use of one resource.
    pub async fn acquire(&self) -> Result<Lease<T>, PoolError> {
        let shared = &self.shared;
        let rx = {
            let mut state = shared.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }

            if let Some(lease) = state.available.pop_front() {
                state.locked.insert(lease.slot);
                shared.check_invariants(&state);
                debug!(pool = shared.id, slot = lease.slot, "acquired idle resource");
                return Ok(lease);
            }

            if state.created < shared.limits.max_size {
                let lease = shared.create(&mut state)?;
                shared.check_invariants(&state);
                return Ok(lease);
            }

            state.queue.prune_abandoned();
            if state.queue.len() >= shared.limits.max_queue_size {
                let err = PoolError::QueueOverflow {
                    locked: state.locked.len(),
                    available: state.available.len(),
                    queued: state.queue.len(),
                    max_queue_size: shared.limits.max_queue_size,
                };
                warn!(pool = shared.id, error = %err, "rejecting acquire");
                return Err(err);
            }

            let (ticket, rx) = state.queue.push();
            debug!(pool = shared.id, ticket, queued = state.queue.len(), "acquire queued");
            rx
        };

        let mut pending = PendingAcquire {
            pool: self,
            rx: Some(rx),
        };
        pending.wait().await
    }

    /// Return a resource to the pool.
    ///
    /// Fails with [`PoolError::NotLocked`] when the lease does not belong to
    /// this pool. The lease is dropped in that case, which gives its slot
    /// back to the pool that issued it.
    pub fn release(&self, mut lease: Lease<T>) -> Result<(), PoolError> {
        let shared = &self.shared;
        let not_locked = PoolError::NotLocked {
            pool: shared.id,
            slot: lease.slot,
        };
        if lease.pool_id != shared.id {
            warn!(pool = shared.id, foreign_pool = lease.pool_id, slot = lease.slot, "release of foreign lease");
            return Err(not_locked);
        }
        if !shared.lock().locked.contains(&lease.slot) {
            return Err(not_locked);
        }

        lease.resource.reset();

        let mut state = shared.lock();
        if state.closed {
            state.locked.remove(&lease.slot);
            state.created -= 1;
            drop(state);
            lease.resource.dispose();
            debug!(pool = shared.id, slot = lease.slot, "disposed resource released after shutdown");
            return Ok(());
        }

        match state.queue.hand_off(lease) {
            Ok(ticket) => {
                debug!(pool = shared.id, ticket, "handed released resource to waiter");
            }
            Err(lease) => {
                state.locked.remove(&lease.slot);
                debug!(pool = shared.id, slot = lease.slot, "resource returned to idle list");
                state.available.push_back(lease);
            }
        }
        shared.check_invariants(&state);
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let limits = self.shared.limits;
        let mut state = self.shared.lock();
        state.queue.prune_abandoned();
        PoolStats {
            available: state.available.len(),
            locked: state.locked.len(),
            created: state.created,
            queued: state.queue.len(),
            queue_remaining: limits.max_queue_size.saturating_sub(state.queue.len()),
            can_grow: state.created < limits.max_size,
            max_size: limits.max_size,
        }
    }

    /// Close the pool.
    ///
    /// Pending acquires fail with [`PoolError::Closed`], idle resources are
    /// disposed now, and locked ones are disposed when released.
    pub fn shutdown(&self) {
        let idle: Vec<Lease<T>> = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.queue.clear();
            let idle: Vec<_> = state.available.drain(..).collect();
            state.created -= idle.len();
            idle
        };

        info!(pool = self.shared.id, disposed = idle.len(), "resource pool shut down");
        for mut lease in idle {
            lease.resource.dispose();
        }
    }
}

impl<T: Poolable> Drop for ResourcePool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Guard around a queued acquire.
///
/// If the owning future is dropped before the resource arrives, the channel
/// is closed and any resource already sent is released back to the pool.
struct PendingAcquire<'a, T: Poolable> {
    pool: &'a ResourcePool<T>,
    rx: Option<oneshot::Receiver<Lease<T>>>,
}

impl<T: Poolable> PendingAcquire<'_, T> {
    async fn wait(&mut self) -> Result<Lease<T>, PoolError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(PoolError::Closed);
        };
        let result = rx.await;
        self.rx = None;
        result.map_err(|_| PoolError::Closed)
    }
}

impl<T: Poolable> Drop for PendingAcquire<'_, T> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        rx.close();
        if let Ok(lease) = rx.try_recv() {
            let pool = self.pool.id();
            debug!(pool, slot = lease.slot, "acquire cancelled after hand-off; releasing");
            if let Err(e) = self.pool.release(lease) {
                warn!(pool, error = %e, "failed to release resource from cancelled acquire");
            }
        }
    }
}
