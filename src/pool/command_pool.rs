//! Command pool implementation
//!
//! Every open session occupies one semaphore permit (its [`Slot`]), whether
//! it is idle or borrowed, so the semaphore size is the pool's maximum. A
//! caller that finds no idle session and no free permit waits on the shared
//! `available` notifier, which fires whenever a session is released or a
//! slot is freed.
//!
//! Shrinking the pool forgets free permits straight away. Permits still held
//! by open sessions are retired as those sessions close, and sessions
//! released while the pool is above its maximum are closed instead of idled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::session::PooledSession;
use crate::stats::PoolStats;
use crate::studio::StudioConfig;

use super::config::PoolConfig;

#[derive(Debug, Default)]
struct SlotShared {
    available: Notify,
    live: AtomicUsize,
    /// Permits to forget instead of returning, owed by a shrink
    retire: AtomicUsize,
}

impl SlotShared {
    fn take_retirement(&self) -> bool {
        self.retire
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Capacity held by one open or opening session
///
/// Dropping the slot frees the capacity and wakes one waiting borrower.
#[derive(Debug)]
pub struct Slot {
    permit: Option<OwnedSemaphorePermit>,
    shared: Arc<SlotShared>,
    live: bool,
}

impl Slot {
    fn new(permit: OwnedSemaphorePermit, shared: Arc<SlotShared>) -> Self {
        Self {
            permit: Some(permit),
            shared,
            live: false,
        }
    }

    fn mark_live(&mut self) {
        if !self.live {
            self.live = true;
            self.shared.live.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.live {
            self.shared.live.fetch_sub(1, Ordering::AcqRel);
        }
        // Return the permit before waking anyone
        if let Some(permit) = self.permit.take() {
            if self.shared.take_retirement() {
                permit.forget();
            } else {
                drop(permit);
            }
        }
        self.shared.available.notify_one();
    }
}

struct WaitGuard<'a>(&'a AtomicUsize);

impl<'a> WaitGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct PoolInner {
    studio: String,
    host: String,
    port: u16,
    config: PoolConfig,
    min: AtomicUsize,
    max: AtomicUsize,
    idle: Mutex<VecDeque<PooledSession>>,
    slots: Arc<Semaphore>,
    shared: Arc<SlotShared>,
    next_id: AtomicU64,
    waiting: AtomicUsize,
    closed: AtomicBool,
    last_create_failure: Mutex<Option<Instant>>,
    replenish: Arc<Notify>,
    cancel: CancellationToken,
    created: AtomicU64,
    destroyed: AtomicU64,
    connect_failures: AtomicU64,
}

/// Bounded pool of command sessions for one studio
///
/// Cheap to clone; all clones share the same sessions.
#[derive(Debug, Clone)]
pub struct CommandPool {
    inner: Arc<PoolInner>,
}

impl CommandPool {
    /// Create a pool for `studio` and start its maintenance task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(studio: &StudioConfig, config: PoolConfig) -> Self {
        let max = studio.max_pool_size.max(1);
        let min = studio.min_pool_size.min(max);

        let inner = Arc::new(PoolInner {
            studio: studio.name.clone(),
            host: studio.host.clone(),
            port: studio.port,
            config,
            min: AtomicUsize::new(min),
            max: AtomicUsize::new(max),
            idle: Mutex::new(VecDeque::with_capacity(max)),
            slots: Arc::new(Semaphore::new(max)),
            shared: Arc::new(SlotShared::default()),
            next_id: AtomicU64::new(1),
            waiting: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            last_create_failure: Mutex::new(None),
            replenish: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
        });

        tracing::info!(
            studio = %studio.name,
            addr = %studio.address(),
            min = min,
            max = max,
            "Command pool created"
        );

        let pool = Self { inner };
        pool.spawn_maintenance();
        pool
    }

    /// Studio this pool connects to
    pub fn studio(&self) -> &str {
        &self.inner.studio
    }

    /// Pool timing configuration
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Whether the pool has been drained
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Borrow a validated session
    ///
    /// Fails with `AcquireTimeout` if no session can be produced within the
    /// configured acquire timeout, `PoolExhausted` if too many callers are
    /// already waiting, and `PoolClosed` after `drain()`.
    pub async fn acquire(&self) -> Result<PooledSession> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let timeout = self.inner.config.acquire_timeout;
        match tokio::time::timeout(timeout, self.acquire_inner()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    studio = %self.inner.studio,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out acquiring command session"
                );
                Err(Error::AcquireTimeout(timeout))
            }
        }
    }

    async fn acquire_inner(&self) -> Result<PooledSession> {
        let inner = &self.inner;
        let mut wait_guard: Option<WaitGuard<'_>> = None;

        loop {
            if self.is_closed() {
                return Err(Error::PoolClosed);
            }

            let notified = inner.shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(mut session) = self.pop_idle().await {
                match session.validate(inner.config.validation_timeout).await {
                    Ok(()) => {
                        tracing::trace!(studio = %inner.studio, session_id = session.id(), "Reusing session");
                        return Ok(session);
                    }
                    Err(_) => {
                        tracing::warn!(
                            studio = %inner.studio,
                            session_id = session.id(),
                            "Idle session failed validation, replacing"
                        );
                        self.destroy(session).await;
                        continue;
                    }
                }
            }

            if let Ok(permit) = Arc::clone(&inner.slots).try_acquire_owned() {
                let slot = Slot::new(permit, Arc::clone(&inner.shared));

                if let Some(delay) = self.create_backoff().await {
                    tokio::time::sleep(delay).await;
                }

                match self.open_session(slot).await {
                    Ok(session) => return Ok(session),
                    Err(e) => {
                        tracing::warn!(studio = %inner.studio, error = %e, "Failed to open command session");
                        continue;
                    }
                }
            }

            if wait_guard.is_none() {
                let waiting = inner.waiting.load(Ordering::Relaxed);
                if inner.config.max_waiting > 0 && waiting >= inner.config.max_waiting {
                    return Err(Error::PoolExhausted { waiting });
                }
                wait_guard = Some(WaitGuard::new(&inner.waiting));
            }

            notified.await;
        }
    }

    /// Return a borrowed session
    ///
    /// Sessions that are not idle (timed out, errored, abandoned mid-exchange)
    /// are destroyed instead of being reused, as are sessions coming back to a
    /// pool that was shrunk below its current size.
    pub async fn release(&self, session: PooledSession) {
        if session.slot.is_none() {
            tracing::warn!(studio = %self.inner.studio, session_id = session.id(), "Foreign session released");
            self.destroy(session).await;
            return;
        }

        if self.is_closed() || !session.state().is_reusable() || self.over_capacity() {
            self.destroy(session).await;
            return;
        }

        self.inner.idle.lock().await.push_back(session);
        self.inner.shared.available.notify_one();
    }

    /// Close a session and free its slot
    pub async fn destroy(&self, mut session: PooledSession) {
        tracing::debug!(
            studio = %self.inner.studio,
            session_id = session.id(),
            state = ?session.state(),
            age_ms = session.age().as_millis() as u64,
            "Destroying command session"
        );

        session.close().await;
        drop(session);
        self.inner.destroyed.fetch_add(1, Ordering::Relaxed);

        if !self.is_closed() {
            self.inner.replenish.notify_one();
        }
    }

    /// Change pool bounds without reconnecting existing sessions
    ///
    /// Growing takes effect at once. Shrinking closes idle sessions down to
    /// the new maximum; borrowed sessions over it are closed when released.
    pub async fn resize(&self, min: usize, max: usize) {
        let inner = &self.inner;
        let max = max.max(1);
        let min = min.min(max);

        let old_max = inner.max.swap(max, Ordering::AcqRel);
        inner.min.store(min, Ordering::Release);

        if max > old_max {
            let grow = max - old_max;
            // Permits still owed by an earlier shrink cancel out first
            let owed = inner
                .shared
                .retire
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(grow)))
                .unwrap_or_else(|n| n);
            inner.slots.add_permits(grow - owed.min(grow));
            inner.shared.available.notify_waiters();
        } else if max < old_max {
            let shrink = old_max - max;
            let forgotten = inner.slots.forget_permits(shrink);
            inner.shared.retire.fetch_add(shrink - forgotten, Ordering::AcqRel);

            self.evict_idle().await;
        }

        tracing::info!(studio = %inner.studio, min = min, max = max, "Command pool resized");
        inner.replenish.notify_one();
    }

    /// Stop lending sessions, wait for borrowed ones, then close everything
    ///
    /// Borrowed sessions get up to `drain_timeout` to come back.
    pub async fn drain(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        inner.cancel.cancel();
        inner.shared.available.notify_waiters();
        tracing::info!(studio = %inner.studio, "Draining command pool");

        let wait_for_borrowed = async {
            loop {
                let notified = inner.shared.available.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let idle = inner.idle.lock().await.len();
                if inner.shared.live.load(Ordering::Acquire) <= idle {
                    break;
                }

                tokio::select! {
                    _ = &mut notified => {}
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                }
            }
        };

        if tokio::time::timeout(inner.config.drain_timeout, wait_for_borrowed)
            .await
            .is_err()
        {
            let idle = inner.idle.lock().await.len();
            tracing::warn!(
                studio = %inner.studio,
                borrowed = inner.shared.live.load(Ordering::Acquire).saturating_sub(idle),
                "Drain timed out with sessions still borrowed"
            );
        }

        self.clear().await;
        inner.slots.close();
        tracing::info!(studio = %inner.studio, "Command pool drained");
    }

    /// Close every idle session
    pub async fn clear(&self) {
        let sessions: Vec<PooledSession> = self.inner.idle.lock().await.drain(..).collect();
        for mut session in sessions {
            session.close().await;
            self.inner.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time pool statistics
    pub async fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        let idle = inner.idle.lock().await.len();
        let size = inner.shared.live.load(Ordering::Acquire);

        PoolStats {
            size,
            idle,
            borrowed: size.saturating_sub(idle),
            waiting: inner.waiting.load(Ordering::Relaxed),
            min: inner.min.load(Ordering::Acquire),
            max: inner.max.load(Ordering::Acquire),
            created: inner.created.load(Ordering::Relaxed),
            destroyed: inner.destroyed.load(Ordering::Relaxed),
            connect_failures: inner.connect_failures.load(Ordering::Relaxed),
        }
    }

    fn over_capacity(&self) -> bool {
        self.inner.shared.live.load(Ordering::Acquire) > self.inner.max.load(Ordering::Acquire)
    }

    async fn pop_idle(&self) -> Option<PooledSession> {
        self.inner.idle.lock().await.pop_front()
    }

    /// Remaining wait before another creation attempt is allowed
    async fn create_backoff(&self) -> Option<Duration> {
        let last = *self.inner.last_create_failure.lock().await;
        last.and_then(|at| self.inner.config.create_retry_delay.checked_sub(at.elapsed()))
            .filter(|d| !d.is_zero())
    }

    async fn open_session(&self, mut slot: Slot) -> Result<PooledSession> {
        let inner = &self.inner;
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);

        let result = PooledSession::connect(
            id,
            &inner.host,
            inner.port,
            inner.config.connect_timeout,
            inner.config.response_timeout,
        )
        .await;

        match result {
            Ok(mut session) => {
                slot.mark_live();
                session.slot = Some(slot);
                inner.created.fetch_add(1, Ordering::Relaxed);
                *inner.last_create_failure.lock().await = None;
                tracing::debug!(studio = %inner.studio, session_id = id, "Command session opened");
                Ok(session)
            }
            Err(e) => {
                inner.connect_failures.fetch_add(1, Ordering::Relaxed);
                *inner.last_create_failure.lock().await = Some(Instant::now());
                Err(e)
            }
        }
    }

    /// Evict idle sessions above the maximum, then those past the soft idle
    /// timeout while the pool stays above its minimum
    async fn evict_idle(&self) {
        let inner = &self.inner;
        let min = inner.min.load(Ordering::Acquire);
        let max = inner.max.load(Ordering::Acquire);
        let soft = inner.config.soft_idle_timeout;

        let evicted: Vec<PooledSession> = {
            let mut idle = inner.idle.lock().await;
            let mut live = inner.shared.live.load(Ordering::Acquire);
            let mut kept = VecDeque::with_capacity(idle.len());
            let mut evicted = Vec::new();

            for session in idle.drain(..) {
                if live > max || (live > min && session.idle_for() > soft) {
                    live -= 1;
                    evicted.push(session);
                } else {
                    kept.push_back(session);
                }
            }

            *idle = kept;
            evicted
        };

        for session in evicted {
            tracing::debug!(studio = %inner.studio, session_id = session.id(), "Evicting idle session");
            self.destroy(session).await;
        }
    }

    /// Open sessions until the pool holds its minimum
    async fn fill_to_min(&self) {
        let inner = &self.inner;

        loop {
            if self.is_closed() {
                return;
            }
            if inner.shared.live.load(Ordering::Acquire) >= inner.min.load(Ordering::Acquire) {
                return;
            }
            if self.create_backoff().await.is_some() {
                return;
            }

            let Ok(permit) = Arc::clone(&inner.slots).try_acquire_owned() else {
                return;
            };
            let slot = Slot::new(permit, Arc::clone(&inner.shared));

            match self.open_session(slot).await {
                Ok(session) => {
                    inner.idle.lock().await.push_back(session);
                    inner.shared.available.notify_one();
                }
                Err(e) => {
                    tracing::warn!(studio = %inner.studio, error = %e, "Failed to pre-open command session");
                    return;
                }
            }
        }
    }

    fn spawn_maintenance(&self) {
        let weak = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel.clone();
        let replenish = Arc::clone(&self.inner.replenish);
        let interval = self.inner.config.eviction_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                    _ = replenish.notified() => {}
                }

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let pool = CommandPool { inner };
                pool.evict_idle().await;
                pool.fill_to_min().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{eventually, FakeStudio};

    fn config() -> PoolConfig {
        PoolConfig::default()
            .acquire_timeout(Duration::from_millis(300))
            .response_timeout(Duration::from_millis(200))
            .validation_timeout(Duration::from_millis(100))
            .create_retry_delay(Duration::from_millis(50))
            .eviction_interval(Duration::from_millis(20))
    }

    fn studio(fake: &FakeStudio, min: usize, max: usize) -> StudioConfig {
        StudioConfig::new("main", "127.0.0.1", fake.port()).pool_size(min, max)
    }

    #[tokio::test]
    async fn test_acquire_send_release_reuses_session() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 2), config());

        let mut session = pool.acquire().await.unwrap();
        let id = session.id();
        assert_eq!(session.send_command("stat").await.unwrap(), "ok stat");
        pool.release(session).await;

        let stats = pool.stats().await;
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.borrowed, 0);

        let session = pool.acquire().await.unwrap();
        assert_eq!(session.id(), id);
    }

    #[tokio::test]
    async fn test_sixth_acquire_times_out() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 2, 5), config());

        let mut held = Vec::new();
        for _ in 0..5 {
            held.push(pool.acquire().await.unwrap());
        }

        let started = Instant::now();
        let result = pool.acquire().await;
        assert!(matches!(result, Err(Error::AcquireTimeout(_))));
        assert!(started.elapsed() >= Duration::from_millis(300));

        let stats = pool.stats().await;
        assert_eq!(stats.size, 5);
        assert_eq!(stats.borrowed, 5);
    }

    #[tokio::test]
    async fn test_release_wakes_waiter() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 1), config());

        let session = pool.acquire().await.unwrap();
        let id = session.id();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        pool.release(session).await;

        let session = waiter.await.unwrap().unwrap();
        assert_eq!(session.id(), id);
    }

    #[tokio::test]
    async fn test_dropped_session_frees_slot() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 1), config());

        let session = pool.acquire().await.unwrap();
        let first = session.id();
        drop(session);

        let session = pool.acquire().await.unwrap();
        assert_ne!(session.id(), first);
    }

    #[tokio::test]
    async fn test_timed_out_session_destroyed_on_release() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 2), config());

        let mut session = pool.acquire().await.unwrap();
        let result = session.send_command("hang").await;
        assert!(matches!(result, Err(Error::ResponseTimeout(_))));
        pool.release(session).await;

        let stats = pool.stats().await;
        assert_eq!(stats.size, 0);
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.destroyed, 1);
    }

    #[tokio::test]
    async fn test_failed_validation_replaces_session() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 2), config());

        let session = pool.acquire().await.unwrap();
        let first = session.id();
        pool.release(session).await;

        fake.state().ignore_blank_lines(true);

        let session = pool.acquire().await.unwrap();
        assert_ne!(session.id(), first);
        assert_eq!(pool.stats().await.destroyed, 1);
    }

    #[tokio::test]
    async fn test_minimum_size_prefilled() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 2, 4), config());

        eventually(|| {
            let pool = pool.clone();
            async move { pool.stats().await.idle == 2 }
        })
        .await;
        assert_eq!(pool.stats().await.created, 2);
    }

    #[tokio::test]
    async fn test_idle_sessions_evicted_above_minimum() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(
            &studio(&fake, 1, 3),
            config().soft_idle_timeout(Duration::from_millis(50)),
        );

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        pool.release(a).await;
        pool.release(b).await;

        eventually(|| {
            let pool = pool.clone();
            async move { pool.stats().await.size == 1 }
        })
        .await;
        assert_eq!(pool.stats().await.idle, 1);
    }

    #[tokio::test]
    async fn test_connect_failure_times_out() {
        let port = crate::testing::unused_port().await;
        let pool = CommandPool::new(
            &StudioConfig::new("gone", "127.0.0.1", port).pool_size(0, 2),
            config(),
        );

        let result = pool.acquire().await;
        assert!(matches!(result, Err(Error::AcquireTimeout(_))));
        assert_eq!(pool.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_connect_attempts_spaced_by_retry_delay() {
        let port = crate::testing::unused_port().await;
        let pool = CommandPool::new(
            &StudioConfig::new("gone", "127.0.0.1", port).pool_size(0, 2),
            config()
                .acquire_timeout(Duration::from_millis(1000))
                .create_retry_delay(Duration::from_millis(300)),
        );

        let result = pool.acquire().await;
        assert!(matches!(result, Err(Error::AcquireTimeout(_))));

        // Attempts at roughly 0, 300, 600 and 900 ms
        let attempts = pool.stats().await.connect_failures;
        assert!((3..=4).contains(&attempts), "{} connect attempts", attempts);
    }

    #[tokio::test]
    async fn test_max_waiting_exhausts_pool() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 1), config().max_waiting(1));

        let _held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        eventually(|| {
            let pool = pool.clone();
            async move { pool.stats().await.waiting == 1 }
        })
        .await;

        let result = pool.acquire().await;
        assert!(matches!(result, Err(Error::PoolExhausted { waiting: 1 })));

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::AcquireTimeout(_))));
    }

    #[tokio::test]
    async fn test_resize_grows_capacity() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 1), config());

        let _a = pool.acquire().await.unwrap();
        pool.resize(0, 2).await;
        let _b = pool.acquire().await.unwrap();

        let stats = pool.stats().await;
        assert_eq!(stats.max, 2);
        assert_eq!(stats.borrowed, 2);
    }

    #[tokio::test]
    async fn test_resize_shrinks_idle_set() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 3), config());

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        pool.release(a).await;
        pool.release(b).await;

        pool.resize(0, 1).await;

        let stats = pool.stats().await;
        assert_eq!(stats.max, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.destroyed, 1);
    }

    #[tokio::test]
    async fn test_shrink_while_borrowed_caps_pool() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 3), config());

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();

        pool.resize(0, 1).await;
        pool.release(a).await;
        pool.release(b).await;
        pool.release(c).await;

        let stats = pool.stats().await;
        assert_eq!(stats.max, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.destroyed, 2);

        // Only one session may be out at a time now
        let _held = pool.acquire().await.unwrap();
        let result = pool.acquire().await;
        assert!(matches!(result, Err(Error::AcquireTimeout(_))));
        assert_eq!(pool.stats().await.size, 1);
    }

    #[tokio::test]
    async fn test_regrow_before_release_keeps_sessions() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 0, 3), config());

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();

        pool.resize(0, 1).await;
        pool.resize(0, 3).await;
        pool.release(a).await;
        pool.release(b).await;
        pool.release(c).await;

        let stats = pool.stats().await;
        assert_eq!(stats.size, 3);
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.destroyed, 0);

        // No capacity was gained or lost along the way
        let mut held = Vec::new();
        for _ in 0..3 {
            held.push(pool.acquire().await.unwrap());
        }
        assert!(matches!(pool.acquire().await, Err(Error::AcquireTimeout(_))));
    }

    #[tokio::test]
    async fn test_drain_waits_for_borrowed_then_closes() {
        let fake = FakeStudio::start().await;
        let pool = CommandPool::new(&studio(&fake, 1, 2), config());

        let session = pool.acquire().await.unwrap();
        {
            let pool = pool.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                pool.release(session).await;
            });
        }

        let started = Instant::now();
        pool.drain().await;
        assert!(started.elapsed() >= Duration::from_millis(100));

        let stats = pool.stats().await;
        assert_eq!(stats.size, 0);
        assert_eq!(stats.idle, 0);
        assert!(pool.is_closed());
        assert!(matches!(pool.acquire().await, Err(Error::PoolClosed)));
    }
}
