//! Synchronization primitives for worktree-hub.
//!
//! - [`Semaphore`] caps how many git processes run at once.
//! - [`RepoLocks`] hands out one FIFO writer lock per repository root, so
//!   structural mutations of `.git/worktrees` never interleave.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use dashmap::DashMap;
use once_cell::sync::Lazy;

/// A counting semaphore for limiting concurrency.
///
/// Used to prevent resource exhaustion when many parallel operations need
/// to run. Provides RAII-based permit management through [`SemaphoreGuard`].
#[derive(Clone)]
pub struct Semaphore {
    state: Arc<(Mutex<usize>, Condvar)>,
}

/// RAII guard that releases a semaphore permit on drop.
pub struct SemaphoreGuard {
    state: Arc<(Mutex<usize>, Condvar)>,
}

impl Semaphore {
    /// Create a new semaphore with the given number of permits.
    pub fn new(permits: usize) -> Self {
        Self {
            state: Arc::new((Mutex::new(permits), Condvar::new())),
        }
    }

    /// Acquire a permit, blocking until one is available.
    ///
    /// Returns a guard that releases the permit when dropped.
    pub fn acquire(&self) -> SemaphoreGuard {
        let (lock, cvar) = &*self.state;
        let mut available = lock.lock().unwrap();

        while *available == 0 {
            available = cvar.wait(available).unwrap();
        }

        *available -= 1;

        SemaphoreGuard {
            state: Arc::clone(&self.state),
        }
    }
}

impl Drop for SemaphoreGuard {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.state;
        let mut available = lock.lock().unwrap();
        *available += 1;
        cvar.notify_one();
    }
}

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// A ticket lock: waiters are admitted strictly in arrival order.
#[derive(Clone, Default)]
pub struct WriterLock {
    state: Arc<(Mutex<Tickets>, Condvar)>,
}

/// RAII guard for a held [`WriterLock`].
pub struct WriterGuard {
    state: Arc<(Mutex<Tickets>, Condvar)>,
}

impl WriterLock {
    /// Block until every earlier caller has released the lock.
    pub fn acquire(&self) -> WriterGuard {
        let (lock, cvar) = &*self.state;
        let mut tickets = lock.lock().unwrap();
        let ticket = tickets.next;
        tickets.next += 1;

        while tickets.serving != ticket {
            tickets = cvar.wait(tickets).unwrap();
        }

        WriterGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// Take the lock only if nobody holds or awaits it.
    pub fn try_acquire(&self) -> Option<WriterGuard> {
        let (lock, _) = &*self.state;
        let mut tickets = lock.lock().unwrap();
        if tickets.next != tickets.serving {
            return None;
        }
        tickets.next += 1;
        Some(WriterGuard {
            state: Arc::clone(&self.state),
        })
    }
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.state;
        let mut tickets = lock.lock().unwrap();
        tickets.serving += 1;
        cvar.notify_all();
    }
}

static PROCESS_LOCKS: Lazy<RepoLocks> = Lazy::new(RepoLocks::new);

/// Registry of writer locks keyed by repository root.
///
/// Cloning shares the registry, so every [`crate::git::Repository`] handle
/// built from the same `RepoLocks` serializes against the others.
#[derive(Clone, Default)]
pub struct RepoLocks {
    locks: Arc<DashMap<PathBuf, WriterLock>>,
}

impl RepoLocks {
    /// A fresh registry, isolated from every other one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process; the default for new handles.
    pub fn global() -> Self {
        PROCESS_LOCKS.clone()
    }

    /// The writer lock for `root`, created on first use.
    pub fn lock_for(&self, root: &Path) -> WriterLock {
        // Clone out of the map so waiting never holds a shard lock
        self.locks.entry(root.to_path_buf()).or_default().clone()
    }
}
