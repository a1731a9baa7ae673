//! Short-lived memo of `git status` per worktree.
//!
//! Entries are keyed by canonical path. A fresh entry is served without
//! running git; concurrent misses for one path share a single git call; a
//! failed call is never cached and reaches every caller that waited on it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::config::Settings;
use crate::git::{CommandRunner, GitError, StatusSummary, parse_status};
use crate::path::canonical_or_raw;

type StatusResult = Result<StatusSummary, GitError>;

/// One `git status` call that other callers can wait on.
#[derive(Default)]
struct Flight {
    result: Mutex<Option<StatusResult>>,
    done: Condvar,
}

impl Flight {
    fn complete(&self, result: StatusResult) {
        *self.result.lock().unwrap() = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> StatusResult {
        let mut slot = self.result.lock().unwrap();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.done.wait(slot).unwrap();
        }
    }
}

/// The caller running git for a flight.
///
/// Dropping it before [`Leader::finish`] (the runner panicked) fails the
/// flight and clears the in-flight marker, so joined callers never hang.
struct Leader<'a> {
    cache: &'a StatusCache,
    key: &'a Path,
    flight: Arc<Flight>,
    finished: bool,
}

impl Leader<'_> {
    fn finish(mut self, result: &StatusResult) {
        self.cache.settle(self.key, &self.flight, result);
        self.flight.complete(result.clone());
        self.finished = true;
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::warn!("Status for {} abandoned mid-flight", self.key.display());
        let result = Err(GitError::Other {
            message: format!("git status for {} did not complete", self.key.display()),
        });
        self.cache.settle(self.key, &self.flight, &result);
        self.flight.complete(result);
    }
}

enum CacheEntry {
    Ready { summary: StatusSummary, at: Instant },
    InFlight(Arc<Flight>),
}

enum Lookup {
    Hit(StatusSummary),
    Join(Arc<Flight>),
    Lead(Arc<Flight>),
}

struct Inner {
    runner: Arc<dyn CommandRunner>,
    ttl: Duration,
    timeout: Option<Duration>,
    entries: DashMap<PathBuf, CacheEntry>,
    subscribers: Mutex<Vec<Sender<(PathBuf, StatusSummary)>>>,
}

/// Cloning shares the cache.
#[derive(Clone)]
pub struct StatusCache {
    inner: Arc<Inner>,
}

impl StatusCache {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Self {
        Self::with_ttl(runner, settings.status_ttl(), Some(settings.command_timeout()))
    }

    pub fn with_ttl(
        runner: Arc<dyn CommandRunner>,
        ttl: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                runner,
                ttl,
                timeout,
                entries: DashMap::new(),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Status for the worktree at `path`.
    ///
    /// `force_bypass` skips a fresh entry but still joins a call already in
    /// flight, since that result cannot be older than this request.
    pub fn get(&self, path: &Path, force_bypass: bool) -> StatusResult {
        let key = canonical_or_raw(path);

        let leader = match self.lookup(&key, force_bypass) {
            Lookup::Hit(summary) => {
                log::trace!("Status cache hit for {}", key.display());
                return Ok(summary);
            }
            Lookup::Join(flight) => return flight.wait(),
            Lookup::Lead(flight) => Leader {
                cache: self,
                key: &key,
                flight,
                finished: false,
            },
        };

        let args: Vec<String> = ["status", "--porcelain", "-b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let result = self
            .inner
            .runner
            .run(&args, &key, self.inner.timeout)
            .map(|stdout| parse_status(&stdout));

        leader.finish(&result);

        if let Ok(summary) = &result {
            self.publish(&key, summary);
        }
        result
    }

    fn lookup(&self, key: &Path, force_bypass: bool) -> Lookup {
        match self.inner.entries.entry(key.to_path_buf()) {
            Entry::Occupied(mut occupied) => {
                match occupied.get() {
                    CacheEntry::InFlight(flight) => return Lookup::Join(Arc::clone(flight)),
                    CacheEntry::Ready { summary, at }
                        if !force_bypass && at.elapsed() < self.inner.ttl =>
                    {
                        return Lookup::Hit(summary.clone());
                    }
                    CacheEntry::Ready { .. } => {}
                }
                let flight = Arc::new(Flight::default());
                occupied.insert(CacheEntry::InFlight(Arc::clone(&flight)));
                Lookup::Lead(flight)
            }
            Entry::Vacant(vacant) => {
                let flight = Arc::new(Flight::default());
                vacant.insert(CacheEntry::InFlight(Arc::clone(&flight)));
                Lookup::Lead(flight)
            }
        }
    }

    /// Replace our in-flight marker, unless an invalidation removed it meanwhile.
    fn settle(&self, key: &Path, flight: &Arc<Flight>, result: &StatusResult) {
        let Entry::Occupied(mut occupied) = self.inner.entries.entry(key.to_path_buf()) else {
            return;
        };
        let ours = matches!(occupied.get(), CacheEntry::InFlight(f) if Arc::ptr_eq(f, flight));
        if !ours {
            return;
        }
        match result {
            Ok(summary) => {
                occupied.insert(CacheEntry::Ready {
                    summary: summary.clone(),
                    at: Instant::now(),
                });
            }
            Err(e) => {
                log::debug!("Status for {} failed, evicting: {e:?}", key.display());
                occupied.remove();
            }
        }
    }

    /// Cached summary if one is fresh, without running git.
    pub fn peek(&self, path: &Path) -> Option<StatusSummary> {
        let key = canonical_or_raw(path);
        match self.inner.entries.get(&key)?.value() {
            CacheEntry::Ready { summary, at } if at.elapsed() < self.inner.ttl => {
                Some(summary.clone())
            }
            _ => None,
        }
    }

    /// Refresh `path` on a worker thread; the result only reaches subscribers.
    ///
    /// Failures are logged and otherwise dropped: this feeds display
    /// decoration, never an operation's outcome.
    pub fn refresh_in_background(&self, path: &Path) {
        let cache = self.clone();
        let path = path.to_path_buf();
        std::thread::spawn(move || {
            if let Err(e) = cache.get(&path, true) {
                log::debug!("Background status refresh for {} failed: {e:?}", path.display());
            }
        });
    }

    /// Drop the entry for `path` so the next read runs git.
    pub fn invalidate(&self, path: &Path) {
        let key = canonical_or_raw(path);
        if self.inner.entries.remove(&key).is_some() {
            log::trace!("Invalidated status for {}", key.display());
        }
    }

    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    /// Receive `(path, summary)` for every status computed from now on.
    pub fn subscribe(&self) -> Receiver<(PathBuf, StatusSummary)> {
        let (tx, rx) = unbounded();
        self.inner.subscribers.lock().unwrap().push(tx);
        rx
    }

    fn publish(&self, key: &Path, summary: &StatusSummary) {
        let mut subscribers = self.inner.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send((key.to_path_buf(), summary.clone())).is_ok());
    }
}
