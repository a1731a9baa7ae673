//! Keeps a snapshot of all worktrees in sync with change events.
//!
//! Every refresh lists each tracked repository and swaps in a whole new
//! [`Snapshot`]; records are never patched in place. Refreshes never run in
//! parallel: a request that arrives while one is running is folded into a
//! single rerun once the running one finishes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendError, Sender, unbounded};

use crate::config::Settings;
use crate::git::{GitError, Repository, WorktreeRecord};

/// Why a refresh ran. Diagnostic only; parsing never depends on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RefreshTrigger {
    #[default]
    Startup,
    Manual,
    ModelChange,
    GitEvent,
    FileSystem,
}

/// The worktrees of every tracked repository at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub worktrees: Vec<WorktreeRecord>,
    /// Roots whose listing failed, kept apart from "no worktrees".
    pub unavailable: Vec<(PathBuf, GitError)>,
    pub trigger: RefreshTrigger,
    /// Zero until the first refresh; one more per published snapshot.
    pub generation: u64,
}

/// Where the controller gets worktree listings from.
pub trait WorktreeSource: Send + Sync {
    /// One entry per tracked repository root.
    fn list_all(&self) -> Vec<(PathBuf, Result<Vec<WorktreeRecord>, GitError>)>;
}

impl WorktreeSource for Repository {
    fn list_all(&self) -> Vec<(PathBuf, Result<Vec<WorktreeRecord>, GitError>)> {
        vec![(self.root().to_path_buf(), self.try_list())]
    }
}

impl WorktreeSource for Vec<Repository> {
    fn list_all(&self) -> Vec<(PathBuf, Result<Vec<WorktreeRecord>, GitError>)> {
        self.iter().flat_map(|repo| repo.list_all()).collect()
    }
}

#[derive(Default)]
struct RunState {
    running: bool,
    pending: Option<RefreshTrigger>,
}

struct Inner {
    source: Arc<dyn WorktreeSource>,
    debounce: Duration,
    state: Mutex<RunState>,
    snapshot: Mutex<Arc<Snapshot>>,
    subscribers: Mutex<Vec<Sender<Arc<Snapshot>>>>,
    fs_events: Mutex<Option<Sender<PathBuf>>>,
}

/// Refresh/reconciliation controller. Cloning shares the controller.
#[derive(Clone)]
pub struct RefreshController {
    inner: Arc<Inner>,
}

/// A [`RefreshController`] reference that does not keep it alive.
#[derive(Clone)]
pub struct WeakRefreshController {
    inner: Weak<Inner>,
}

impl WeakRefreshController {
    pub fn upgrade(&self) -> Option<RefreshController> {
        self.inner.upgrade().map(|inner| RefreshController { inner })
    }
}

impl RefreshController {
    pub fn new(source: Arc<dyn WorktreeSource>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                debounce,
                state: Mutex::new(RunState::default()),
                snapshot: Mutex::new(Arc::new(Snapshot::default())),
                subscribers: Mutex::new(Vec::new()),
                fs_events: Mutex::new(None),
            }),
        }
    }

    pub fn from_settings(source: Arc<dyn WorktreeSource>, settings: &Settings) -> Self {
        Self::new(source, settings.debounce())
    }

    /// Initial listing.
    pub fn start(&self) {
        self.request(RefreshTrigger::Startup);
    }

    /// Explicit user refresh.
    pub fn refresh_now(&self) {
        self.request(RefreshTrigger::Manual);
    }

    /// Call after a local mutation completes. Handles built with
    /// [`Repository::with_refresh`] do this themselves.
    pub fn after_mutation(&self) {
        self.request(RefreshTrigger::ModelChange);
    }

    /// The repository reported a change (ref update, fetch, ...).
    pub fn notify_git_event(&self) {
        self.request(RefreshTrigger::GitEvent);
    }

    /// A watched file changed. Bursts collapse into one refresh after the
    /// debounce interval passes without another event.
    pub fn notify_filesystem_change(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::trace!("Filesystem change: {}", path.display());

        let mut slot = self.inner.fs_events.lock().unwrap();
        let tx = slot.get_or_insert_with(|| spawn_debouncer(&self.inner));
        if let Err(SendError(path)) = tx.send(path) {
            // Worker exited; start a fresh one
            let tx = spawn_debouncer(&self.inner);
            let _ = tx.send(path);
            *slot = Some(tx);
        }
    }

    /// Refresh now on this thread, or, when a refresh is already running,
    /// queue one rerun for it and return immediately.
    pub fn request(&self, trigger: RefreshTrigger) {
        Inner::request(&self.inner, trigger);
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> Receiver<Arc<Snapshot>> {
        let (tx, rx) = unbounded();
        self.inner.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.snapshot.lock().unwrap())
    }

    pub fn downgrade(&self) -> WeakRefreshController {
        WeakRefreshController {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Inner {
    fn request(self: &Arc<Self>, trigger: RefreshTrigger) {
        {
            let mut state = self.state.lock().unwrap();
            if state.running {
                log::debug!("Refresh in flight; coalescing {trigger}");
                state.pending = Some(trigger);
                return;
            }
            state.running = true;
        }

        let mut trigger = trigger;
        loop {
            self.refresh(trigger);

            let mut state = self.state.lock().unwrap();
            match state.pending.take() {
                Some(next) => trigger = next,
                None => {
                    state.running = false;
                    break;
                }
            }
        }
    }

    fn refresh(&self, trigger: RefreshTrigger) {
        let mut worktrees = Vec::new();
        let mut unavailable = Vec::new();
        for (root, result) in self.source.list_all() {
            match result {
                Ok(records) => worktrees.extend(records),
                Err(e) => {
                    log::warn!("Repository {} unavailable: {e:?}", root.display());
                    unavailable.push((root, e));
                }
            }
        }

        let snapshot = {
            let mut current = self.snapshot.lock().unwrap();
            let snapshot = Arc::new(Snapshot {
                worktrees,
                unavailable,
                trigger,
                generation: current.generation + 1,
            });
            *current = Arc::clone(&snapshot);
            snapshot
        };

        log::info!(
            "Snapshot {} ({trigger}): {} worktrees, {} unavailable",
            snapshot.generation,
            snapshot.worktrees.len(),
            snapshot.unavailable.len()
        );

        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(Arc::clone(&snapshot)).is_ok());
    }
}

/// Worker that turns a burst of filesystem events into one refresh.
///
/// Holds only a weak reference, so it exits once the controller is dropped.
fn spawn_debouncer(inner: &Arc<Inner>) -> Sender<PathBuf> {
    let (tx, rx) = unbounded::<PathBuf>();
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let debounce = inner.debounce;

    std::thread::spawn(move || {
        while rx.recv().is_ok() {
            loop {
                match rx.recv_timeout(debounce) {
                    Ok(_) => continue,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.request(RefreshTrigger::FileSystem);
        }
    });

    tx
}
