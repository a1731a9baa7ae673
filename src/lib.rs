pub mod config;
pub mod git;
pub mod path;
pub mod refresh;
pub mod shell_exec;
pub mod status_cache;
pub mod styling;
pub mod sync;
pub mod terminal;

pub use config::{MutationPolicy, Settings, SettingsStore};
pub use git::{GitError, Repository, StatusSummary, WorktreeRecord};
pub use refresh::{
    RefreshController, RefreshTrigger, Snapshot, WeakRefreshController, WorktreeSource,
};
pub use status_cache::StatusCache;
