//! Opening a terminal in a worktree.
//!
//! The host application decides how terminals are opened; this module only
//! defines the capability and two simple implementations.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, bail};

/// Capability to open a terminal rooted at a directory.
pub trait TerminalLauncher: Send + Sync {
    fn open(&self, path: &Path) -> anyhow::Result<()>;
}

/// Launcher for hosts without terminal support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTerminalLauncher;

impl TerminalLauncher for NoopTerminalLauncher {
    fn open(&self, path: &Path) -> anyhow::Result<()> {
        log::debug!("No terminal launcher configured; not opening {}", path.display());
        Ok(())
    }
}

/// Runs a configured command line, e.g. `wezterm start --cwd {path}`.
///
/// The template is split with shell quoting rules but never run through a
/// shell; `{path}` is substituted inside each resulting argument.
#[derive(Debug, Clone)]
pub struct CommandTemplateLauncher {
    template: String,
}

impl CommandTemplateLauncher {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Program and arguments for `path`.
    pub fn command_line(&self, path: &Path) -> anyhow::Result<Vec<String>> {
        let Some(words) = shlex::split(&self.template) else {
            bail!("Unbalanced quotes in terminal-command: {}", self.template);
        };
        if words.is_empty() {
            bail!("terminal-command is empty");
        }

        let path = path.to_string_lossy();
        Ok(words
            .into_iter()
            .map(|word| word.replace("{path}", &path))
            .collect())
    }
}

impl TerminalLauncher for CommandTemplateLauncher {
    fn open(&self, path: &Path) -> anyhow::Result<()> {
        let argv = self.command_line(path)?;
        let (program, args) = argv
            .split_first()
            .context("terminal-command is empty")?;

        log::debug!("$ {} [terminal]", argv.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .current_dir(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch terminal `{program}`"))?;

        // Reap in the background; the terminal is not waited on
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// Launcher for a configured `terminal-command`, or the no-op one.
pub fn launcher_for(terminal_command: Option<&str>) -> Box<dyn TerminalLauncher> {
    match terminal_command {
        Some(template) if !template.trim().is_empty() => {
            Box::new(CommandTemplateLauncher::new(template))
        }
        _ => Box::new(NoopTerminalLauncher),
    }
}
