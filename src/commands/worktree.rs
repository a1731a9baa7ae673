use std::path::Path;

use color_print::cformat;
use worktree_hub::git::{BranchCleanup, LockOutcome, find_worktree};
use worktree_hub::path::format_path_for_display;
use worktree_hub::styling::{
    HINT, HINT_EMOJI, INFO_EMOJI, SUCCESS_EMOJI, WARNING, WARNING_EMOJI, eprintln,
    format_with_gutter, println,
};
use worktree_hub::terminal::launcher_for;

use super::{Context, describe};

pub fn handle_add(
    ctx: &Context,
    branch: &str,
    create: bool,
    detach: bool,
    base: Option<&str>,
    path: Option<&Path>,
    open: bool,
) -> anyhow::Result<()> {
    // Relative --path is relative to where we run, not to the repository root
    let target = path.map(|p| ctx.cwd.join(p));
    let created = if detach {
        ctx.repo.add_detached(branch, target.as_deref())?
    } else {
        ctx.repo.add(branch, create, target.as_deref(), base)?
    };

    let shown = format_path_for_display(&created);
    let message = if detach {
        cformat!("{SUCCESS_EMOJI} <green>Created detached worktree at <bold>{branch}</> in <bold>{shown}</></>")
    } else {
        let verb = if create { "Created branch and worktree" } else { "Created worktree" };
        cformat!("{SUCCESS_EMOJI} <green>{verb} for <bold>{branch}</> at <bold>{shown}</></>")
    };
    println!("{message}");

    if open || ctx.settings.auto_open_terminal {
        open_terminal(ctx, &created);
    }
    Ok(())
}

pub fn handle_remove(
    ctx: &Context,
    target: &str,
    force: bool,
    keep_branch: bool,
) -> anyhow::Result<()> {
    let path = ctx.resolve_worktree(target);
    let shown = format_path_for_display(&path);

    if keep_branch {
        ctx.repo.remove(&path, force)?;
        println!("{}", cformat!("{SUCCESS_EMOJI} <green>Removed worktree at <bold>{shown}</></>"));
        return Ok(());
    }

    let outcome = ctx.repo.remove_with_branch_cleanup(&path, force)?;
    println!("{}", cformat!("{SUCCESS_EMOJI} <green>Removed worktree at <bold>{shown}</></>"));

    let Some(branch) = outcome.branch.as_deref() else {
        return Ok(());
    };
    match &outcome.branch_cleanup {
        BranchCleanup::Deleted => {
            println!("{}", cformat!("{SUCCESS_EMOJI} <green>Deleted branch <bold>{branch}</></>"));
        }
        BranchCleanup::StillCheckedOut(holder) => {
            let holder = format_path_for_display(holder);
            println!("{INFO_EMOJI} {HINT}Kept branch {branch}: checked out at {holder}{HINT:#}");
        }
        BranchCleanup::Failed(message) => {
            println!("{WARNING_EMOJI} {WARNING}Kept branch {branch}{WARNING:#}");
            if !message.trim().is_empty() {
                println!("{}", format_with_gutter(message.trim(), None));
            }
        }
        BranchCleanup::Skipped => {}
    }
    Ok(())
}

pub fn handle_lock(ctx: &Context, target: &str, reason: Option<&str>) -> anyhow::Result<()> {
    let path = ctx.resolve_worktree(target);
    let records = ctx.repo.list();
    let name = describe(find_worktree(&records, &path), &path);

    match ctx.repo.lock(&path, reason)? {
        LockOutcome::AlreadyLocked => {
            println!("{INFO_EMOJI} {HINT}{name} is already locked{HINT:#}");
        }
        _ => println!("{}", cformat!("{SUCCESS_EMOJI} <green>Locked <bold>{name}</></>")),
    }
    Ok(())
}

pub fn handle_unlock(ctx: &Context, target: &str) -> anyhow::Result<()> {
    let path = ctx.resolve_worktree(target);
    let records = ctx.repo.list();
    let name = describe(find_worktree(&records, &path), &path);

    match ctx.repo.unlock(&path)? {
        LockOutcome::NotLocked => {
            println!("{INFO_EMOJI} {HINT}{name} is not locked{HINT:#}");
        }
        _ => println!("{}", cformat!("{SUCCESS_EMOJI} <green>Unlocked <bold>{name}</></>")),
    }
    Ok(())
}

pub fn handle_open(ctx: &Context, target: Option<&str>) -> anyhow::Result<()> {
    let path = ctx.resolve_worktree_or_current(target);
    if ctx.settings.terminal_command.is_none() {
        // Printing the path keeps `cd "$(wth open feature)"` useful
        println!("{}", path.display());
        eprintln!("{HINT_EMOJI} {HINT}Set terminal-command in the config to open a terminal{HINT:#}");
        return Ok(());
    }
    launcher_for(ctx.settings.terminal_command.as_deref()).open(&path)
}

/// Launch failures after a successful add are reported, not fatal.
fn open_terminal(ctx: &Context, path: &Path) {
    let launcher = launcher_for(ctx.settings.terminal_command.as_deref());
    if let Err(e) = launcher.open(path) {
        println!("{WARNING_EMOJI} {WARNING}Could not open terminal: {e:#}{WARNING:#}");
    }
}
