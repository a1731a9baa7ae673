use anyhow::Context as _;
use worktree_hub::git::StatusSummary;
use worktree_hub::path::format_path_for_display;
use worktree_hub::styling::{CYAN, GRAY, GREEN, StyledLine, WARNING, println};

use super::Context;
use crate::OutputFormat;

pub fn handle_status(
    ctx: &Context,
    target: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let path = ctx.resolve_worktree_or_current(target);
    let status = ctx.repo.status(&path)?;

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&status).context("Failed to serialize to JSON")?;
            println!("{json}");
        }
        OutputFormat::Table => {
            println!("{}", render_status(&status).render());
            println!("{}", format_path_for_display(&path));
        }
    }
    Ok(())
}

fn render_status(status: &StatusSummary) -> StyledLine {
    let mut line = StyledLine::new();
    line.push_styled(status.branch.clone(), CYAN);
    if let Some(upstream) = &status.upstream {
        line.push_styled(format!("...{upstream}"), GRAY);
    }
    if status.ahead > 0 {
        line.push_raw(" ");
        line.push_styled(format!("↑{}", status.ahead), GREEN);
    }
    if status.behind > 0 {
        line.push_raw(" ");
        line.push_styled(format!("↓{}", status.behind), GRAY);
    }

    if !status.is_dirty() {
        line.push_styled("  clean", GRAY);
        return line;
    }
    for (count, label) in [
        (status.staged, "staged"),
        (status.modified, "modified"),
        (status.untracked, "untracked"),
    ] {
        if count > 0 {
            line.push_raw("  ");
            line.push_styled(format!("{count} {label}"), WARNING);
        }
    }
    line
}
