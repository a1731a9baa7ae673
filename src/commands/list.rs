use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;
use worktree_hub::git::{StatusSummary, WorktreeRecord};
use worktree_hub::path::format_path_for_display;
use worktree_hub::refresh::RefreshController;
use worktree_hub::styling::{
    CYAN, GRAY, GREEN, StyledLine, WARNING, WARNING_EMOJI, eprintln, format_with_gutter, println,
};

use super::Context;
use crate::OutputFormat;

#[derive(Serialize)]
struct ListOutput<'a> {
    worktrees: Vec<ListItem<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    branches: Vec<String>,
}

#[derive(Serialize)]
struct ListItem<'a> {
    #[serde(flatten)]
    worktree: &'a WorktreeRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<StatusSummary>,
}

pub fn handle_list(ctx: &Context, format: OutputFormat, branches: bool) -> anyhow::Result<()> {
    let controller =
        RefreshController::from_settings(Arc::new(ctx.repo.clone()), &ctx.settings);
    controller.start();
    let snapshot = controller.snapshot();

    for (root, error) in &snapshot.unavailable {
        let root = format_path_for_display(root);
        eprintln!("{WARNING_EMOJI} {WARNING}Could not list worktrees in {root}{WARNING:#}");
        if let Some(stderr) = error.stderr() {
            eprintln!("{}", format_with_gutter(stderr, None));
        }
    }
    if snapshot.worktrees.is_empty()
        && let Some((_, error)) = snapshot.unavailable.first()
    {
        return Err(error.clone().into());
    }

    let statuses: Vec<Option<StatusSummary>> = snapshot
        .worktrees
        .iter()
        .map(|wt| {
            if wt.bare || wt.prunable {
                return None;
            }
            // Status is decoration; a failure just leaves the column empty
            ctx.repo
                .status(&wt.path)
                .inspect_err(|e| log::debug!("No status for {}: {e:?}", wt.path.display()))
                .ok()
        })
        .collect();

    let extra_branches = if branches {
        let checked_out: HashSet<&str> = snapshot
            .worktrees
            .iter()
            .filter_map(|wt| wt.branch.as_deref())
            .collect();
        ctx.repo
            .local_branches()?
            .into_iter()
            .filter(|b| !checked_out.contains(b.as_str()))
            .collect()
    } else {
        Vec::new()
    };

    match format {
        OutputFormat::Json => {
            let output = ListOutput {
                worktrees: snapshot
                    .worktrees
                    .iter()
                    .zip(statuses)
                    .map(|(worktree, status)| ListItem { worktree, status })
                    .collect(),
                branches: extra_branches,
            };
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialize to JSON")?;
            println!("{json}");
        }
        OutputFormat::Table => {
            for line in render_table(&snapshot.worktrees, &statuses, &extra_branches) {
                println!("{}", line.render());
            }
        }
    }

    Ok(())
}

/// One line per worktree (plus branches without one), columns aligned.
fn render_table(
    worktrees: &[WorktreeRecord],
    statuses: &[Option<StatusSummary>],
    extra_branches: &[String],
) -> Vec<StyledLine> {
    let mut rows: Vec<[StyledLine; 4]> = Vec::new();

    for (wt, status) in worktrees.iter().zip(statuses) {
        let mut branch = StyledLine::new();
        match (&wt.branch, wt.bare) {
            (_, true) => branch.push_styled("(bare)", GRAY),
            (Some(name), _) if wt.is_main => branch.push_styled(name.clone(), CYAN),
            (Some(name), _) => branch.push_raw(name.clone()),
            (None, _) => branch.push_styled("(detached)", GRAY),
        }

        let mut path = StyledLine::new();
        path.push_raw(format_path_for_display(&wt.path));

        let mut head = StyledLine::new();
        head.push_styled(wt.short_head().to_string(), GRAY);

        let mut state = StyledLine::new();
        if let Some(status) = status {
            push_status(&mut state, status);
        }
        if wt.locked {
            let label = match &wt.lock_reason {
                Some(reason) => format!("locked: {reason}"),
                None => "locked".to_string(),
            };
            push_flag(&mut state, label, WARNING);
        }
        if wt.prunable {
            push_flag(&mut state, "prunable".to_string(), WARNING);
        }

        rows.push([branch, path, head, state]);
    }

    for name in extra_branches {
        let mut branch = StyledLine::new();
        branch.push_styled(name.clone(), GRAY);
        rows.push([branch, StyledLine::new(), StyledLine::new(), StyledLine::new()]);
    }

    let mut widths = [0usize; 3];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.width());
        }
    }

    rows.into_iter()
        .map(|row| {
            let mut line = StyledLine::new();
            let mut offset = 0;
            for (i, cell) in row.into_iter().enumerate() {
                if i > 0 {
                    line.pad_to(offset);
                    line.push_raw("  ");
                    offset += 2;
                }
                line.segments.extend(cell.segments);
                if let Some(width) = widths.get(i) {
                    offset += width;
                }
            }
            line
        })
        .collect()
}

fn push_status(line: &mut StyledLine, status: &StatusSummary) {
    if status.ahead > 0 {
        push_flag(line, format!("↑{}", status.ahead), GREEN);
    }
    if status.behind > 0 {
        push_flag(line, format!("↓{}", status.behind), GRAY);
    }
    if status.is_dirty() {
        let changed = status.staged + status.modified + status.untracked;
        push_flag(line, format!("±{changed}"), WARNING);
    }
}

fn push_flag(line: &mut StyledLine, text: String, style: anstyle::Style) {
    if line.width() > 0 {
        line.push_raw(" ");
    }
    line.push_styled(text, style);
}
