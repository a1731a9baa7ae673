//! Parsers for git's porcelain output formats.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{StatusSummary, WorktreeRecord};

static STATUS_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^## (?P<branch>.+?)(?:\.\.\.(?P<upstream>\S+))?(?: \[(?P<track>[^\]]*)\])?$")
        .expect("valid status header regex")
});

static AHEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"ahead (\d+)").expect("valid regex"));

static BEHIND: Lazy<Regex> = Lazy::new(|| Regex::new(r"behind (\d+)").expect("valid regex"));

/// Parse `git worktree list --porcelain`.
///
/// Blocks are separated by blank lines. A block needs both `worktree` and
/// `HEAD` to be kept, except a `bare` block, which git prints without `HEAD`.
/// Malformed blocks are dropped and parsing continues.
///
/// The main worktree is the first `bare` block if there is one, otherwise the
/// first kept block (git always lists the main worktree first).
pub fn parse_worktree_list(output: &str) -> Vec<WorktreeRecord> {
    let mut records = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                records.extend(parse_worktree_block(&block));
                block.clear();
            }
        } else {
            block.push(line);
        }
    }
    if !block.is_empty() {
        records.extend(parse_worktree_block(&block));
    }

    let main_index = records
        .iter()
        .position(|r| r.bare)
        .or(if records.is_empty() { None } else { Some(0) });
    if let Some(index) = main_index {
        records[index].is_main = true;
    }

    records
}

fn parse_worktree_block(lines: &[&str]) -> Option<WorktreeRecord> {
    let mut path: Option<PathBuf> = None;
    let mut head: Option<String> = None;
    let mut record = WorktreeRecord::default();

    for line in lines {
        let line = line.trim_end();
        let (key, value) = match line.split_once(' ') {
            Some((key, value)) => (key, Some(value)),
            None => (line, None),
        };

        match key {
            "worktree" => path = value.map(PathBuf::from),
            "HEAD" => head = value.map(str::to_string),
            "branch" => {
                record.branch = value.map(|v| v.strip_prefix("refs/heads/").unwrap_or(v).to_string())
            }
            "detached" => record.detached = true,
            "bare" => record.bare = true,
            "locked" => {
                record.locked = true;
                record.lock_reason = non_empty(value);
            }
            "prunable" => {
                record.prunable = true;
                record.prunable_reason = non_empty(value);
            }
            _ => log::trace!("Ignoring unknown porcelain line: {line}"),
        }
    }

    let Some(path) = path else {
        log::debug!("Dropping worktree block without a path: {lines:?}");
        return None;
    };
    match head {
        Some(head) => record.head = head,
        None if record.bare => {}
        None => {
            log::debug!("Dropping worktree block without HEAD: {lines:?}");
            return None;
        }
    }

    record.path = path;
    if record.detached {
        record.branch = None;
    } else if record.branch.is_none() && !record.bare {
        // No `branch` line and no `detached` marker: treat as detached
        record.detached = true;
    }

    Some(record)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse the report of `git worktree prune --verbose`, one entry per line.
///
/// Lines read `Removing worktrees/<id>: <reason>`; the `Removing ` prefix is
/// dropped. Other lines are kept whole so nothing git reports goes unseen.
pub fn parse_prune_report(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_prefix("Removing ").unwrap_or(line).to_string())
        .collect()
}

/// Parse `git status --porcelain -b`.
///
/// The `## ` header carries branch, upstream and ahead/behind counts. Each
/// file line starts with a two-character `XY` code: `X` (index) counts toward
/// `staged`, `Y` (worktree) toward `modified`, and `??` only toward
/// `untracked`. Ignored (`!!`) entries are not counted.
pub fn parse_status(output: &str) -> StatusSummary {
    let mut summary = StatusSummary::default();

    for line in output.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            parse_status_header(header, line, &mut summary);
            continue;
        }

        let bytes = line.as_bytes();
        if bytes.len() < 2 {
            continue;
        }
        let (x, y) = (bytes[0], bytes[1]);
        match (x, y) {
            (b'?', b'?') => summary.untracked += 1,
            (b'!', b'!') => {}
            _ => {
                if x != b' ' && x != b'?' {
                    summary.staged += 1;
                }
                if y != b' ' && y != b'?' {
                    summary.modified += 1;
                }
            }
        }
    }

    summary
}

fn parse_status_header(header: &str, line: &str, summary: &mut StatusSummary) {
    // Unborn branches: "No commits yet on main" (older git: "Initial commit on main")
    for prefix in ["No commits yet on ", "Initial commit on "] {
        if let Some(branch) = header.strip_prefix(prefix) {
            summary.branch = branch.trim().to_string();
            return;
        }
    }

    if header.starts_with("HEAD (no branch)") {
        summary.branch = "HEAD".to_string();
        return;
    }

    let Some(caps) = STATUS_HEADER.captures(line) else {
        summary.branch = header.trim().to_string();
        return;
    };

    summary.branch = caps["branch"].to_string();
    summary.upstream = caps.name("upstream").map(|m| m.as_str().to_string());

    if let Some(track) = caps.name("track") {
        let track = track.as_str();
        summary.ahead = capture_count(&AHEAD, track);
        summary.behind = capture_count(&BEHIND, track);
    }
}

fn capture_count(re: &Regex, text: &str) -> u32 {
    re.captures(text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}
