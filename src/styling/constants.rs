//! Style constants and emojis for terminal output
//!
//! Messages use `color-print` tags (`cformat!("<red>...</>")`); tables and
//! other computed output use the `anstyle` constants below.
//!
//! | Semantic | color-print tag | anstyle constant |
//! |----------|-----------------|------------------|
//! | Error | `<red>` | `ERROR` |
//! | Warning | `<yellow>` | `WARNING` |
//! | Hint | `<dim>` | `HINT` |
//! | Main worktree | `<cyan>` | `CYAN` |
//! | Success | `<green>` | `GREEN` |
//! | Secondary | `<bright-black>` | `GRAY` |

use anstyle::{AnsiColor, Color, Style};

pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

pub const HINT: Style = Style::new().dimmed();

pub const CYAN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

pub const GREEN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Gray style for secondary/metadata text (commit hashes, reasons)
pub const GRAY: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));

/// Gutter style for quoted content (git stderr, prune previews)
pub const GUTTER: Style = Style::new().bg_color(Some(Color::Ansi(AnsiColor::BrightWhite)));

// ============================================================================
// Message Emojis
// ============================================================================

/// Success emoji: `cprintln!("{SUCCESS_EMOJI} <green>message</>");`
pub const SUCCESS_EMOJI: &str = "✅";

/// Error emoji: `cprintln!("{ERROR_EMOJI} <red>message</>");`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji: `cprintln!("{WARNING_EMOJI} <yellow>message</>");`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji: `cprintln!("{HINT_EMOJI} <dim>message</>");`
pub const HINT_EMOJI: &str = "💡";

/// Info emoji for neutral status
pub const INFO_EMOJI: &str = "⚪";
