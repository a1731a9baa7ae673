//! Consolidated styling module for terminal output.
//!
//! Output goes through `anstream`, which drops ANSI codes when the stream is
//! not a terminal or `NO_COLOR` is set. This module adds:
//! - Gutter formatting for quoted git output
//! - Styled string/line types for table rendering

mod constants;

pub use anstream::{eprint, eprintln, println, stderr};
pub use constants::*;

use anstyle::Style;
use unicode_width::UnicodeWidthStr;

fn terminal_width() -> usize {
    if let Some(cols) = std::env::var("COLUMNS").ok().and_then(|c| c.parse().ok()) {
        return cols;
    }
    terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| w as usize)
        .unwrap_or(80)
}

/// Formats text with a gutter (single-space with background color) on each line
///
/// Used for quoted content like git's stderr. Lines longer than the terminal
/// are truncated with `…` rather than wrapped, so paths stay copyable.
///
/// `max_width` is for tests; `None` detects the terminal width.
pub fn format_with_gutter(content: &str, max_width: Option<usize>) -> String {
    let gutter = GUTTER;
    let available = max_width.unwrap_or_else(terminal_width).saturating_sub(2);

    content
        .lines()
        .map(|line| {
            let line = truncate_to_width(line, available);
            format!("{gutter} {gutter:#} {line}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_to_width(line: &str, width: usize) -> String {
    if width == 0 || line.width() <= width {
        return line.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in line.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

// ============================================================================
// Styled Output Types
// ============================================================================

/// A piece of text with an optional style
#[derive(Clone, Debug)]
pub struct StyledString {
    pub text: String,
    pub style: Option<Style>,
}

impl StyledString {
    pub fn new(text: impl Into<String>, style: Option<Style>) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self::new(text, Some(style))
    }

    /// Returns the visual width (unicode-aware, no ANSI codes)
    pub fn width(&self) -> usize {
        self.text.width()
    }

    /// Renders to a string with ANSI escape codes
    pub fn render(&self) -> String {
        if let Some(style) = &self.style {
            format!("{}{}{}", style.render(), self.text, style.render_reset())
        } else {
            self.text.clone()
        }
    }
}

/// A line composed of multiple styled strings
#[derive(Clone, Debug, Default)]
pub struct StyledLine {
    pub segments: Vec<StyledString>,
}

impl StyledLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw (unstyled) segment
    pub fn push_raw(&mut self, text: impl Into<String>) {
        self.segments.push(StyledString::raw(text));
    }

    /// Add a styled segment
    pub fn push_styled(&mut self, text: impl Into<String>, style: Style) {
        self.segments.push(StyledString::styled(text, style));
    }

    /// Pad with spaces to reach a specific width
    pub fn pad_to(&mut self, target_width: usize) {
        let current_width = self.width();
        if current_width < target_width {
            self.push_raw(" ".repeat(target_width - current_width));
        }
    }

    /// Returns the total visual width
    pub fn width(&self) -> usize {
        self.segments.iter().map(|s| s.width()).sum()
    }

    /// Renders the entire line with ANSI escape codes
    pub fn render(&self) -> String {
        self.segments.iter().map(|s| s.render()).collect()
    }
}
