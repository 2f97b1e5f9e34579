//! Styling for terminal output.
//!
//! Styles are written inline as `{ERROR}text{ERROR:#}` and printed through
//! anstream, which drops the escape codes when stdout is not a color-capable
//! terminal (and honors `NO_COLOR` / `CLICOLOR_FORCE`).

use anstyle::{AnsiColor, Color, Style};
use unicode_width::UnicodeWidthStr;

/// Auto-detecting println that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::println;

/// Auto-detecting eprintln that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::eprintln;

/// Auto-detecting print that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::print;

/// Error style (red) - use as `{ERROR}text{ERROR:#}`
pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Warning style (yellow), also used for dirty working trees
pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Success style (green), also used for clean working trees
pub const SUCCESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Hint style (dimmed), used for folders and unavailable fields
pub const HINT: Style = Style::new().dimmed();

/// Table header and section titles
pub const HEADER: Style = Style::new().bold();

/// Progress lines during a fetch sweep
pub const PROGRESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

/// Display width of `text` in terminal columns.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Cut `text` to at most `width` terminal columns.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if display_width(text) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Pad `text` with spaces to `width` terminal columns.
pub fn pad_to_width(text: &str, width: usize) -> String {
    let w = display_width(text);
    if w >= width {
        return text.to_string();
    }
    format!("{text}{}", " ".repeat(width - w))
}
