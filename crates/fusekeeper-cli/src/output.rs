//! JSON output helpers for CLI commands.
//!
//! Results go to stdout, one pretty-printed document per command; logs go
//! to stderr so the two never interleave.

use std::io::Write;

use serde::Serialize;

/// Renders a value as pretty-printed JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn render<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

/// Writes a value to stdout as JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = render(value)?;
    std::io::stdout().lock().write_all(rendered.as_bytes())?;
    Ok(())
}
