//! Terminal color constants and utilities for CLI output.

use std::io::{self, Write};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RED: &str = "\x1b[31m";

/// Flush stdout so generated code written without a trailing status line
/// reaches a pipe before the next stderr report.
#[inline]
pub fn flush_stdout() {
    io::stdout().flush().ok();
}
