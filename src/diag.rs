//! Diagnostics rendering
//!
//! A `Reporter` owns the source text split into 1-indexed lines and
//! renders each error as a colored label, the message, and the offending
//! line flanked by its predecessor and successor. Pipeline stages
//! accumulate their errors; the CLI feeds them through one reporter per
//! stage and halts when a stage reported anything.

use std::fmt::Display;

const RED: &str = "\x1b[1;31m";
const YELLOW: &str = "\x1b[1;33m";
const RESET: &str = "\x1b[0m";

pub struct Reporter {
    label: &'static str,
    lines: Vec<String>,
    count: usize,
}

impl Reporter {
    /// `label` is the user-visible error class: "Lexer Error", "Error" or
    /// "Type Error".
    pub fn new(source: &str, label: &'static str) -> Self {
        Self {
            label,
            lines: source.lines().map(str::to_owned).collect(),
            count: 0,
        }
    }

    /// Render one error with its surrounding source context.
    pub fn report(&mut self, message: impl Display, line: u32) {
        eprintln!("{}{}:{} {}", RED, self.label, RESET, message);
        self.show_context(line);
        self.count += 1;
    }

    fn show_context(&self, line: u32) {
        let line = line as usize;
        if line < 1 || line > self.lines.len() {
            return;
        }
        let idx = line - 1;

        if idx > 0 {
            eprintln!("  {} | {}", idx, self.lines[idx - 1]);
        }
        eprintln!("{}> {} | {}{}", YELLOW, line, self.lines[idx], RESET);
        if idx + 1 < self.lines.len() {
            eprintln!("  {} | {}", idx + 2, self.lines[idx + 1]);
        }
        eprintln!();
    }

    pub fn error_count(&self) -> usize {
        self.count
    }

    pub fn has_errors(&self) -> bool {
        self.count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_reports() {
        let mut reporter = Reporter::new("local x = 1\nlocal y = 2\n", "Type Error");
        assert!(!reporter.has_errors());
        reporter.report("something went wrong", 2);
        reporter.report("something else went wrong", 1);
        assert_eq!(reporter.error_count(), 2);
    }

    #[test]
    fn test_out_of_range_line_is_harmless() {
        let mut reporter = Reporter::new("only line", "Error");
        reporter.report("mystery", 99);
        assert_eq!(reporter.error_count(), 1);
    }
}
