//! Output formatting and styling module.
//!
//! All status text goes through [`OutputFormatter`] so the look of the
//! line-oriented progress log can be changed in one place. The text is meant
//! for people; nothing should parse it.

use colored::*;
use std::io::{self, Write};

/// Prints status lines with consistent styling.
///
/// - Success messages (green with ✓)
/// - Failure messages (red with ✗, part of the progress log)
/// - Error messages (red with ✗, on stderr)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use datetidy::output::OutputFormatter;
    /// OutputFormatter::success("moved");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints a per-file or per-directory failure in red with an X mark.
    ///
    /// Goes to stdout along with the rest of the progress log.
    pub fn failure(message: &str) {
        let _ = Self::write_failure(&mut io::stdout().lock(), message);
    }

    /// Writes the failure line for `message` to `out`.
    pub fn write_failure<W: Write>(out: &mut W, message: &str) -> io::Result<()> {
        writeln!(out, "{} {}", "✗".red(), message)
    }

    /// Prints a run-level error message in red with an X mark, on stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints a summary table of how many files ended up in each disposition.
    ///
    /// Rows with a zero count are left out.
    ///
    /// ```no_run
    /// use datetidy::output::OutputFormatter;
    ///
    /// OutputFormatter::summary_table(&[("moved", 12), ("merged", 3), ("failed", 0)]);
    /// ```
    pub fn summary_table(rows: &[(&str, usize)]) {
        Self::header("SUMMARY");

        let rows: Vec<_> = rows.iter().filter(|(_, count)| *count > 0).collect();
        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max("Outcome".len());

        println!(
            "{:<width$} | {}",
            "Outcome".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        let mut total: usize = 0;
        for (name, count) in &rows {
            total += count;
            let colored_count = if *name == "failed" {
                count.to_string().red()
            } else {
                count.to_string().green()
            };
            println!("{:<width$} | {}", name, colored_count, width = width);
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().bold(),
            if total == 1 { "file" } else { "files" },
            width = width
        );
    }
}
