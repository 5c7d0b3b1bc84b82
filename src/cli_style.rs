/*!
 * CLI output styling
 *
 * Themed text, status lines and the summary tables printed after an upload
 * or a mover run.
 */

use crate::mover::MoveReport;
use crate::transfer::UploadSummary;
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};

// ============================================================================
// THEME COLORS
// ============================================================================

/// Colors used across CLI output
pub struct Theme;

impl Theme {
    /// Primary accent color (cyan)
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }
}

/// Unicode status icons
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const ARROW_RIGHT: &'static str = "→";
}

// ============================================================================
// TABLES
// ============================================================================

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    let cell = Cell::new(count.to_string());
    if count > 0 {
        cell.fg(color).add_attribute(Attribute::Bold)
    } else {
        cell.fg(Color::DarkGrey)
    }
}

/// Summary table for an upload run
pub fn upload_summary_table(summary: &UploadSummary) -> Table {
    let mut table = create_table();
    table.set_header(vec![header_cell("Upload Summary"), Cell::new("")]);

    table.add_row(vec![
        Cell::new("Batches"),
        Cell::new(summary.batches.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Successful"),
        count_cell(summary.successful, Color::Green),
    ]);
    table.add_row(vec![
        Cell::new("Failed"),
        count_cell(summary.failed, Color::Red),
    ]);
    table.add_row(vec![
        Cell::new("Duration"),
        Cell::new(format_duration(summary.elapsed.as_secs_f64())),
    ]);
    table.add_row(vec![
        Cell::new("Average rate"),
        Cell::new(format_rate(summary.throughput()))
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
    ]);

    table
}

/// Summary table for a mover run, with one row per failed object
pub fn move_report_table(report: &MoveReport) -> Table {
    let mut table = create_table();
    table.set_header(vec![header_cell("Mover Run"), Cell::new("")]);

    table.add_row(vec![
        Cell::new("Listed"),
        Cell::new(report.listed.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Processed"),
        count_cell(report.processed_count, Color::Green),
    ]);
    table.add_row(vec![
        Cell::new("Errors"),
        count_cell(report.error_count, Color::Red),
    ]);
    table.add_row(vec![
        Cell::new("Duration"),
        Cell::new(format_duration(report.elapsed.as_secs_f64())),
    ]);

    for failure in &report.failures {
        table.add_row(vec![
            Cell::new(format!("{} {}", Icons::ERROR, failure.name)).fg(Color::Red),
            Cell::new(format!("{}: {}", failure.stage, failure.error)).fg(Color::DarkGrey),
        ]);
    }

    table
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Format an optional files-per-second rate
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.2} files/s", rate),
        None => "N/A (no time elapsed)".to_string(),
    }
}

/// Format duration into human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours, mins)
    }
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING),
        Theme::warning(message)
    );
}

pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS),
        Theme::success(message)
    );
}

pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO), message);
}
