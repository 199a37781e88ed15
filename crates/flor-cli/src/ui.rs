//! Terminal output.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, Table};
use crossterm::style::Stylize;
use flor_core::Reporter;
use flor_core::batch::BatchReport;

/// Prints status lines with the `>>>>` / `!!!!` prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, msg: &str) {
        println!("{}", format!(">>>> {msg}").cyan());
    }

    fn ok(&self, msg: &str) {
        println!("{}", format!(">>>> {msg}").green());
    }

    fn warn(&self, msg: &str) {
        println!("{}", format!(">>>> {msg}").yellow());
    }

    fn err(&self, msg: &str) {
        eprintln!("{}", format!("!!!! {msg}").red());
    }
}

/// One row per distro: generated, changed and failed counts.
pub fn summary_table(reports: &[BatchReport]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Distro", "Generated", "Changed", "Failed"]);
    for report in reports {
        let failed = report.failed_count();
        let failed_cell = if failed == 0 {
            Cell::new(failed)
        } else {
            Cell::new(failed).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&report.distro),
            Cell::new(format!("{} / {}", report.succeeded, report.total())),
            Cell::new(report.changes.len()),
            failed_cell,
        ]);
    }
    table
}
