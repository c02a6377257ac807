//! Result aggregation and console reporting

use std::path::Path;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::E2eResult;
use crate::runner::{StepResult, StepStatus};

/// Per-status counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub warned: usize,
}

impl Counts {
    fn add(&mut self, status: StepStatus) {
        self.total += 1;
        match status {
            StepStatus::Pass => self.passed += 1,
            StepStatus::Fail => self.failed += 1,
            StepStatus::Skip => self.skipped += 1,
            StepStatus::Warn => self.warned += 1,
        }
    }
}

/// Aggregate view of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub counts: Counts,
    /// Counts per module label, in order of first appearance
    pub modules: Vec<(String, Counts)>,
    pub average_duration_ms: f64,
}

impl Summary {
    pub fn from_results(results: &[StepResult]) -> Self {
        let mut counts = Counts::default();
        let mut modules: Vec<(String, Counts)> = Vec::new();

        for result in results {
            counts.add(result.status);
            match modules.iter_mut().find(|(name, _)| *name == result.module) {
                Some((_, module)) => module.add(result.status),
                None => {
                    let mut module = Counts::default();
                    module.add(result.status);
                    modules.push((result.module.clone(), module));
                }
            }
        }

        let average_duration_ms = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.duration_ms as f64).sum::<f64>() / results.len() as f64
        };

        Self {
            counts,
            modules,
            average_duration_ms,
        }
    }

    /// 1 iff at least one step failed; SKIP and WARN never affect it
    pub fn exit_code(&self) -> i32 {
        if self.counts.failed > 0 {
            1
        } else {
            0
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a Summary,
    results: &'a [StepResult],
}

/// Write `{ summary, results }` as pretty JSON
pub fn write_json(path: &Path, summary: &Summary, results: &[StepResult]) -> E2eResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&JsonReport { summary, results })?;
    std::fs::write(path, json)?;
    info!("Report written to: {}", path.display());
    Ok(())
}

pub fn print_section(module: &str) {
    println!();
    println!("{}", format!("▶ {}", module).bold());
}

/// Print the live status line for a finished step
pub fn print_step(result: &StepResult) {
    let timing = format!("({} ms)", result.duration_ms).dimmed();
    let message = result.message.as_deref().unwrap_or("");
    match result.status {
        StepStatus::Pass => println!("  ✅ {} {}", result.name, timing),
        StepStatus::Warn => println!("  ⚠️  {} {} {}", result.name, timing, message.yellow()),
        StepStatus::Skip => println!("  ⏭️  {} {} {}", result.name, timing, message.cyan()),
        StepStatus::Fail => println!("  ❌ {} {} {}", result.name, timing, message.red()),
    }
}

/// Print grouped counts, then every warning and failure
pub fn print_summary(summary: &Summary, results: &[StepResult]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Module", "Total", "Pass", "Fail", "Skip", "Warn"]);

    for (module, counts) in &summary.modules {
        table.add_row(counts_row(module, counts));
    }
    table.add_row(counts_row("TOTAL", &summary.counts));

    println!();
    println!("{}", "Summary".bold());
    println!("{table}");

    print_listing("Warnings", StepStatus::Warn, results);
    print_listing("Failures", StepStatus::Fail, results);

    println!();
    println!("Average step duration: {:.1} ms", summary.average_duration_ms);
    if summary.exit_code() == 0 {
        println!("{}", "✅ No failed steps".green().bold());
    } else {
        println!(
            "{}",
            format!("❌ {} step(s) failed", summary.counts.failed).red().bold()
        );
    }
}

fn counts_row(label: &str, counts: &Counts) -> Vec<Cell> {
    vec![
        Cell::new(label),
        Cell::new(counts.total),
        Cell::new(counts.passed),
        Cell::new(counts.failed),
        Cell::new(counts.skipped),
        Cell::new(counts.warned),
    ]
}

fn print_listing(title: &str, status: StepStatus, results: &[StepResult]) {
    let matching: Vec<&StepResult> = results.iter().filter(|r| r.status == status).collect();
    if matching.is_empty() {
        return;
    }

    println!();
    println!("{} ({}):", title.bold(), matching.len());
    for result in matching {
        println!(
            "  - {} / {}: {}",
            result.module,
            result.name,
            result.message.as_deref().unwrap_or("no message")
        );
    }
}

/// Print the terminal diagnostic for an aborted run
pub fn print_abort(reason: &str) {
    eprintln!();
    eprintln!("{}", format!("🛑 {}", reason).red().bold());
}
