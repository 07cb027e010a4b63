use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::coverage::{
    check_gates, compare_to_baseline, extract_document, read_cobertura_totals, write_cobertura,
    write_rate_changes, CoverageModel, CoverageSnapshot, CoverageSummary, DEFAULT_PACKAGE,
};
use crate::discovery::{find_reports, DEFAULT_PATTERN};
use crate::report::{write_report, ReportOptions};

/// Reports were found and merged
pub const EXIT_OK: i32 = 0;
/// No report was found at the input path
pub const EXIT_NO_REPORTS: i32 = 1;
/// A coverage threshold was not met
pub const EXIT_BELOW_THRESHOLD: i32 = 2;

/// Everything one invocation needs, after flags and config are combined
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub pattern: String,
    pub filter: Option<String>,
    pub report: ReportOptions,
    pub output: Option<PathBuf>,
    pub package: String,
    pub json: Option<PathBuf>,
    pub baseline: Option<PathBuf>,
    pub line_threshold: Option<f64>,
    pub branch_threshold: Option<f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            pattern: DEFAULT_PATTERN.to_string(),
            filter: None,
            report: ReportOptions::default(),
            output: None,
            package: DEFAULT_PACKAGE.to_string(),
            json: None,
            baseline: None,
            line_threshold: None,
            branch_threshold: None,
        }
    }
}

/// Outcome of merging a batch of reports
#[derive(Debug, Default)]
pub struct ProcessedReports {
    pub model: CoverageModel,
    /// Reports that could be read, including ones that broke mid-way
    pub read: usize,
    /// Reports that produced a warning, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

/// Merge `reports` one after another into a fresh model.
///
/// Reports are decoded lossily. A report that cannot be read, or whose
/// markup is partly broken, is reported as a warning and never aborts the
/// batch.
pub fn process_reports(reports: &[PathBuf], filter: Option<&str>) -> ProcessedReports {
    let mut processed = ProcessedReports::default();

    for path in reports {
        // Reports written on Windows may carry Latin-1 text
        let content = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                eprintln!("{} Could not read {}: {}", "Warning:".yellow().bold(), path.display(), e);
                processed.skipped.push((path.clone(), e.to_string()));
                continue;
            }
        };
        processed.read += 1;

        if let Err(e) = extract_document(&content, &mut processed.model, filter) {
            eprintln!(
                "{} Incomplete report {}: {}",
                "Warning:".yellow().bold(),
                path.display(),
                e
            );
            processed.skipped.push((path.clone(), e.to_string()));
        }
    }

    processed
}

pub struct Runner<'a> {
    options: &'a RunOptions,
}

impl<'a> Runner<'a> {
    pub fn new(options: &'a RunOptions) -> Self {
        Self { options }
    }

    /// Run the whole pipeline, writing the console report to `out`.
    ///
    /// Returns the process exit status.
    pub fn run(&self, out: &mut impl Write) -> Result<i32> {
        let options = self.options;

        let reports = find_reports(&options.input, &options.pattern)?;
        if reports.is_empty() {
            writeln!(out, "No coverage files found in {}", options.input.display())?;
            return Ok(EXIT_NO_REPORTS);
        }

        writeln!(out, "Processing {} coverage file(s)...", reports.len())?;
        writeln!(out)?;

        let processed = process_reports(&reports, options.filter.as_deref());
        let summary = CoverageSummary::from_model(&processed.model);

        write_report(&summary, &options.report, out)?;

        if let Some(ref output) = options.output {
            write_cobertura(&processed.model, &options.package, output)?;
            writeln!(out, "\nCobertura XML written to: {}", output.display().to_string().green())?;
        }

        if let Some(ref json) = options.json {
            write_json(&summary, json)?;
            writeln!(out, "JSON summary written to: {}", json.display().to_string().green())?;
        }

        let current = CoverageSnapshot::from(&summary.totals);

        if let Some(ref baseline) = options.baseline {
            let previous = read_cobertura_totals(baseline)?;
            writeln!(out)?;
            write_rate_changes(&compare_to_baseline(&previous, &current), out)?;
        }

        let gates = check_gates(&current, options.line_threshold, options.branch_threshold);
        if !gates.gates.is_empty() {
            writeln!(out)?;
            gates.write_summary(out)?;
            if !gates.passed() {
                return Ok(EXIT_BELOW_THRESHOLD);
            }
        }

        Ok(EXIT_OK)
    }
}

fn write_json(summary: &CoverageSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
