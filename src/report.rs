use colored::{Color, Colorize};
use std::io::{self, Write};

use crate::coverage::CoverageSummary;

pub const DEFAULT_PATH_WIDTH: usize = 58;
pub const DEFAULT_BAR_WIDTH: usize = 50;

const REPORT_TITLE: &str = "WinCC OA Code Coverage Report";
const RULE_WIDTH: usize = 80;

/// Layout of the console report
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Print the per-file table before the summary
    pub verbose: bool,
    /// Characters available for a path in the per-file table
    pub path_width: usize,
    /// Cells in the coverage bar
    pub bar_width: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            path_width: DEFAULT_PATH_WIDTH,
            bar_width: DEFAULT_BAR_WIDTH,
        }
    }
}

/// Fit `path` into `width` characters, keeping the tail behind a `...` marker
pub fn shorten_path(path: &str, width: usize) -> String {
    let length = path.chars().count();
    if length <= width {
        return path.to_string();
    }
    let keep = width.saturating_sub(3);
    let tail: String = path.chars().skip(length - keep).collect();
    format!("...{}", tail)
}

/// Bar of `width` cells, filled in proportion to `rate` (a percentage)
pub fn coverage_bar(rate: f64, width: usize) -> String {
    let filled = ((width as f64) * rate / 100.0).round().clamp(0.0, width as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn rate_color(rate: f64) -> Color {
    if rate >= 80.0 {
        Color::Green
    } else if rate >= 50.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Write the console report and return the overall line coverage percentage
pub fn write_report(summary: &CoverageSummary, options: &ReportOptions, out: &mut impl Write) -> io::Result<f64> {
    let rule = "=".repeat(RULE_WIDTH);
    let column = options.path_width + 2;

    writeln!(out, "{}", rule)?;
    writeln!(out, "{}", REPORT_TITLE.bold().cyan())?;
    writeln!(out, "{}", rule)?;
    writeln!(out)?;

    if options.verbose {
        writeln!(out, "{:<column$} {:>8} {:>8} {:>7}", "File", "Lines", "Cover", "Rate")?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        for stat in &summary.files {
            let rate = format!("{:>6.1}%", stat.line_rate).color(rate_color(stat.line_rate));
            writeln!(
                out,
                "{:<column$} {:>8} {:>8} {}",
                shorten_path(&stat.path, options.path_width),
                stat.lines,
                stat.lines_covered,
                rate
            )?;
        }
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        writeln!(out)?;
    }

    let totals = &summary.totals;
    writeln!(out, "{}", "SUMMARY".bold())?;
    writeln!(out, "{}", "-".repeat(40))?;
    writeln!(out, "Files:     {:>6}", totals.files)?;
    writeln!(
        out,
        "Lines:     {:>6} / {:<6} ({:.1}%)",
        totals.lines_covered, totals.lines, totals.line_rate
    )?;
    writeln!(
        out,
        "Functions: {:>6} / {:<6} ({:.1}%)",
        totals.functions_covered, totals.functions, totals.function_rate
    )?;
    writeln!(
        out,
        "Branches:  {:>6} / {:<6} ({:.1}%)",
        totals.branches_executed, totals.branches, totals.branch_rate
    )?;
    writeln!(out)?;

    let bar = coverage_bar(totals.line_rate, options.bar_width).color(rate_color(totals.line_rate));
    writeln!(out, "Coverage: [{}] {:.1}%", bar, totals.line_rate)?;
    writeln!(out, "{}", rule)?;

    Ok(totals.line_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{BranchTally, CoverageModel};

    fn render(summary: &CoverageSummary, options: &ReportOptions) -> (String, f64) {
        colored::control::set_override(false);
        let mut out = Vec::new();
        let rate = write_report(summary, options, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), rate)
    }

    #[test]
    fn test_shorten_path() {
        assert_eq!(shorten_path("scripts/foo.ctl", 58), "scripts/foo.ctl");

        let long = format!("{}/foo.ctl", "a".repeat(70));
        let short = shorten_path(&long, 58);
        assert_eq!(short.chars().count(), 58);
        assert!(short.starts_with("..."));
        assert!(short.ends_with("/foo.ctl"));

        assert_eq!(shorten_path("abcdef", 5), "...ef");
    }

    #[test]
    fn test_coverage_bar() {
        assert_eq!(coverage_bar(0.0, 10), "░".repeat(10));
        assert_eq!(coverage_bar(100.0, 10), "█".repeat(10));
        assert_eq!(coverage_bar(50.0, 50).chars().filter(|&c| c == '█').count(), 25);
        // 10 * 0.66 = 6.6 rounds to 7
        assert_eq!(coverage_bar(66.0, 10).chars().filter(|&c| c == '█').count(), 7);
    }

    #[test]
    fn test_summary_block() {
        let mut model = CoverageModel::new();
        {
            let foo = model.file_mut("scripts/foo.ctl");
            foo.record_line(1, 1);
            foo.record_line(2, 0);
            foo.record_function("main", 1);
            foo.record_branches(BranchTally { total: 10, executed: 5 });
        }
        let summary = CoverageSummary::from_model(&model);

        let (text, rate) = render(&summary, &ReportOptions::default());

        assert!((rate - 50.0).abs() < 0.001);
        assert!(text.contains(REPORT_TITLE));
        assert!(text.contains("Files:          1"));
        assert!(text.contains("Lines:          1 / 2      (50.0%)"));
        assert!(text.contains("Functions:      1 / 1      (100.0%)"));
        assert!(text.contains("Branches:       5 / 10     (50.0%)"));
        assert!(text.contains(&format!("[{}] 50.0%", coverage_bar(50.0, 50))));
        assert!(!text.contains("File "));
    }

    #[test]
    fn test_verbose_table_is_sorted() {
        let mut model = CoverageModel::new();
        model.file_mut("zeta.ctl").record_line(1, 1);
        model.file_mut("alpha.ctl").record_line(1, 0);
        let summary = CoverageSummary::from_model(&model);

        let options = ReportOptions {
            verbose: true,
            ..Default::default()
        };
        let (text, rate) = render(&summary, &options);

        assert!((rate - 50.0).abs() < 0.001);
        let alpha = text.find("alpha.ctl").unwrap();
        let zeta = text.find("zeta.ctl").unwrap();
        assert!(alpha < zeta);
        assert!(text.contains(&format!("{:<60} {:>8} {:>8} {:>6.1}%", "zeta.ctl", 1, 1, 100.0)));
    }

    #[test]
    fn test_empty_summary() {
        let (text, rate) = render(&CoverageSummary::default(), &ReportOptions::default());

        assert_eq!(rate, 0.0);
        assert!(text.contains("Lines:          0 / 0      (0.0%)"));
    }
}
