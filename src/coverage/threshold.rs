//! Minimum-coverage gates and baseline comparison

use colored::Colorize;
use std::io::{self, Write};

use super::AggregateStats;

/// Headline coverage numbers of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageSnapshot {
    pub line_coverage: Option<f64>,
    pub branch_coverage: Option<f64>,
    pub lines_covered: u64,
    pub lines_total: u64,
    pub branches_covered: u64,
    pub branches_total: u64,
}

impl From<&AggregateStats> for CoverageSnapshot {
    fn from(totals: &AggregateStats) -> Self {
        Self {
            line_coverage: Some(totals.line_rate),
            branch_coverage: Some(totals.branch_rate),
            lines_covered: totals.lines_covered,
            lines_total: totals.lines,
            branches_covered: totals.branches_executed,
            branches_total: totals.branches,
        }
    }
}

/// Rate a gate or comparison looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Lines,
    Branches,
}

impl Metric {
    fn label(self) -> &'static str {
        match self {
            Metric::Lines => "Line coverage",
            Metric::Branches => "Branch coverage",
        }
    }

    fn rate(self, snapshot: &CoverageSnapshot) -> Option<f64> {
        match self {
            Metric::Lines => snapshot.line_coverage,
            Metric::Branches => snapshot.branch_coverage,
        }
    }
}

/// One configured minimum and the rate it was checked against
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub metric: Metric,
    pub rate: f64,
    pub minimum: f64,
}

impl Gate {
    pub fn passed(&self) -> bool {
        self.rate >= self.minimum
    }
}

/// Every gate checked for a run; empty when no minimum is configured
#[derive(Debug, Clone, Default)]
pub struct GateReport {
    pub gates: Vec<Gate>,
}

impl GateReport {
    pub fn passed(&self) -> bool {
        self.gates.iter().all(Gate::passed)
    }

    pub fn write_summary(&self, out: &mut impl Write) -> io::Result<()> {
        for gate in &self.gates {
            if gate.passed() {
                writeln!(
                    out,
                    "  {} {} {:.1}% (minimum {:.1}%)",
                    "✓".green(),
                    gate.metric.label(),
                    gate.rate,
                    gate.minimum
                )?;
            } else {
                let shortfall = format!("short by {:.1}%", gate.minimum - gate.rate);
                writeln!(
                    out,
                    "  {} {} {:.1}% (minimum {:.1}%, {})",
                    "✗".red(),
                    gate.metric.label(),
                    gate.rate,
                    gate.minimum,
                    shortfall.red()
                )?;
            }
        }
        Ok(())
    }
}

/// Check the run against the configured minimum line and branch rates
pub fn check_gates(current: &CoverageSnapshot, line_minimum: Option<f64>, branch_minimum: Option<f64>) -> GateReport {
    let gates = [(Metric::Lines, line_minimum), (Metric::Branches, branch_minimum)]
        .into_iter()
        .filter_map(|(metric, minimum)| {
            Some(Gate {
                metric,
                rate: metric.rate(current)?,
                minimum: minimum?,
            })
        })
        .collect();

    GateReport { gates }
}

/// Change of one rate since the baseline run
#[derive(Debug, Clone, PartialEq)]
pub struct RateChange {
    pub metric: Metric,
    pub before: f64,
    pub after: f64,
}

impl RateChange {
    pub fn delta(&self) -> f64 {
        self.after - self.before
    }
}

/// Rate changes for every metric present in both runs
pub fn compare_to_baseline(baseline: &CoverageSnapshot, current: &CoverageSnapshot) -> Vec<RateChange> {
    [Metric::Lines, Metric::Branches]
        .into_iter()
        .filter_map(|metric| {
            Some(RateChange {
                metric,
                before: metric.rate(baseline)?,
                after: metric.rate(current)?,
            })
        })
        .collect()
}

pub fn write_rate_changes(changes: &[RateChange], out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Compared to baseline:")?;
    for change in changes {
        let delta = change.delta();
        let (arrow, shown) = if delta > 0.0 {
            ("↑".green(), format!("+{:.1}%", delta).green())
        } else if delta < 0.0 {
            ("↓".red(), format!("{:.1}%", delta).red())
        } else {
            ("→".dimmed(), "±0.0%".dimmed())
        };
        writeln!(
            out,
            "  {} {} {:.1}% → {:.1}% ({})",
            arrow,
            change.metric.label(),
            change.before,
            change.after,
            shown
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(line: f64, branch: f64) -> CoverageSnapshot {
        CoverageSnapshot {
            line_coverage: Some(line),
            branch_coverage: Some(branch),
            ..Default::default()
        }
    }

    fn text(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        colored::control::set_override(false);
        let mut out = Vec::new();
        write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_gates() {
        let current = snapshot(75.0, 50.0);

        assert!(check_gates(&current, Some(70.0), Some(40.0)).passed());
        assert!(!check_gates(&current, Some(80.0), Some(40.0)).passed());
        assert!(check_gates(&current, Some(75.0), None).passed());

        let none = check_gates(&current, None, None);
        assert!(none.gates.is_empty());
        assert!(none.passed());
    }

    #[test]
    fn test_gate_summary() {
        let report = check_gates(&snapshot(75.0, 50.0), Some(80.0), Some(50.0));
        let output = text(|out| report.write_summary(out));

        assert!(output.contains("✗ Line coverage 75.0% (minimum 80.0%, short by 5.0%)"));
        assert!(output.contains("✓ Branch coverage 50.0% (minimum 50.0%)"));
    }

    #[test]
    fn test_compare_to_baseline() {
        let baseline = CoverageSnapshot {
            line_coverage: Some(70.0),
            branch_coverage: None,
            ..Default::default()
        };
        let changes = compare_to_baseline(&baseline, &snapshot(75.0, 55.0));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].metric, Metric::Lines);
        assert!((changes[0].delta() - 5.0).abs() < 0.001);

        let output = text(|out| write_rate_changes(&changes, out));
        assert!(output.contains("↑ Line coverage 70.0% → 75.0% (+5.0%)"));
        assert!(!output.contains("Branch"));
    }

    #[test]
    fn test_unchanged_rate() {
        let changes = compare_to_baseline(&snapshot(60.0, 10.0), &snapshot(60.0, 5.0));
        let output = text(|out| write_rate_changes(&changes, out));

        assert!(output.contains("→ Line coverage 60.0% → 60.0% (±0.0%)"));
        assert!(output.contains("↓ Branch coverage 10.0% → 5.0% (-5.0%)"));
    }

    #[test]
    fn test_snapshot_from_totals() {
        let totals = AggregateStats {
            lines: 10,
            lines_covered: 4,
            line_rate: 40.0,
            ..Default::default()
        };

        let snapshot = CoverageSnapshot::from(&totals);
        assert_eq!(snapshot.line_coverage, Some(40.0));
        assert_eq!(snapshot.lines_total, 10);
        assert_eq!(snapshot.branch_coverage, Some(0.0));
    }
}
