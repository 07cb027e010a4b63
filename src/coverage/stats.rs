//! Coverage statistics derived from a merged model

use serde::Serialize;

use super::{CoverageModel, FileRecord};

/// Percentage of `covered` over `total`, 0 when nothing was measured
pub fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (covered as f64 / total as f64) * 100.0
}

/// Statistics for a single file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileStat {
    pub path: String,
    pub lines: u64,
    pub lines_covered: u64,
    pub line_rate: f64,
    pub functions: u64,
    pub functions_covered: u64,
    pub function_rate: f64,
    pub branches: u64,
    pub branches_executed: u64,
    pub branch_rate: f64,
}

impl FileStat {
    pub fn from_record(path: &str, record: &FileRecord) -> Self {
        let lines = record.lines.len() as u64;
        let lines_covered = record.lines.values().filter(|&&hits| hits > 0).count() as u64;
        let functions = record.functions.len() as u64;
        let functions_covered = record.functions.values().filter(|&&count| count > 0).count() as u64;

        Self {
            path: path.to_string(),
            lines,
            lines_covered,
            line_rate: percentage(lines_covered, lines),
            functions,
            functions_covered,
            function_rate: percentage(functions_covered, functions),
            branches: record.branches.total,
            branches_executed: record.branches.executed,
            branch_rate: percentage(record.branches.executed, record.branches.total),
        }
    }
}

/// Totals across every file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub files: usize,
    pub lines: u64,
    pub lines_covered: u64,
    pub line_rate: f64,
    pub functions: u64,
    pub functions_covered: u64,
    pub function_rate: f64,
    pub branches: u64,
    pub branches_executed: u64,
    pub branch_rate: f64,
}

/// Per-file statistics, sorted by path, plus their totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub totals: AggregateStats,
    pub files: Vec<FileStat>,
}

impl CoverageSummary {
    pub fn from_model(model: &CoverageModel) -> Self {
        let files: Vec<FileStat> = model
            .files()
            .map(|(path, record)| FileStat::from_record(path, record))
            .collect();

        let mut totals = AggregateStats {
            files: files.len(),
            ..Default::default()
        };
        for stat in &files {
            totals.lines += stat.lines;
            totals.lines_covered += stat.lines_covered;
            totals.functions += stat.functions;
            totals.functions_covered += stat.functions_covered;
            totals.branches = totals.branches.saturating_add(stat.branches);
            totals.branches_executed = totals.branches_executed.saturating_add(stat.branches_executed);
        }
        totals.line_rate = percentage(totals.lines_covered, totals.lines);
        totals.function_rate = percentage(totals.functions_covered, totals.functions);
        totals.branch_rate = percentage(totals.branches_executed, totals.branches);

        Self { totals, files }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::BranchTally;

    #[test]
    fn test_file_without_lines_has_zero_rate() {
        let mut model = CoverageModel::new();
        model.file_mut("empty.ctl").record_function("main", 0);

        let summary = CoverageSummary::from_model(&model);

        assert_eq!(summary.files[0].lines, 0);
        assert_eq!(summary.files[0].line_rate, 0.0);
        assert_eq!(summary.files[0].function_rate, 0.0);
        assert_eq!(summary.totals.line_rate, 0.0);
        assert_eq!(summary.totals.branch_rate, 0.0);
    }

    #[test]
    fn test_totals_and_rates() {
        let mut model = CoverageModel::new();
        {
            let foo = model.file_mut("scripts/foo.ctl");
            foo.record_line(1, 3);
            foo.record_line(2, 0);
            foo.record_function("main", 1);
            foo.record_function("helper", 0);
            foo.record_branches(BranchTally { total: 4, executed: 2 });
            foo.record_branches(BranchTally { total: 6, executed: 3 });
        }
        model.file_mut("scripts/bar.ctl").record_line(7, 1);

        let summary = CoverageSummary::from_model(&model);

        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.files[0].path, "scripts/bar.ctl");
        assert_eq!(summary.files[1].path, "scripts/foo.ctl");

        let foo = &summary.files[1];
        assert_eq!(foo.lines, 2);
        assert_eq!(foo.lines_covered, 1);
        assert!((foo.line_rate - 50.0).abs() < 0.001);
        assert!((foo.function_rate - 50.0).abs() < 0.001);
        assert!((foo.branch_rate - 50.0).abs() < 0.001);

        let totals = &summary.totals;
        assert_eq!(totals.files, 2);
        assert_eq!(totals.lines, 3);
        assert_eq!(totals.lines_covered, 2);
        assert_eq!(totals.branches, 10);
        assert_eq!(totals.branches_executed, 5);
        assert!((totals.line_rate - 200.0 / 3.0).abs() < 0.001);
    }
}
