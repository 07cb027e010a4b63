//! Coverage module
//!
//! Provides:
//! - CTL coverage report extraction
//! - The merged coverage model
//! - Statistics over the merged model
//! - Cobertura XML export
//! - Threshold validation

mod cobertura;
mod extract;
mod stats;
mod threshold;

pub use cobertura::*;
pub use extract::*;
pub use stats::*;
pub use threshold::*;

use std::collections::BTreeMap;

/// Branch tally of a file: summed across functions and documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchTally {
    pub total: u64,
    pub executed: u64,
}

impl BranchTally {
    pub fn add(&mut self, other: BranchTally) {
        self.total = self.total.saturating_add(other.total);
        self.executed = self.executed.saturating_add(other.executed);
    }
}

/// Coverage observed for a single source file
///
/// Lines and functions keep the highest count ever observed. A line or
/// function missing from the map was never observed and is not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    pub lines: BTreeMap<u32, u64>,
    pub functions: BTreeMap<String, u64>,
    pub branches: BranchTally,
}

impl FileRecord {
    pub fn record_line(&mut self, line: u32, hits: u64) {
        let entry = self.lines.entry(line).or_insert(0);
        *entry = (*entry).max(hits);
    }

    pub fn record_function(&mut self, name: &str, count: u64) {
        match self.functions.get_mut(name) {
            Some(existing) => *existing = (*existing).max(count),
            None => {
                self.functions.insert(name.to_string(), count);
            }
        }
    }

    pub fn record_branches(&mut self, tally: BranchTally) {
        self.branches.add(tally);
    }

    /// Fold another record for the same file into this one
    pub fn merge(&mut self, other: FileRecord) {
        for (line, hits) in other.lines {
            self.record_line(line, hits);
        }
        for (name, count) in other.functions {
            let entry = self.functions.entry(name).or_insert(0);
            *entry = (*entry).max(count);
        }
        self.branches.add(other.branches);
    }
}

/// Merged coverage of every document processed so far, keyed by normalized path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageModel {
    files: BTreeMap<String, FileRecord>,
}

impl CoverageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `path`, created empty on first sight
    pub fn file_mut(&mut self, path: &str) -> &mut FileRecord {
        self.files.entry(path.to_string()).or_default()
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Files in lexicographic path order
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.files.iter().map(|(path, record)| (path.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Fold a partial model extracted independently.
    ///
    /// Lines and functions are max-merged, branch tallies are summed.
    pub fn merge(&mut self, other: CoverageModel) {
        for (path, record) in other.files {
            match self.files.get_mut(&path) {
                Some(existing) => existing.merge(record),
                None => {
                    self.files.insert(path, record);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_and_functions_keep_maximum() {
        let mut record = FileRecord::default();
        record.record_line(10, 3);
        record.record_line(10, 0);
        record.record_function("main", 0);
        record.record_function("main", 2);

        assert_eq!(record.lines[&10], 3);
        assert_eq!(record.functions["main"], 2);
    }

    #[test]
    fn test_branches_are_summed() {
        let mut record = FileRecord::default();
        record.record_branches(BranchTally { total: 4, executed: 2 });
        record.record_branches(BranchTally { total: 6, executed: 3 });

        assert_eq!(record.branches, BranchTally { total: 10, executed: 5 });
    }

    #[test]
    fn test_branch_totals_saturate() {
        let mut tally = BranchTally { total: u64::MAX - 1, executed: 3 };
        tally.add(BranchTally { total: 5, executed: u64::MAX });

        assert_eq!(tally, BranchTally { total: u64::MAX, executed: u64::MAX });
    }

    #[test]
    fn test_model_merge() {
        let mut a = CoverageModel::new();
        a.file_mut("scripts/foo.ctl").record_line(1, 1);
        a.file_mut("scripts/foo.ctl").record_branches(BranchTally { total: 2, executed: 1 });

        let mut b = CoverageModel::new();
        b.file_mut("scripts/foo.ctl").record_line(1, 5);
        b.file_mut("scripts/foo.ctl").record_branches(BranchTally { total: 2, executed: 2 });
        b.file_mut("scripts/bar.ctl").record_function("init", 1);

        a.merge(b);

        assert_eq!(a.len(), 2);
        let foo = a.file("scripts/foo.ctl").unwrap();
        assert_eq!(foo.lines[&1], 5);
        assert_eq!(foo.branches, BranchTally { total: 4, executed: 3 });

        let paths: Vec<_> = a.files().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["scripts/bar.ctl", "scripts/foo.ctl"]);
    }
}
