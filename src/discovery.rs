//! Report discovery module
//!
//! Resolves the input argument to the list of coverage reports to merge:
//! a single file, or the reports inside a directory matching a glob pattern.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File name pattern of reports written by the WinCC OA coverage run
pub const DEFAULT_PATTERN: &str = "CoverageReport_*.xml";

/// Locate the reports to process.
///
/// A file is returned as-is. A directory is scanned (not recursively) for
/// file names matching `pattern`, sorted by path. Anything else yields no
/// reports.
pub fn find_reports(input: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    if !input.is_dir() {
        return Ok(Vec::new());
    }

    let matcher = glob::Pattern::new(pattern)
        .with_context(|| format!("Invalid report pattern: {}", pattern))?;

    // An unreadable directory has no reports
    let entries = match fs::read_dir(input) {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };

    let mut reports: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| matcher.matches(name))
                .unwrap_or(false)
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    reports.sort();
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_find_reports_in_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("CoverageReport_2.xml"), "<coverage/>").unwrap();
        fs::write(dir.path().join("CoverageReport_1.xml"), "<coverage/>").unwrap();
        fs::write(dir.path().join("OtherReport_1.xml"), "<coverage/>").unwrap();
        fs::write(dir.path().join("CoverageReport_3.txt"), "").unwrap();
        fs::create_dir(dir.path().join("CoverageReport_dir.xml")).unwrap();

        let reports = find_reports(dir.path(), DEFAULT_PATTERN).unwrap();

        assert_eq!(
            reports,
            vec![
                dir.path().join("CoverageReport_1.xml"),
                dir.path().join("CoverageReport_2.xml"),
            ]
        );
    }

    #[test]
    fn test_single_file_is_used_regardless_of_name() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("merged.xml");
        fs::write(&file, "<coverage/>").unwrap();

        let reports = find_reports(&file, DEFAULT_PATTERN).unwrap();
        assert_eq!(reports, vec![file]);
    }

    #[test]
    fn test_missing_path_has_no_reports() {
        let dir = tempdir().unwrap();
        let reports = find_reports(&dir.path().join("missing"), DEFAULT_PATTERN).unwrap();
        assert!(reports.is_empty());
    }

    #[test]
    fn test_custom_pattern() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("cov-a.xml"), "").unwrap();
        fs::write(dir.path().join("CoverageReport_1.xml"), "").unwrap();

        let reports = find_reports(dir.path(), "cov-*.xml").unwrap();
        assert_eq!(reports, vec![dir.path().join("cov-a.xml")]);
    }
}
