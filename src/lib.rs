//! ctlcov - WinCC OA CTL coverage merger
//!
//! A library for combining CTL coverage reports with:
//! - Best-effort extraction of `<script>` blocks from each report
//! - Max-merge of line and function counts, sum-merge of branch tallies
//! - Per-file and aggregate statistics
//! - A console summary and Cobertura XML export

pub mod config;
pub mod coverage;
pub mod discovery;
pub mod report;
pub mod runner;

pub use coverage::{extract_document, CoverageModel, CoverageSummary, FileRecord};
pub use runner::{process_reports, RunOptions, Runner};
