use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::io;
use std::path::PathBuf;

use ctlcov::config::Config;
use ctlcov::report::ReportOptions;
use ctlcov::runner::{RunOptions, Runner};

const CONFIG_FILE: &str = "ctlcov.toml";

#[derive(Parser, Debug)]
#[command(name = "ctlcov")]
#[command(about = "Merge WinCC OA CTL coverage reports into a summary and Cobertura XML")]
#[command(version)]
struct Cli {
    /// Coverage report, or directory containing CoverageReport_*.xml files
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Only keep scripts whose path contains this text (case-insensitive)
    #[arg(short, long)]
    filter: Option<String>,

    /// Print per-file coverage before the summary
    #[arg(short, long)]
    verbose: bool,

    /// Also write a Cobertura XML file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to config file (default: ctlcov.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write the statistics as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Previous Cobertura file to compare against
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Exit with status 2 when line coverage is below this percentage
    #[arg(long, value_name = "PERCENT")]
    fail_under: Option<f64>,

    /// Exit with status 2 when branch coverage is below this percentage
    #[arg(long, value_name = "PERCENT")]
    fail_under_branch: Option<f64>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::load_or_default(&PathBuf::from(CONFIG_FILE))?,
    };

    let options = build_options(cli, &config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    Runner::new(&options).run(&mut out)
}

/// Combine flags with config values, flags winning
fn build_options(cli: Cli, config: &Config) -> Result<RunOptions> {
    let output = match cli.output {
        Some(path) => Some(path),
        None => config.output_path()?,
    };

    Ok(RunOptions {
        input: cli.path,
        pattern: config.input.pattern.clone(),
        filter: cli.filter.or_else(|| config.input.filter.clone()),
        report: ReportOptions {
            verbose: cli.verbose || config.report.verbose,
            path_width: config.report.path_width,
            bar_width: config.report.bar_width,
        },
        output,
        package: config.report.package.clone(),
        json: cli.json,
        baseline: cli.baseline,
        line_threshold: cli.fail_under.or(config.threshold.line),
        branch_threshold: cli.fail_under_branch.or(config.threshold.branch),
    })
}
