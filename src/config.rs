use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::coverage::DEFAULT_PACKAGE;
use crate::discovery::DEFAULT_PATTERN;
use crate::report::{DEFAULT_BAR_WIDTH, DEFAULT_PATH_WIDTH};

/// Optional `ctlcov.toml` settings; command-line flags take precedence
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub threshold: ThresholdConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Report file name pattern used when scanning a directory
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_path_width")]
    pub path_width: usize,
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
    /// Package name written to the Cobertura file
    #[serde(default = "default_package")]
    pub package: String,
    /// Cobertura output path, `~` and environment variables expanded
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub line: Option<f64>,
    #[serde(default)]
    pub branch: Option<f64>,
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

fn default_path_width() -> usize {
    DEFAULT_PATH_WIDTH
}

fn default_bar_width() -> usize {
    DEFAULT_BAR_WIDTH
}

fn default_package() -> String {
    DEFAULT_PACKAGE.to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            filter: None,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            path_width: default_path_width(),
            bar_width: default_bar_width(),
            package: default_package(),
            output: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.report.path_width < 4 {
            anyhow::bail!("report.path_width must be at least 4, got {}", self.report.path_width);
        }
        if self.report.bar_width == 0 {
            anyhow::bail!("report.bar_width must be at least 1");
        }

        for (name, value) in [("line", self.threshold.line), ("branch", self.threshold.branch)] {
            if let Some(value) = value {
                if !(0.0..=100.0).contains(&value) {
                    anyhow::bail!("threshold.{} must be between 0 and 100, got {}", name, value);
                }
            }
        }

        glob::Pattern::new(&self.input.pattern)
            .with_context(|| format!("Invalid input.pattern: {}", self.input.pattern))?;

        Ok(())
    }

    /// Configured Cobertura output path with `~` and `$VARS` expanded
    pub fn output_path(&self) -> Result<Option<PathBuf>> {
        match self.report.output {
            Some(ref raw) => {
                let expanded = shellexpand::full(raw)
                    .with_context(|| format!("Could not expand report.output: {}", raw))?;
                Ok(Some(PathBuf::from(expanded.as_ref())))
            }
            None => Ok(None),
        }
    }
}
