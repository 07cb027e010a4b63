//! Cobertura XML export, and reading back the totals of a previous export

use anyhow::{Context, Result};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use super::{CoverageModel, CoverageSnapshot, FileStat};

/// Package name used when none is configured
pub const DEFAULT_PACKAGE: &str = "WinCC_OA";

const DOCTYPE: &str = r#"<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">"#;

/// Covered over total as a fraction, 0 when nothing was measured
fn ratio(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    covered as f64 / total as f64
}

/// Write the model as a Cobertura document, replacing any existing file
pub fn write_cobertura(model: &CoverageModel, package: &str, path: &Path) -> Result<()> {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let xml = render_cobertura(model, package, timestamp);
    fs::write(path, xml).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Render the model as a Cobertura document
pub fn render_cobertura(model: &CoverageModel, package: &str, timestamp: i64) -> String {
    let stats: Vec<FileStat> = model
        .files()
        .map(|(path, record)| FileStat::from_record(path, record))
        .collect();

    let lines_valid: u64 = stats.iter().map(|s| s.lines).sum();
    let lines_covered: u64 = stats.iter().map(|s| s.lines_covered).sum();
    let branches_valid = stats.iter().fold(0u64, |acc, s| acc.saturating_add(s.branches));
    let branches_covered = stats.iter().fold(0u64, |acc, s| acc.saturating_add(s.branches_executed));
    let line_rate = ratio(lines_covered, lines_valid);
    let branch_rate = ratio(branches_covered, branches_valid);

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(DOCTYPE);
    xml.push('\n');
    let _ = writeln!(
        xml,
        r#"<coverage version="1.0" timestamp="{}" lines-valid="{}" lines-covered="{}" line-rate="{:.4}" branches-valid="{}" branches-covered="{}" branch-rate="{:.4}" complexity="0">"#,
        timestamp, lines_valid, lines_covered, line_rate, branches_valid, branches_covered, branch_rate
    );
    xml.push_str("  <packages>\n");
    let _ = writeln!(
        xml,
        r#"    <package name="{}" line-rate="{:.4}" branch-rate="{:.4}" complexity="0">"#,
        escape(package),
        line_rate,
        branch_rate
    );
    xml.push_str("      <classes>\n");

    for ((path, record), stat) in model.files().zip(&stats) {
        let class_name = path.rsplit('/').next().unwrap_or(path);
        let _ = writeln!(
            xml,
            r#"        <class name="{}" filename="{}" line-rate="{:.4}" branch-rate="{:.4}" complexity="0">"#,
            escape(class_name),
            escape(path),
            ratio(stat.lines_covered, stat.lines),
            ratio(stat.branches_executed, stat.branches)
        );

        xml.push_str("          <methods>\n");
        for (name, count) in &record.functions {
            let _ = writeln!(
                xml,
                r#"            <method name="{}" signature="" line-rate="{}" branch-rate="0"/>"#,
                escape(name.as_str()),
                if *count > 0 { "1.0" } else { "0.0" }
            );
        }
        xml.push_str("          </methods>\n");

        xml.push_str("          <lines>\n");
        for (number, hits) in &record.lines {
            let _ = writeln!(xml, r#"            <line number="{}" hits="{}"/>"#, number, hits);
        }
        xml.push_str("          </lines>\n");
        xml.push_str("        </class>\n");
    }

    xml.push_str("      </classes>\n");
    xml.push_str("    </package>\n");
    xml.push_str("  </packages>\n");
    xml.push_str("</coverage>\n");

    xml
}

/// Read the root totals of a previously written Cobertura file
pub fn read_cobertura_totals(path: &Path) -> Result<CoverageSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read baseline {}", path.display()))?;
    parse_cobertura_totals(&content)
}

/// Parse the `<coverage>` root attributes of Cobertura content
pub fn parse_cobertura_totals(content: &str) -> Result<CoverageSnapshot> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut data = CoverageSnapshot::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"coverage" => {
                for attr in e.attributes().filter_map(|a| a.ok()) {
                    let value = String::from_utf8_lossy(&attr.value);
                    match attr.key.as_ref() {
                        b"line-rate" => {
                            if let Ok(rate) = value.parse::<f64>() {
                                data.line_coverage = Some(rate * 100.0);
                            }
                        }
                        b"branch-rate" => {
                            if let Ok(rate) = value.parse::<f64>() {
                                data.branch_coverage = Some(rate * 100.0);
                            }
                        }
                        b"lines-covered" => data.lines_covered = value.parse().unwrap_or(0),
                        b"lines-valid" => data.lines_total = value.parse().unwrap_or(0),
                        b"branches-covered" => data.branches_covered = value.parse().unwrap_or(0),
                        b"branches-valid" => data.branches_total = value.parse().unwrap_or(0),
                        _ => {}
                    }
                }
                return Ok(data);
            }
            Ok(Event::Eof) => anyhow::bail!("No <coverage> element found in Cobertura XML"),
            Err(e) => return Err(anyhow::anyhow!("Error parsing Cobertura XML: {}", e)),
            _ => {}
        }
    }
}
