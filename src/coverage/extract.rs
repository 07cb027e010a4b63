//! CTL coverage report extractor
//!
//! A WinCC OA coverage report holds any number of `<script>` blocks, each
//! naming one source file and listing its functions:
//!
//! ```xml
//! <script>
//!   <file path="scripts\libs\foo.ctl"/>
//!   <func line="3" name="main" signature="main()" count="1">
//!     <node line="4" count="1"/>
//!     <node line="5" count="0"/>
//!     <branches total="2" executed="1"/>
//!   </func>
//! </script>
//! ```
//!
//! Extraction is best effort. Blocks without a file path, functions without
//! a name or count, and entries missing a number are skipped silently.

use anyhow::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{BranchTally, CoverageModel, FileRecord};

/// Extract report content into `model`, returning the number of blocks kept.
///
/// The document is read into a partial model which is then folded into
/// `model`. Markup that cannot be parsed drops the block it occurs in;
/// reading resumes at the next `<script>` tag. Every block that could be
/// read is still folded in, and the first parse error is then returned.
pub fn extract_document(content: &str, model: &mut CoverageModel, filter: Option<&str>) -> Result<usize> {
    let mut partial = CoverageModel::new();
    let outcome = extract_blocks(content, &mut partial, filter);
    model.merge(partial);
    outcome
}

/// Normalize a declared script path: forward slashes, no empty or `.`
/// segments, `dir/..` pairs resolved.
pub fn normalize_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Case-insensitive substring match used by `--filter`
pub fn matches_filter(path: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(needle) if !needle.is_empty() => path.to_lowercase().contains(&needle.to_lowercase()),
        _ => true,
    }
}

/// A `<script>` block being read
#[derive(Default)]
struct PendingBlock {
    path: Option<String>,
    record: FileRecord,
    function: Option<PendingFunction>,
}

/// The `<func>` entry currently open inside a block
struct PendingFunction {
    /// False when the entry lacked a name or count; its body is ignored
    accepted: bool,
    branches_seen: bool,
}

impl PendingBlock {
    fn open_function(&mut self, e: &BytesStart) -> PendingFunction {
        let name = attribute(e, b"name");
        let count = attribute(e, b"count").and_then(|v| v.trim().parse::<u64>().ok());

        match (name, count) {
            (Some(name), Some(count)) => {
                self.record.record_function(&name, count);
                PendingFunction {
                    accepted: true,
                    branches_seen: false,
                }
            }
            _ => PendingFunction {
                accepted: false,
                branches_seen: false,
            },
        }
    }

    fn handle_entry(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"file" => {
                if self.path.is_none() {
                    self.path = attribute(e, b"path")
                        .filter(|p| !p.trim().is_empty())
                        .map(|p| normalize_path(&p));
                }
            }
            b"node" => {
                let Some(function) = self.function.as_ref() else { return };
                if !function.accepted {
                    return;
                }
                let line = attribute(e, b"line").and_then(|v| v.trim().parse::<u32>().ok());
                let hits = attribute(e, b"count").and_then(|v| v.trim().parse::<u64>().ok());
                if let (Some(line), Some(hits)) = (line, hits) {
                    self.record.record_line(line, hits);
                }
            }
            b"branches" => {
                let Some(function) = self.function.as_mut() else { return };
                if !function.accepted || function.branches_seen {
                    return;
                }
                let total = attribute(e, b"total").and_then(|v| v.trim().parse::<u64>().ok());
                let executed = attribute(e, b"executed").and_then(|v| v.trim().parse::<u64>().ok());
                if let (Some(total), Some(executed)) = (total, executed) {
                    function.branches_seen = true;
                    self.record.record_branches(BranchTally { total, executed });
                }
            }
            _ => {}
        }
    }

    /// Fold the finished block into `model` if it named a file passing the filter
    fn commit(self, model: &mut CoverageModel, filter: Option<&str>) -> bool {
        match self.path {
            Some(path) if matches_filter(&path, filter) => {
                model.file_mut(&path).merge(self.record);
                true
            }
            _ => false,
        }
    }
}

fn extract_blocks(content: &str, model: &mut CoverageModel, filter: Option<&str>) -> Result<usize> {
    let mut kept = 0usize;
    let mut start = 0usize;
    let mut failures = 0usize;
    let mut first_failure: Option<String> = None;

    loop {
        match read_blocks(&content[start..], model, filter, &mut kept) {
            Ok(()) => break,
            Err((position, e)) => {
                let failed_at = start + position;
                failures += 1;
                if first_failure.is_none() {
                    first_failure = Some(format!("at position {}: {}", failed_at, e));
                }

                // Resume at the next block; the one being read is dropped
                match next_block_start(content, failed_at.max(start + 1)) {
                    Some(next) => start = next,
                    None => break,
                }
            }
        }
    }

    match first_failure {
        Some(failure) => Err(anyhow::anyhow!(
            "Error parsing coverage XML {} ({} malformed section(s) skipped, {} block(s) kept)",
            failure,
            failures,
            kept
        )),
        None => Ok(kept),
    }
}

/// Offset of the first `<script>` tag at or after `from`
fn next_block_start(content: &str, from: usize) -> Option<usize> {
    content
        .match_indices("<script")
        .map(|(index, _)| index)
        .filter(|&index| index >= from)
        .find(|&index| {
            matches!(
                content.as_bytes().get(index + "<script".len()),
                Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n')
            )
        })
}

/// Read `content` until EOF or the first markup error, committing each
/// completed block. On error, returns the offset reached in `content`.
fn read_blocks(
    content: &str,
    model: &mut CoverageModel,
    filter: Option<&str>,
    kept: &mut usize,
) -> std::result::Result<(), (usize, quick_xml::Error)> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut block: Option<PendingBlock> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"script" => block = Some(PendingBlock::default()),
                b"func" => {
                    if let Some(ref mut current) = block {
                        current.function = Some(current.open_function(e));
                    }
                }
                _ => {
                    if let Some(ref mut current) = block {
                        current.handle_entry(e);
                    }
                }
            },
            Ok(Event::Empty(ref e)) => {
                if let Some(ref mut current) = block {
                    match e.name().as_ref() {
                        b"func" => {
                            // Self-closing entry: count only, no body
                            current.open_function(e);
                        }
                        _ => current.handle_entry(e),
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"script" => {
                    if let Some(finished) = block.take() {
                        if finished.commit(model, filter) {
                            *kept += 1;
                        }
                    }
                }
                b"func" => {
                    if let Some(ref mut current) = block {
                        current.function = None;
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => return Ok(()),
            Err(e) => return Err((reader.buffer_position(), e)),
            _ => {}
        }
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == key)
        .map(|a| match a.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).to_string(),
        })
}
