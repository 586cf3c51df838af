use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::corpora::{decode_utf8_dropping_invalid, Record, RecordDirectory, RecordResult};
use crate::errors::{Error, Result};

pub const DEFAULT_SEPARATOR: &str = "\n\nXXX_NEW_TUNE\n\n";

/// How to treat record bytes that are not valid UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Skip the whole record with a warning.
    #[default]
    Skip,
    /// Keep the record, dropping only the invalid byte sequences.
    IgnoreInvalid,
}

/// Filtering and formatting rules for corpus assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Inclusive lower bound on trimmed length, in characters.
    pub min_chars: usize,
    /// Inclusive upper bound on trimmed length, in characters.
    pub max_chars: usize,
    /// Only this many leading lines are scanned for markers.
    pub lookahead_lines: usize,
    /// Every marker must start at least one trimmed line within the lookahead.
    pub required_markers: Vec<String>,
    pub separator: String,
    pub extension: String,
    pub decode_policy: DecodePolicy,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            min_chars: 400,
            max_chars: 200_000,
            lookahead_lines: 50,
            required_markers: vec!["X:".to_string(), "K:".to_string()],
            separator: DEFAULT_SEPARATOR.to_string(),
            extension: "abc".to_string(),
            decode_policy: DecodePolicy::Skip,
        }
    }
}

impl AssemblerConfig {
    /// Every rule the configuration breaks, in a fixed order.
    pub fn problems(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if self.min_chars > self.max_chars {
            problems.push("min_chars must not exceed max_chars");
        }
        if self.lookahead_lines == 0 && !self.required_markers.is_empty() {
            problems.push("lookahead_lines must be greater than zero when markers are required");
        }
        if self.required_markers.iter().any(|m| m.is_empty()) {
            problems.push("required markers must not be empty");
        }
        if self.separator.is_empty() {
            problems.push("separator must not be empty");
        }
        if self.extension.trim_start_matches('.').is_empty() {
            problems.push("extension must not be empty");
        }
        problems
    }

    pub fn validate(&self) -> Result<()> {
        match self.problems().first().copied() {
            Some(problem) => Err(Error::InvalidConfig(problem)),
            None => Ok(()),
        }
    }

    /// Classifies already-trimmed record content.
    pub fn classify(&self, text: &str) -> Verdict {
        if text.is_empty() {
            return Verdict::Empty;
        }

        let n_chars = text.chars().count();
        if n_chars < self.min_chars {
            return Verdict::TooShort(n_chars);
        }
        if n_chars > self.max_chars {
            return Verdict::TooLong(n_chars);
        }

        let mut found = vec![false; self.required_markers.len()];
        for line in split_lines(text).take(self.lookahead_lines) {
            let line = line.trim();
            for (seen, marker) in found.iter_mut().zip(&self.required_markers) {
                if !*seen && line.starts_with(marker.as_str()) {
                    *seen = true;
                }
            }
            if found.iter().all(|seen| *seen) {
                break;
            }
        }

        match found.iter().position(|seen| !seen) {
            Some(missing) => Verdict::MissingMarker(missing),
            None => Verdict::Accepted,
        }
    }
}

fn is_line_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}'
            | '\u{2028}' | '\u{2029}'
    )
}

/// Lines of `text` split at every Unicode line boundary, with `\r\n` counted
/// as a single break. A trailing break does not start an empty line.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let Some((at, ch)) = rest.char_indices().find(|&(_, ch)| is_line_break(ch)) else {
            return Some(std::mem::take(&mut rest));
        };
        let line = &rest[..at];
        let mut next = at + ch.len_utf8();
        if ch == '\r' && rest[next..].starts_with('\n') {
            next += 1;
        }
        rest = &rest[next..];
        Some(line)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Empty,
    TooShort(usize),
    TooLong(usize),
    /// Index into `required_markers` of the first marker not found.
    MissingMarker(usize),
}

/// Counters reported at the end of assembly.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub total: usize,
    pub non_empty: usize,
    pub accepted: usize,
    pub unreadable: usize,
    pub undecodable: usize,
    pub too_short: usize,
    pub too_long: usize,
    pub missing_marker: usize,
    pub invalid_bytes_dropped: usize,
    pub bytes_written: u64,
    pub chars_written: u64,
}

/// Filters `records` and writes every accepted one, trimmed and followed by
/// the separator, to `out` in input order.
pub fn assemble<I, W>(records: I, config: &AssemblerConfig, out: &mut W) -> Result<AssemblyStats>
where
    I: IntoIterator<Item = RecordResult>,
    W: Write,
{
    config.validate()?;
    let separator_chars = config.separator.chars().count() as u64;
    let mut stats = AssemblyStats::default();

    for record in records {
        stats.total += 1;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("{err}");
                stats.unreadable += 1;
                continue;
            }
        };

        let Some(text) = decode_record(&record, config.decode_policy, &mut stats) else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        stats.non_empty += 1;

        match config.classify(text) {
            Verdict::Accepted => {}
            Verdict::Empty => continue,
            Verdict::TooShort(_) => {
                stats.too_short += 1;
                continue;
            }
            Verdict::TooLong(_) => {
                stats.too_long += 1;
                continue;
            }
            Verdict::MissingMarker(_) => {
                stats.missing_marker += 1;
                continue;
            }
        }

        out.write_all(text.as_bytes())?;
        out.write_all(config.separator.as_bytes())?;
        stats.accepted += 1;
        stats.bytes_written += (text.len() + config.separator.len()) as u64;
        stats.chars_written += text.chars().count() as u64 + separator_chars;
    }

    out.flush()?;
    Ok(stats)
}

fn decode_record(
    record: &Record,
    policy: DecodePolicy,
    stats: &mut AssemblyStats,
) -> Option<String> {
    match std::str::from_utf8(&record.content) {
        Ok(text) => Some(text.to_owned()),
        Err(err) => match policy {
            DecodePolicy::Skip => {
                warn!(
                    "skipping {}: not valid UTF-8 ({err})",
                    record.source.display()
                );
                stats.undecodable += 1;
                None
            }
            DecodePolicy::IgnoreInvalid => {
                let decoded = decode_utf8_dropping_invalid(&record.content, true);
                stats.invalid_bytes_dropped += decoded.dropped;
                Some(decoded.text)
            }
        },
    }
}

/// Assembles every record below `records_dir` into the corpus at `corpus_path`.
///
/// The corpus is written to a temporary sibling first and renamed into place
/// once complete.
pub fn assemble_corpus(
    records_dir: &Path,
    corpus_path: &Path,
    config: &AssemblerConfig,
) -> Result<AssemblyStats> {
    config.validate()?;
    let records = RecordDirectory::new(records_dir, config.extension.clone())?;
    let stream = records.stream()?;

    if let Some(parent) = corpus_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = corpus_path.with_extension("tmp");
    let result = (|| {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        let stats = assemble(stream, config, &mut writer)?;
        writer.into_inner().map_err(|err| err.into_error())?.sync_all()?;
        Ok::<_, Error>(stats)
    })();

    match result {
        Ok(stats) => {
            fs::rename(&tmp_path, corpus_path)?;
            info!(
                "corpus written to {} ({} of {} records accepted)",
                corpus_path.display(),
                stats.accepted,
                stats.total
            );
            Ok(stats)
        }
        Err(err) => {
            let _ = fs::remove_file(&tmp_path);
            Err(err)
        }
    }
}
