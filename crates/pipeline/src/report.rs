//! Human-readable end-of-stage summaries.

use std::io::{self, Write};
use std::path::Path;

use char_tokenizer::{EncodeReport, VocabReport};
use pretraining_data::{AssemblyStats, LengthStats, SplitReport};

/// Number of vocabulary symbols listed in the vocab summary.
pub const VOCAB_PREVIEW: usize = 20;

/// Quoted form of a symbol with whitespace and control characters escaped.
pub fn display_symbol(ch: char) -> String {
    format!("{ch:?}")
}

pub fn write_assembly<W: Write>(
    out: &mut W,
    stats: &AssemblyStats,
    corpus: &Path,
) -> io::Result<()> {
    writeln!(out, "corpus assembly -> {}", corpus.display())?;
    writeln!(out, "  records seen        {:>12}", stats.total)?;
    writeln!(out, "  non-empty           {:>12}", stats.non_empty)?;
    writeln!(out, "  accepted            {:>12}", stats.accepted)?;
    writeln!(out, "  rejected too short  {:>12}", stats.too_short)?;
    writeln!(out, "  rejected too long   {:>12}", stats.too_long)?;
    writeln!(out, "  missing markers     {:>12}", stats.missing_marker)?;
    writeln!(out, "  unreadable          {:>12}", stats.unreadable)?;
    writeln!(out, "  undecodable         {:>12}", stats.undecodable)?;
    if stats.invalid_bytes_dropped > 0 {
        writeln!(out, "  invalid bytes       {:>12}", stats.invalid_bytes_dropped)?;
    }
    writeln!(out, "  characters written  {:>12}", stats.chars_written)?;
    writeln!(out, "  bytes written       {:>12}", stats.bytes_written)?;
    Ok(())
}

pub fn write_length_stats<W: Write>(out: &mut W, stats: Option<&LengthStats>) -> io::Result<()> {
    let Some(stats) = stats else {
        writeln!(out, "record lengths: no non-empty records found")?;
        return Ok(());
    };
    writeln!(out, "record lengths (characters, trimmed)")?;
    writeln!(out, "  records  {:>12}", stats.count)?;
    writeln!(out, "  mean     {:>12.1}", stats.mean)?;
    writeln!(out, "  median   {:>12.1}", stats.median)?;
    writeln!(out, "  min      {:>12}", stats.min)?;
    writeln!(out, "  max      {:>12}", stats.max)?;
    writeln!(out, "  p90      {:>12.1}", stats.p90)?;
    writeln!(out, "  p95      {:>12.1}", stats.p95)?;
    writeln!(out, "  p99      {:>12.1}", stats.p99)?;
    Ok(())
}

pub fn write_vocab<W: Write>(
    out: &mut W,
    report: &VocabReport,
    vocab_path: &Path,
) -> io::Result<()> {
    writeln!(out, "vocabulary -> {}", vocab_path.display())?;
    writeln!(out, "  symbols             {:>12}", report.vocab.len())?;
    writeln!(out, "  characters read     {:>12}", report.total_chars)?;
    if report.invalid_bytes > 0 {
        writeln!(out, "  invalid bytes       {:>12}", report.invalid_bytes)?;
    }
    writeln!(out, "  corpus sha256       {}", report.corpus_sha256)?;

    if report.vocab.is_empty() {
        writeln!(out, "  (empty vocabulary: tokenization will produce no tokens)")?;
        return Ok(());
    }

    let top: Vec<String> = report
        .most_frequent(5)
        .into_iter()
        .map(|(ch, count)| format!("{}x{}", display_symbol(ch), count))
        .collect();
    writeln!(out, "  most frequent       {}", top.join(", "))?;

    let shown = report.vocab.len().min(VOCAB_PREVIEW);
    writeln!(out, "  first {shown} symbols:")?;
    for (id, (&ch, freq)) in report
        .vocab
        .symbols()
        .iter()
        .zip(&report.frequencies)
        .take(shown)
        .enumerate()
    {
        writeln!(out, "    {id:>4}  {:<10} {freq:>12}", display_symbol(ch))?;
    }
    Ok(())
}

pub fn write_encode<W: Write>(out: &mut W, report: &EncodeReport) -> io::Result<()> {
    writeln!(out, "token array -> {}", report.path.display())?;
    writeln!(out, "  capacity            {:>12}", report.capacity)?;
    writeln!(out, "  tokens written      {:>12}", report.n_written)?;
    writeln!(out, "  characters read     {:>12}", report.chars_read)?;
    if report.truncated {
        writeln!(
            out,
            "  note: corpus ended before capacity; array truncated to {} tokens",
            report.n_written
        )?;
    }
    if !report.skipped.is_empty() {
        let listed: Vec<String> = report
            .skipped
            .iter()
            .map(|&(ch, count)| format!("{}x{}", display_symbol(ch), count))
            .collect();
        writeln!(
            out,
            "  skipped characters  {:>12} ({})",
            report.skipped_total(),
            listed.join(", ")
        )?;
    }
    Ok(())
}

pub fn write_split<W: Write>(out: &mut W, report: &SplitReport) -> io::Result<()> {
    writeln!(out, "splits of {} tokens", report.source_len)?;
    for split in &report.splits {
        writeln!(
            out,
            "  {:<10} [{:>12}, {:>12})  -> {}",
            split.kind.as_str(),
            split.start,
            split.start + split.len,
            split.path.display()
        )?;
    }
    if report.unused > 0 {
        writeln!(out, "  unused tail         {:>12}", report.unused)?;
    }
    Ok(())
}
