use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use pretraining_data::corpora::CorpusChunks;
use pretraining_data::TokenArrayWriter;

use crate::config::EncodeCfg;
use crate::errors::Result;
use crate::progress::{self, TOKENS_TEMPLATE};
use crate::validate::validate_encode_cfg;
use crate::vocab::Vocabulary;

/// Outcome of encoding a corpus into a token array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeReport {
    pub path: PathBuf,
    pub capacity: usize,
    pub n_written: usize,
    /// Corpus characters consumed, mapped or not.
    pub chars_read: u64,
    /// Characters without an id, in code-point order with their counts.
    pub skipped: Vec<(char, u64)>,
    /// Encoding stopped because the array filled up.
    pub budget_reached: bool,
    /// The array was shrunk to `n_written` because the corpus ran out first.
    pub truncated: bool,
}

impl EncodeReport {
    pub fn skipped_total(&self) -> u64 {
        self.skipped.iter().map(|(_, count)| count).sum()
    }
}

#[derive(Default)]
struct Tally {
    chars_read: u64,
    skipped: BTreeMap<char, u64>,
    budget_reached: bool,
}

/// Encodes `corpus` character by character into a token array of
/// `cfg.total_tokens` slots at `output`. Reading stops as soon as the array
/// is full; if the corpus ends first the array is truncated to the number of
/// ids written.
pub fn encode_corpus(
    corpus: impl AsRef<Path>,
    vocab: &Vocabulary,
    output: impl AsRef<Path>,
    cfg: &EncodeCfg,
) -> Result<EncodeReport> {
    validate_encode_cfg(cfg)?;
    let output = output.as_ref();
    let chunks = CorpusChunks::open(corpus.as_ref(), cfg.chunk_size)?;

    if vocab.is_empty() {
        warn!("vocabulary is empty; no tokens will be written");
    }

    let mut writer = TokenArrayWriter::create(output, cfg.total_tokens)?;
    let tally = match fill(chunks, vocab, &mut writer, cfg) {
        Ok(tally) => tally,
        Err(err) => {
            drop(writer);
            let _ = fs::remove_file(output);
            return Err(err);
        }
    };

    let finished = writer.finish()?;
    if finished.truncated {
        info!(
            "corpus exhausted after {} tokens; {} truncated from capacity {}",
            finished.len,
            finished.path.display(),
            finished.capacity
        );
    } else {
        info!(
            "token array {} filled to capacity {}",
            finished.path.display(),
            finished.capacity
        );
    }

    let skipped: Vec<(char, u64)> = tally.skipped.into_iter().collect();
    if !skipped.is_empty() {
        let total: u64 = skipped.iter().map(|(_, count)| count).sum();
        warn!(
            "skipped {} characters ({} distinct) missing from the vocabulary",
            total,
            skipped.len()
        );
    }

    Ok(EncodeReport {
        path: finished.path,
        capacity: finished.capacity,
        n_written: finished.len,
        chars_read: tally.chars_read,
        skipped,
        budget_reached: tally.budget_reached,
        truncated: finished.truncated,
    })
}

fn fill(
    mut chunks: CorpusChunks,
    vocab: &Vocabulary,
    writer: &mut TokenArrayWriter,
    cfg: &EncodeCfg,
) -> Result<Tally> {
    let mut tally = Tally::default();
    if writer.is_full() {
        tally.budget_reached = true;
        return Ok(tally);
    }

    let pb = progress::bar(writer.capacity() as u64, cfg.show_progress, TOKENS_TEMPLATE);
    let mut next_report = cfg.progress_every;

    'stream: for chunk in chunks.by_ref() {
        let chunk = chunk?;
        for ch in chunk.chars() {
            tally.chars_read += 1;
            match vocab.id(ch) {
                Some(id) => {
                    writer.push(id);
                    if writer.is_full() {
                        tally.budget_reached = true;
                        break 'stream;
                    }
                }
                None => *tally.skipped.entry(ch).or_insert(0) += 1,
            }
        }

        let written = writer.len() as u64;
        pb.set_position(written);
        if written >= next_report {
            info!("encoded {} / {} tokens", written, writer.capacity());
            next_report = (written / cfg.progress_every + 1) * cfg.progress_every;
        }
    }
    pb.finish_and_clear();

    debug!(
        "read {} bytes ({} invalid) from {}",
        chunks.bytes_read(),
        chunks.invalid_bytes(),
        chunks.path().display()
    );
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretraining_data::TokenArray;

    fn cfg(total_tokens: usize, chunk_size: usize) -> EncodeCfg {
        EncodeCfg {
            chunk_size,
            total_tokens,
            progress_every: 2,
            show_progress: false,
        }
    }

    #[test]
    fn stops_exactly_at_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, "abcabcabc").unwrap();
        let vocab = Vocabulary::from_chars("abc".chars());
        let out = dir.path().join("ids.npy");

        let report = encode_corpus(&corpus, &vocab, &out, &cfg(4, 2)).unwrap();
        assert!(report.budget_reached);
        assert!(!report.truncated);
        assert_eq!(report.n_written, 4);
        assert_eq!(report.chars_read, 4);
        assert_eq!(TokenArray::open(&out).unwrap().to_vec(), vec![0, 1, 2, 0]);
    }

    #[test]
    fn unmapped_characters_are_skipped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, "a?b?c!").unwrap();
        let vocab = Vocabulary::from_chars("abc".chars());
        let out = dir.path().join("ids.npy");

        let report = encode_corpus(&corpus, &vocab, &out, &cfg(10, 3)).unwrap();
        assert!(report.truncated);
        assert_eq!(report.n_written, 3);
        assert_eq!(report.skipped, vec![('!', 1), ('?', 2)]);
        assert_eq!(report.skipped_total(), 3);
        assert_eq!(TokenArray::open(&out).unwrap().to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn zero_capacity_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, "abc").unwrap();
        let vocab = Vocabulary::from_chars("abc".chars());
        let out = dir.path().join("ids.npy");

        let report = encode_corpus(&corpus, &vocab, &out, &cfg(0, 8)).unwrap();
        assert_eq!(report.n_written, 0);
        assert_eq!(report.chars_read, 0);
        assert!(TokenArray::open(&out).unwrap().is_empty());
    }

    #[test]
    fn missing_corpus_creates_no_array() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = Vocabulary::from_chars("abc".chars());
        let out = dir.path().join("ids.npy");

        assert!(encode_corpus(dir.path().join("absent.txt"), &vocab, &out, &cfg(4, 8)).is_err());
        assert!(!out.exists());
    }
}
