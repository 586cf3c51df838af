use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use pretraining_data::corpora::CorpusChunks;
use pretraining_data::TokenId;
use sha2::{Digest, Sha256};

use crate::artifacts::{read_vocab_file, timestamp, write_manifest, write_vocab_file};
use crate::config::VocabCfg;
use crate::errors::{Error, Result};
use crate::progress::{self, BYTES_TEMPLATE};
use crate::types::{VocabFile, VocabManifest};
use crate::validate::{validate_tables, validate_vocab_cfg};

/// Character-level vocabulary: ids are positions in the code-point-sorted list
/// of distinct characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    symbols: Vec<char>,
    ids: HashMap<char, TokenId>,
}

impl Vocabulary {
    /// Builds the vocabulary of a character set. Order and repetition of the
    /// input do not matter.
    pub fn from_chars<I: IntoIterator<Item = char>>(chars: I) -> Self {
        let mut symbols: Vec<char> = chars.into_iter().collect();
        symbols.sort_unstable();
        symbols.dedup();
        Self::from_sorted(symbols)
    }

    fn from_sorted(symbols: Vec<char>) -> Self {
        let ids = symbols
            .iter()
            .enumerate()
            .map(|(id, &ch)| (ch, id as TokenId))
            .collect();
        Self { symbols, ids }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn id(&self, ch: char) -> Option<TokenId> {
        self.ids.get(&ch).copied()
    }

    pub fn symbol(&self, id: TokenId) -> Option<char> {
        self.symbols.get(id as usize).copied()
    }

    /// Symbols in id order.
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Ids of the mapped characters of `text`; unmapped characters are skipped.
    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        text.chars().filter_map(|ch| self.id(ch)).collect()
    }

    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        ids.iter()
            .map(|&id| {
                self.symbol(id).ok_or_else(|| {
                    Error::Validation(format!(
                        "token id {id} is outside the vocabulary of size {}",
                        self.len()
                    ))
                })
            })
            .collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = VocabFile::default();
        for (id, &ch) in self.symbols.iter().enumerate() {
            file.stoi.insert(ch.to_string(), id as u32);
            file.itos.insert(id as u32, ch.to_string());
        }
        write_vocab_file(path.as_ref(), &file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = read_vocab_file(path)?;
        let symbols = validate_tables(&file).map_err(|err| match err {
            Error::Validation(reason) => {
                Error::Validation(format!("malformed vocabulary {}: {reason}", path.display()))
            }
            other => other,
        })?;
        debug!("loaded {} symbols from {}", symbols.len(), path.display());
        Ok(Self::from_sorted(symbols))
    }
}

/// Running character frequencies over a stream of text.
#[derive(Debug, Default, Clone)]
pub struct CharCounter {
    counts: HashMap<char, u64>,
    total: u64,
}

impl CharCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, text: &str) {
        for ch in text.chars() {
            *self.counts.entry(ch).or_insert(0) += 1;
            self.total += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Vocabulary over the counted characters, with frequencies indexed by id.
    pub fn finish(self) -> (Vocabulary, Vec<u64>) {
        let vocab = Vocabulary::from_chars(self.counts.keys().copied());
        let frequencies = vocab
            .symbols()
            .iter()
            .map(|ch| self.counts.get(ch).copied().unwrap_or(0))
            .collect();
        (vocab, frequencies)
    }
}

/// Result of a vocabulary pass over a corpus.
#[derive(Debug, Clone)]
pub struct VocabReport {
    pub vocab: Vocabulary,
    /// Occurrences of each symbol, indexed by id.
    pub frequencies: Vec<u64>,
    pub total_chars: u64,
    pub bytes_read: u64,
    pub invalid_bytes: u64,
    pub corpus_sha256: String,
}

impl VocabReport {
    pub fn manifest(&self) -> Result<VocabManifest> {
        Ok(VocabManifest {
            corpus_sha256: self.corpus_sha256.clone(),
            created_at: timestamp()?,
            vocab_size: self.vocab.len(),
            total_chars: self.total_chars,
        })
    }

    /// Symbols with their counts, most frequent first, ties by id.
    pub fn most_frequent(&self, limit: usize) -> Vec<(char, u64)> {
        let mut ranked: Vec<(char, u64)> = self
            .vocab
            .symbols()
            .iter()
            .copied()
            .zip(self.frequencies.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }
}

/// Streams `corpus` once and derives its vocabulary.
pub fn build_vocabulary(corpus: impl AsRef<Path>, cfg: &VocabCfg) -> Result<VocabReport> {
    validate_vocab_cfg(cfg)?;
    let corpus = corpus.as_ref();
    let mut chunks = CorpusChunks::open(corpus, cfg.chunk_size)?;
    let corpus_bytes = std::fs::metadata(corpus)?.len();

    let pb = progress::bar(corpus_bytes, cfg.show_progress, BYTES_TEMPLATE);
    pb.set_message("building vocabulary");

    let mut counter = CharCounter::new();
    let mut hasher = Sha256::new();
    while let Some(chunk) = chunks.next() {
        let chunk = chunk?;
        hasher.update(chunk.as_bytes());
        counter.update(&chunk);
        pb.set_position(chunks.bytes_read());
    }
    pb.finish_and_clear();

    let total_chars = counter.total();
    let (vocab, frequencies) = counter.finish();

    if chunks.invalid_bytes() > 0 {
        warn!(
            "dropped {} bytes of invalid UTF-8 from {}",
            chunks.invalid_bytes(),
            corpus.display()
        );
    }
    if vocab.is_empty() {
        warn!(
            "corpus {} is empty; the vocabulary has no symbols and tokenization will produce no tokens",
            corpus.display()
        );
    }
    info!(
        "vocabulary of {} symbols over {} characters",
        vocab.len(),
        total_chars
    );

    Ok(VocabReport {
        vocab,
        frequencies,
        total_chars,
        bytes_read: chunks.bytes_read(),
        invalid_bytes: chunks.invalid_bytes(),
        corpus_sha256: format!("{:x}", hasher.finalize()),
    })
}

/// Where the vocabulary pass writes its outputs.
#[derive(Debug, Clone)]
pub struct VocabArtifacts {
    pub vocab_json: PathBuf,
    pub manifest: Option<PathBuf>,
}

/// Builds the vocabulary of `corpus` and persists it, plus a manifest when one
/// is requested.
pub fn build_and_save(
    corpus: impl AsRef<Path>,
    cfg: &VocabCfg,
    artifacts: &VocabArtifacts,
) -> Result<VocabReport> {
    let report = build_vocabulary(corpus, cfg)?;
    report.vocab.save(&artifacts.vocab_json)?;
    info!("wrote vocabulary to {}", artifacts.vocab_json.display());

    if let Some(manifest_path) = artifacts.manifest.as_ref() {
        write_manifest(manifest_path, &report.manifest()?)?;
    }
    Ok(report)
}
