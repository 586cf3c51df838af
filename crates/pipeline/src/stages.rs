//! One function per pipeline stage. Each stage reads the previous stage's
//! artifacts from the configured paths and returns its report.

use std::fmt;

use char_tokenizer::{
    build_and_save, encode_corpus, EncodeReport, VocabArtifacts, VocabReport, Vocabulary,
};
use log::info;
use pretraining_data::{
    assemble_corpus, record_lengths, split_token_array, AssemblyStats, LengthStats,
    RecordDirectory, SplitReport,
};

use crate::config::{PipelineConfig, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Assemble,
    Stats,
    Vocab,
    Tokenize,
    Split,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Assemble => "assemble",
            Stage::Stats => "stats",
            Stage::Vocab => "vocab",
            Stage::Tokenize => "tokenize",
            Stage::Split => "split",
        }
    }

    fn fail(self, err: impl fmt::Display) -> PipelineError {
        PipelineError::stage(self.name(), err)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn run_assemble(config: &PipelineConfig) -> Result<AssemblyStats, PipelineError> {
    let stage = Stage::Assemble;
    info!(
        "assembling {} into {}",
        config.paths.records_dir.display(),
        config.paths.corpus.display()
    );
    assemble_corpus(&config.paths.records_dir, &config.paths.corpus, &config.assembler)
        .map_err(|err| stage.fail(err))
}

/// Length distribution of the raw records, before filtering.
pub fn run_stats(config: &PipelineConfig) -> Result<Option<LengthStats>, PipelineError> {
    let stage = Stage::Stats;
    let records = RecordDirectory::new(&config.paths.records_dir, &config.assembler.extension)
        .and_then(|dir| dir.stream())
        .map_err(|err| stage.fail(err))?;
    let lengths = record_lengths(records, config.assembler.decode_policy);
    Ok(LengthStats::from_lengths(lengths))
}

pub fn run_vocab(config: &PipelineConfig) -> Result<VocabReport, PipelineError> {
    let stage = Stage::Vocab;
    let artifacts = VocabArtifacts {
        vocab_json: config.paths.vocab.clone(),
        manifest: config.paths.vocab_manifest.clone(),
    };
    build_and_save(&config.paths.corpus, &config.vocab_cfg(), &artifacts)
        .map_err(|err| stage.fail(err))
}

pub fn run_tokenize(config: &PipelineConfig) -> Result<EncodeReport, PipelineError> {
    let stage = Stage::Tokenize;
    let vocab = Vocabulary::load(&config.paths.vocab).map_err(|err| stage.fail(err))?;
    encode_corpus(
        &config.paths.corpus,
        &vocab,
        &config.paths.token_array,
        &config.encode_cfg(),
    )
    .map_err(|err| stage.fail(err))
}

pub fn run_split(config: &PipelineConfig) -> Result<SplitReport, PipelineError> {
    let stage = Stage::Split;
    split_token_array(
        &config.paths.token_array,
        &config.paths.splits_dir,
        &config.split.sizes,
        &config.split.files,
    )
    .map_err(|err| stage.fail(err))
}

/// Reports of a full run, in stage order.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub assembly: AssemblyStats,
    pub vocab: VocabReport,
    pub encode: EncodeReport,
    pub split: SplitReport,
}

/// Runs assemble, vocab, tokenize and split in order, stopping at the first
/// failure.
pub fn run_all(config: &PipelineConfig) -> Result<PipelineSummary, PipelineError> {
    let assembly = run_assemble(config)?;
    let vocab = run_vocab(config)?;
    let encode = run_tokenize(config)?;
    let split = run_split(config)?;
    Ok(PipelineSummary {
        assembly,
        vocab,
        encode,
        split,
    })
}
