//! Driver for the ABC corpus preparation pipeline: assemble records into a
//! corpus, derive a character vocabulary, encode the corpus into a token
//! array and cut it into train/validation/test splits.

pub mod config;
pub mod logging;
pub mod overrides;
pub mod report;
pub mod stages;

pub use config::{PipelineConfig, PipelineError};
pub use overrides::{apply_overrides, OverrideArg};
pub use stages::{
    run_all, run_assemble, run_split, run_stats, run_tokenize, run_vocab, PipelineSummary, Stage,
};
