//! Corpus preparation primitives for ABC notation datasets.
//!
//! Records on disk are filtered and concatenated into a single corpus file
//! ([`preprocessing`]), the corpus is streamed back in bounded chunks
//! ([`corpora`]), and token ids live in memory-mapped `.npy` arrays
//! ([`token_array`]) that are cut into train/validation/test splits
//! ([`sharding`]).

pub mod corpora;
pub mod errors;
pub mod preprocessing;
pub mod sharding;
pub mod stats;
pub mod token_array;

pub use corpora::{CorpusChunks, Record, RecordDirectory, RecordError, RecordResult};
pub use errors::{Error, Result};
pub use preprocessing::{
    assemble, assemble_corpus, AssemblerConfig, AssemblyStats, DecodePolicy, Verdict,
    DEFAULT_SEPARATOR,
};
pub use sharding::{split_token_array, SplitFile, SplitKind, SplitNames, SplitReport, SplitSizes};
pub use stats::{record_lengths, LengthStats};
pub use token_array::{write_tokens, FinishedArray, TokenArray, TokenArrayWriter, TokenId};
