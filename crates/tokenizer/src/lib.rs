//! Character-level tokenization for ABC corpora.
//!
//! The vocabulary is derived from a single streaming pass over the corpus:
//! every distinct character gets an id equal to its rank in code-point order.
//! A second pass ([`encode_corpus`]) maps the corpus to ids and writes them
//! into a fixed-capacity memory-mapped token array, truncating the array when
//! the corpus runs out before the capacity is reached.
//!
//! # Artifacts
//!
//! The vocabulary is stored as JSON with `stoi` and `itos` tables. An optional
//! manifest records the SHA-256 of the corpus text it was built from, the
//! vocabulary size and the character count.

pub mod artifacts;
pub mod config;
pub mod encoder;
pub mod errors;
pub mod types;
pub mod validate;
pub mod vocab;

mod progress;

pub use config::{EncodeCfg, VocabCfg, DEFAULT_CHUNK_SIZE};
pub use encoder::{encode_corpus, EncodeReport};
pub use errors::{Error, Result};
pub use types::VocabManifest;
pub use vocab::{
    build_and_save, build_vocabulary, CharCounter, VocabArtifacts, VocabReport, Vocabulary,
};
