use serde::{Deserialize, Serialize};

/// Bytes read from the corpus per chunk unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Options for the vocabulary pass over the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabCfg {
    pub chunk_size: usize,
    pub show_progress: bool,
}

impl Default for VocabCfg {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            show_progress: false,
        }
    }
}

/// Options for the encoding pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeCfg {
    pub chunk_size: usize,
    /// Capacity of the token array; encoding stops once it is full.
    pub total_tokens: usize,
    /// Tokens between progress log lines.
    pub progress_every: u64,
    pub show_progress: bool,
}

impl Default for EncodeCfg {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            total_tokens: 150_000_000,
            progress_every: 10_000_000,
            show_progress: false,
        }
    }
}
