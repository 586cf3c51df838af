use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provenance record written next to the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabManifest {
    /// SHA-256 of the decoded corpus text the vocabulary was built from.
    pub corpus_sha256: String,
    pub created_at: String,
    pub vocab_size: usize,
    pub total_chars: u64,
}

/// On-disk layout of the vocabulary: both directions of the mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct VocabFile {
    pub stoi: BTreeMap<String, u32>,
    pub itos: BTreeMap<u32, String>,
}
