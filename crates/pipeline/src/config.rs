use char_tokenizer::{EncodeCfg, VocabCfg, DEFAULT_CHUNK_SIZE};
use pretraining_data::{AssemblerConfig, SplitNames, SplitSizes};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub assembler: AssemblerConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub split: SplitConfig,
}

impl PipelineConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: PipelineConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | Some("tml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(PipelineError::ConfigFormat(format!(
                    "unsupported configuration extension '{}'",
                    other
                )));
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.apply_base_path(base_dir);
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut errors = Vec::new();

        for problem in self.assembler.problems() {
            errors.push(format!("assembler: {problem}"));
        }

        if self.streaming.chunk_size == 0 {
            errors.push("streaming.chunk_size must be greater than 0".to_string());
        }

        if self.tokenizer.progress_every == 0 {
            errors.push("tokenizer.progress_every must be greater than 0".to_string());
        }

        match self.split.sizes.required() {
            None => errors.push("split sizes overflow".to_string()),
            Some(required) if required > self.tokenizer.total_tokens as u64 => {
                errors.push(format!(
                    "split sizes require {} tokens but tokenizer.total_tokens is {}",
                    required, self.tokenizer.total_tokens
                ));
            }
            Some(_) => {}
        }

        let files = &self.split.files;
        for (key, name) in [
            ("train", &files.train),
            ("validation", &files.validation),
            ("test", &files.test),
        ] {
            if name.is_empty() {
                errors.push(format!("split.files.{key} must not be empty"));
            } else if self.paths.splits_dir.join(name) == self.paths.token_array {
                errors.push(format!("split.files.{key} would overwrite paths.token_array"));
            }
        }
        if files.train == files.validation
            || files.train == files.test
            || files.validation == files.test
        {
            errors.push("split.files must name three distinct files".to_string());
        }

        for (key, path) in [
            ("paths.corpus", &self.paths.corpus),
            ("paths.vocab", &self.paths.vocab),
            ("paths.token_array", &self.paths.token_array),
        ] {
            if path.as_os_str().is_empty() {
                errors.push(format!("{key} must not be empty"));
            }
        }

        if !errors.is_empty() {
            return Err(PipelineError::validation(errors));
        }

        Ok(())
    }

    fn apply_base_path(&mut self, base: &Path) {
        self.paths.apply_base_path(base);
    }

    pub fn vocab_cfg(&self) -> VocabCfg {
        VocabCfg {
            chunk_size: self.streaming.chunk_size,
            show_progress: self.streaming.show_progress,
        }
    }

    pub fn encode_cfg(&self) -> EncodeCfg {
        EncodeCfg {
            chunk_size: self.streaming.chunk_size,
            total_tokens: self.tokenizer.total_tokens,
            progress_every: self.tokenizer.progress_every,
            show_progress: self.streaming.show_progress,
        }
    }
}

/// Locations of every stage input and output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,
    #[serde(default = "default_corpus")]
    pub corpus: PathBuf,
    #[serde(default = "default_vocab")]
    pub vocab: PathBuf,
    #[serde(default)]
    pub vocab_manifest: Option<PathBuf>,
    #[serde(default = "default_token_array")]
    pub token_array: PathBuf,
    #[serde(default = "default_splits_dir")]
    pub splits_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            records_dir: default_records_dir(),
            corpus: default_corpus(),
            vocab: default_vocab(),
            vocab_manifest: None,
            token_array: default_token_array(),
            splits_dir: default_splits_dir(),
        }
    }
}

impl PathsConfig {
    fn apply_base_path(&mut self, base: &Path) {
        for path in [
            &mut self.records_dir,
            &mut self.corpus,
            &mut self.vocab,
            &mut self.token_array,
            &mut self.splits_dir,
        ] {
            absolutize_in_place(path, base);
        }
        if let Some(path) = self.vocab_manifest.as_mut() {
            absolutize_in_place(path, base);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Bytes per corpus read in the vocabulary and encoding passes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            show_progress: default_show_progress(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default = "default_total_tokens")]
    pub total_tokens: usize,
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_total_tokens(),
            progress_every: default_progress_every(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default)]
    pub sizes: SplitSizes,
    #[serde(default)]
    pub files: SplitNames,
}

fn absolutize_in_place(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("data/abc")
}

fn default_corpus() -> PathBuf {
    PathBuf::from("data/corpus/abc_corpus.txt")
}

fn default_vocab() -> PathBuf {
    PathBuf::from("data/tokenized/vocab.json")
}

fn default_token_array() -> PathBuf {
    PathBuf::from("data/tokenized/all_ids.npy")
}

fn default_splits_dir() -> PathBuf {
    PathBuf::from("data/tokenized")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_show_progress() -> bool {
    true
}

fn default_total_tokens() -> usize {
    EncodeCfg::default().total_tokens
}

fn default_progress_every() -> u64 {
    EncodeCfg::default().progress_every
}

#[derive(Debug)]
pub enum PipelineError {
    Io(std::io::Error),
    ConfigFormat(String),
    Validation(Vec<String>),
    Stage {
        stage: &'static str,
        message: String,
    },
}

impl PipelineError {
    pub fn validation(messages: Vec<String>) -> Self {
        Self::Validation(messages)
    }

    pub fn stage(stage: &'static str, err: impl fmt::Display) -> Self {
        Self::Stage {
            stage,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Io(err) => write!(f, "failed to read config: {}", err),
            PipelineError::ConfigFormat(err) => write!(f, "failed to parse config: {}", err),
            PipelineError::Validation(messages) => {
                write!(f, "invalid configuration: {}", messages.join("; "))
            }
            PipelineError::Stage { stage, message } => write!(f, "{} failed: {}", stage, message),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Io(err) => Some(err),
            PipelineError::ConfigFormat(_)
            | PipelineError::Validation(_)
            | PipelineError::Stage { .. } => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        PipelineError::Io(value)
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(value: toml::de::Error) -> Self {
        PipelineError::ConfigFormat(value.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(value: serde_json::Error) -> Self {
        PipelineError::ConfigFormat(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_defaults_fill_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(
            &path,
            r#"
[paths]
records_dir = "tunes"

[tokenizer]
total_tokens = 1000

[split.sizes]
train = 800
validation = 100
test = 100
"#,
        )
        .unwrap();

        let config = PipelineConfig::from_path(&path).unwrap();
        assert_eq!(config.paths.records_dir, dir.path().join("tunes"));
        assert_eq!(
            config.paths.corpus,
            dir.path().join("data/corpus/abc_corpus.txt")
        );
        assert_eq!(
            config.paths.token_array,
            dir.path().join("data/tokenized/all_ids.npy")
        );
        assert_eq!(config.assembler.min_chars, 400);
        assert_eq!(config.streaming.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.split.files.validation, "val_ids.npy");
        assert_eq!(config.encode_cfg().total_tokens, 1000);
    }

    #[test]
    fn json_config_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(
            &path,
            r#"{"assembler": {"min_chars": 10, "decode_policy": "ignore_invalid"},
                "tokenizer": {"total_tokens": 30},
                "split": {"sizes": {"train": 10, "validation": 10, "test": 10}}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_path(&path).unwrap();
        assert_eq!(config.assembler.min_chars, 10);
        assert_eq!(
            config.assembler.decode_policy,
            pretraining_data::DecodePolicy::IgnoreInvalid
        );
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut config = PipelineConfig::default();
        config.assembler.min_chars = 10;
        config.assembler.max_chars = 5;
        config.streaming.chunk_size = 0;
        config.tokenizer.total_tokens = 10;

        match config.validate() {
            Err(PipelineError::Validation(messages)) => {
                assert_eq!(messages.len(), 3, "{messages:?}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn assembler_rules_come_from_the_library() {
        let mut config = PipelineConfig::default();
        config.assembler.separator.clear();
        config.assembler.required_markers.push(String::new());

        match config.validate() {
            Err(PipelineError::Validation(messages)) => {
                let expected: Vec<String> = config
                    .assembler
                    .problems()
                    .into_iter()
                    .map(|problem| format!("assembler: {problem}"))
                    .collect();
                assert_eq!(expected.len(), 2);
                assert_eq!(messages, expected);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn split_file_may_not_replace_the_token_array() {
        let mut config = PipelineConfig::default();
        config.split.files.validation = "all_ids.npy".to_string();

        match config.validate() {
            Err(PipelineError::Validation(messages)) => {
                assert_eq!(
                    messages,
                    vec!["split.files.validation would overwrite paths.token_array".to_string()]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        config.paths.splits_dir = PathBuf::from("data/splits");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        fs::write(&path, "paths: {}").unwrap();
        assert!(matches!(
            PipelineConfig::from_path(&path),
            Err(PipelineError::ConfigFormat(_))
        ));
    }
}
