use crate::errors::{context, Error, Result};
use crate::types::{VocabFile, VocabManifest};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const VOCAB_JSON_ERR: &str = "vocab json not found at";
const MANIFEST_ERR: &str = "manifest not found at";

pub(crate) fn write_vocab_file(path: &Path, file: &VocabFile) -> Result<()> {
    write_json(path, file)
}

pub(crate) fn read_vocab_file(path: &Path) -> Result<VocabFile> {
    ensure_file(path, VOCAB_JSON_ERR)?;
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|err| {
        Error::Validation(format!("malformed vocabulary {}: {err}", path.display()))
    })
}

pub fn write_manifest(manifest_path: &Path, manifest: &VocabManifest) -> Result<()> {
    write_json(manifest_path, manifest)
}

pub fn read_manifest(manifest_path: &Path) -> Result<VocabManifest> {
    ensure_file(manifest_path, MANIFEST_ERR)?;
    let file = File::open(manifest_path)?;
    let reader = BufReader::new(file);
    let manifest = serde_json::from_reader(reader)?;
    Ok(manifest)
}

/// `unix:<seconds>` stamp used in manifests.
pub(crate) fn timestamp() -> Result<String> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| context(format!("failed to compute timestamp: {e}")))?
        .as_secs();
    Ok(format!("unix:{secs}"))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn ensure_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(context(format!("{what} {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/vocab.manifest.json");
        let manifest = VocabManifest {
            corpus_sha256: "ab".repeat(32),
            created_at: timestamp().unwrap(),
            vocab_size: 42,
            total_chars: 1_000,
        };

        write_manifest(&path, &manifest).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), manifest);
    }

    #[test]
    fn missing_manifest_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
