use std::{
    fs,
    io::BufReader,
    path::{Path, PathBuf},
    process::Command,
};

use abc_pipeline::{run_all, run_stats, PipelineConfig};
use char_tokenizer::Vocabulary;
use tempfile::tempdir;

const CONFIG: &str = r#"
[paths]
records_dir = "tunes"
vocab_manifest = "data/vocab.manifest.json"

[assembler]
min_chars = 40

[streaming]
chunk_size = 16
show_progress = false

[tokenizer]
total_tokens = 100000
progress_every = 50

[split.sizes]
train = 60
validation = 20
test = 20
"#;

fn tune(index: usize, key: &str) -> String {
    format!("X:{index}\nT:Reel number {index}\nM:4/4\nK:{key}\n|:ABcd efge|dBGB A2:|\n")
}

fn write_project(root: &Path) -> PathBuf {
    let tunes = root.join("tunes");
    fs::create_dir_all(tunes.join("set2")).unwrap();
    fs::write(tunes.join("a.abc"), tune(1, "D")).unwrap();
    fs::write(tunes.join("set2/b.abc"), format!("\n\n{}\n", tune(2, "G"))).unwrap();
    fs::write(tunes.join("set2/c.abc"), tune(3, "Ador")).unwrap();
    fs::write(tunes.join("no_key.abc"), tune(4, "D").replace("K:D\n", "")).unwrap();
    fs::write(tunes.join("short.abc"), "X:5\nK:C\nabc\n").unwrap();
    fs::write(tunes.join("notes.txt"), tune(6, "E")).unwrap();

    let config_path = root.join("pipeline.toml");
    fs::write(&config_path, CONFIG).unwrap();
    config_path
}

fn read_npy(path: &Path) -> Vec<i32> {
    let reader = BufReader::new(fs::File::open(path).unwrap());
    npyz::NpyFile::new(reader).unwrap().into_vec::<i32>().unwrap()
}

#[test]
fn full_pipeline_produces_consistent_artifacts() {
    let dir = tempdir().unwrap();
    let config_path = write_project(dir.path());
    let config = PipelineConfig::from_path(&config_path).unwrap();

    let lengths = run_stats(&config).unwrap().expect("records have lengths");
    assert_eq!(lengths.count, 5);

    let summary = run_all(&config).unwrap();

    assert_eq!(summary.assembly.total, 5);
    assert_eq!(summary.assembly.accepted, 3);
    assert_eq!(summary.assembly.missing_marker, 1);
    assert_eq!(summary.assembly.too_short, 1);

    let corpus = fs::read_to_string(&config.paths.corpus).unwrap();
    assert!(corpus.starts_with("X:1\n"));
    assert!(corpus.ends_with("\n\nXXX_NEW_TUNE\n\n"));
    assert_eq!(corpus.matches("XXX_NEW_TUNE").count(), 3);

    assert_eq!(summary.vocab.total_chars, summary.assembly.chars_written);
    assert!(summary.encode.truncated);
    assert_eq!(summary.encode.n_written as u64, summary.assembly.chars_written);
    assert!(summary.encode.skipped.is_empty());

    let all_ids = read_npy(&config.paths.token_array);
    assert_eq!(all_ids.len(), summary.encode.n_written);

    let splits_dir = &config.paths.splits_dir;
    let train = read_npy(&splits_dir.join("train_ids.npy"));
    let val = read_npy(&splits_dir.join("val_ids.npy"));
    let test = read_npy(&splits_dir.join("test_ids.npy"));
    assert_eq!((train.len(), val.len(), test.len()), (60, 20, 20));
    assert_eq!([train, val, test].concat(), all_ids[..100]);

    let vocab = Vocabulary::load(&config.paths.vocab).unwrap();
    let ids: Vec<u32> = all_ids.iter().map(|&id| id as u32).collect();
    assert_eq!(vocab.decode(&ids).unwrap(), corpus);

    let manifest = config.paths.vocab_manifest.as_ref().unwrap();
    assert!(manifest.is_file());
}

#[test]
fn binary_runs_every_stage_and_reports_failures() {
    let dir = tempdir().unwrap();
    let config_path = write_project(dir.path());
    let bin = env!("CARGO_BIN_EXE_abc-pipeline");

    let output = Command::new(bin)
        .arg("--config")
        .arg(&config_path)
        .arg("--quiet")
        .arg("run")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("accepted"));
    assert!(stdout.contains("first 20 symbols"));
    assert!(stdout.contains("token array ->"));
    assert!(stdout.contains("train"));
    assert!(dir.path().join("data/tokenized/train_ids.npy").is_file());

    let output = Command::new(bin)
        .arg("--config")
        .arg(&config_path)
        .args(["--override", "tokenizer.total_tokens=1000000"])
        .args(["--override", "split.sizes.train=999000"])
        .arg("split")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("split failed"), "{stderr}");

    let all_ids = dir.path().join("data/tokenized/all_ids.npy");
    let before = fs::read(&all_ids).unwrap();
    let output = Command::new(bin)
        .arg("--config")
        .arg(&config_path)
        .args(["--override", "split.files.train=all_ids.npy"])
        .arg("split")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("would overwrite paths.token_array"), "{stderr}");
    assert_eq!(fs::read(&all_ids).unwrap(), before);
}

#[test]
fn missing_records_directory_aborts_assembly() {
    let dir = tempdir().unwrap();
    let config_path = write_project(dir.path());
    fs::remove_dir_all(dir.path().join("tunes")).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_abc-pipeline"))
        .arg("--config")
        .arg(&config_path)
        .arg("assemble")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("assemble failed"), "{stderr}");
    assert!(!dir.path().join("data/corpus/abc_corpus.txt").exists());
}
