use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::token_array::{write_ids, TokenArray};

/// Element counts of the three contiguous splits, taken in order from the
/// front of the token array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSizes {
    pub train: u64,
    pub validation: u64,
    pub test: u64,
}

impl Default for SplitSizes {
    fn default() -> Self {
        Self {
            train: 100_000_000,
            validation: 25_000_000,
            test: 25_000_000,
        }
    }
}

impl SplitSizes {
    /// Total number of tokens the three splits consume.
    pub fn required(&self) -> Option<u64> {
        self.train
            .checked_add(self.validation)?
            .checked_add(self.test)
    }

    fn ranges(&self) -> [(SplitKind, std::ops::Range<usize>); 3] {
        let train_end = self.train as usize;
        let val_end = train_end + self.validation as usize;
        let test_end = val_end + self.test as usize;
        [
            (SplitKind::Train, 0..train_end),
            (SplitKind::Validation, train_end..val_end),
            (SplitKind::Test, val_end..test_end),
        ]
    }
}

/// File names the splits are written under inside the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitNames {
    pub train: String,
    pub validation: String,
    pub test: String,
}

impl Default for SplitNames {
    fn default() -> Self {
        Self {
            train: "train_ids.npy".to_string(),
            validation: "val_ids.npy".to_string(),
            test: "test_ids.npy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    Train,
    Validation,
    Test,
}

impl SplitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Validation => "validation",
            SplitKind::Test => "test",
        }
    }

    pub const ALL: [SplitKind; 3] = [SplitKind::Train, SplitKind::Validation, SplitKind::Test];

    fn file_name<'a>(&self, names: &'a SplitNames) -> &'a str {
        match self {
            SplitKind::Train => &names.train,
            SplitKind::Validation => &names.validation,
            SplitKind::Test => &names.test,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFile {
    pub kind: SplitKind,
    pub path: PathBuf,
    pub start: u64,
    pub len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub source_len: u64,
    pub splits: Vec<SplitFile>,
    /// Tokens past the test split that no split includes.
    pub unused: u64,
}

/// Writes the train, validation and test prefixes of `source` into
/// `destination`. Fails without writing anything when the array holds fewer
/// tokens than the splits require, or when a split would replace `source`.
/// Outputs are staged under temporary names and only renamed into place once
/// every split has been written.
pub fn split_token_array(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    sizes: &SplitSizes,
    names: &SplitNames,
) -> Result<SplitReport> {
    let source = source.as_ref();
    let destination = destination.as_ref();

    let required = sizes
        .required()
        .ok_or(Error::InvalidConfig("split sizes overflow"))?;
    let array = TokenArray::open(source)?;
    let available = array.len() as u64;
    if available < required {
        return Err(Error::InsufficientTokens {
            available,
            required,
        });
    }

    if [&names.train, &names.validation, &names.test]
        .iter()
        .any(|name| name.is_empty())
    {
        return Err(Error::InvalidConfig("split file names must not be empty"));
    }
    if names.train == names.validation
        || names.train == names.test
        || names.validation == names.test
    {
        return Err(Error::InvalidConfig("split file names must be distinct"));
    }

    let source_path = fs::canonicalize(source)?;
    for kind in SplitKind::ALL {
        let target = destination.join(kind.file_name(names));
        if fs::canonicalize(&target).is_ok_and(|target| target == source_path) {
            return Err(Error::InvalidConfig(
                "a split output path names the source token array",
            ));
        }
    }

    fs::create_dir_all(destination)?;

    let mut staged: Vec<(PathBuf, SplitFile)> = Vec::with_capacity(3);
    let outcome = (|| -> Result<()> {
        for (kind, range) in sizes.ranges() {
            let path = destination.join(kind.file_name(names));
            let tmp_path = path.with_extension("npy.tmp");
            let len = range.len();
            let start = range.start as u64;
            write_ids(&tmp_path, len, array.range(range))?;
            staged.push((
                tmp_path,
                SplitFile {
                    kind,
                    path,
                    start,
                    len: len as u64,
                },
            ));
        }
        for (tmp_path, split) in &staged {
            fs::rename(tmp_path, &split.path)?;
        }
        Ok(())
    })();

    if let Err(err) = outcome {
        for (tmp_path, _) in &staged {
            let _ = fs::remove_file(tmp_path);
        }
        return Err(err);
    }

    let splits: Vec<SplitFile> = staged.into_iter().map(|(_, split)| split).collect();
    for split in &splits {
        info!(
            "{} split: {} tokens [{}, {}) -> {}",
            split.kind.as_str(),
            split.len,
            split.start,
            split.start + split.len,
            split.path.display()
        );
    }

    let unused = available - required;
    if unused > 0 {
        warn!("{unused} tokens beyond the test split are not used by any split");
    }

    Ok(SplitReport {
        source_len: available,
        splits,
        unused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_array::write_tokens;

    fn sizes(train: u64, validation: u64, test: u64) -> SplitSizes {
        SplitSizes {
            train,
            validation,
            test,
        }
    }

    #[test]
    fn splits_are_contiguous_prefix_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("all_ids.npy");
        let tokens: Vec<u32> = (0..12).collect();
        write_tokens(&source, &tokens).unwrap();

        let out = dir.path().join("splits");
        let report =
            split_token_array(&source, &out, &sizes(5, 3, 2), &SplitNames::default()).unwrap();

        assert_eq!(report.source_len, 12);
        assert_eq!(report.unused, 2);

        let train = TokenArray::open(out.join("train_ids.npy")).unwrap().to_vec();
        let val = TokenArray::open(out.join("val_ids.npy")).unwrap().to_vec();
        let test = TokenArray::open(out.join("test_ids.npy")).unwrap().to_vec();
        assert_eq!(train, vec![0, 1, 2, 3, 4]);
        assert_eq!(val, vec![5, 6, 7]);
        assert_eq!(test, vec![8, 9]);

        let joined: Vec<u32> = [train, val, test].concat();
        assert_eq!(joined, tokens[..10]);
    }

    #[test]
    fn exact_fit_uses_every_token() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("all_ids.npy");
        write_tokens(&source, &[3, 1, 4, 1, 5, 9]).unwrap();

        let report =
            split_token_array(&source, dir.path(), &sizes(4, 1, 1), &SplitNames::default())
                .unwrap();
        assert_eq!(report.unused, 0);
        let lens: Vec<u64> = report.splits.iter().map(|s| s.len).collect();
        assert_eq!(lens, vec![4, 1, 1]);
    }

    #[test]
    fn empty_splits_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("all_ids.npy");
        write_tokens(&source, &[7, 8]).unwrap();

        split_token_array(&source, dir.path(), &sizes(2, 0, 0), &SplitNames::default()).unwrap();
        assert!(TokenArray::open(dir.path().join("val_ids.npy"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn insufficient_tokens_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("all_ids.npy");
        write_tokens(&source, &(0..9).collect::<Vec<u32>>()).unwrap();

        let out = dir.path().join("splits");
        let err = split_token_array(&source, &out, &sizes(5, 3, 2), &SplitNames::default())
            .err()
            .unwrap();

        assert!(matches!(
            err,
            Error::InsufficientTokens {
                available: 9,
                required: 10
            }
        ));
        assert!(!out.exists());
    }

    #[test]
    fn split_named_after_the_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("all_ids.npy");
        write_tokens(&source, &(0..10).collect::<Vec<u32>>()).unwrap();

        let names = SplitNames {
            train: "all_ids.npy".to_string(),
            ..SplitNames::default()
        };
        let err = split_token_array(&source, dir.path(), &sizes(2, 2, 2), &names)
            .err()
            .unwrap();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(TokenArray::open(&source).unwrap().len(), 10);
        assert!(!dir.path().join("val_ids.npy").exists());
    }

    #[test]
    fn source_reached_through_another_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tokens/all_ids.npy");
        write_tokens(&source, &[1, 2, 3, 4]).unwrap();

        let destination = dir.path().join("tokens/../tokens");
        let names = SplitNames {
            test: "all_ids.npy".to_string(),
            ..SplitNames::default()
        };
        let err = split_token_array(&source, &destination, &sizes(1, 1, 1), &names)
            .err()
            .unwrap();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(TokenArray::open(&source).unwrap().to_vec(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn default_sizes_take_one_hundred_fifty_million_tokens() {
        let sizes = SplitSizes::default();
        assert_eq!(
            (sizes.train, sizes.validation, sizes.test),
            (100_000_000, 25_000_000, 25_000_000)
        );
        assert_eq!(sizes.required(), Some(150_000_000));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("all_ids.npy");
        write_tokens(&source, &[1, 2, 3]).unwrap();

        let names = SplitNames {
            test: "train_ids.npy".to_string(),
            ..SplitNames::default()
        };
        let err = split_token_array(&source, dir.path(), &sizes(1, 1, 1), &names)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
