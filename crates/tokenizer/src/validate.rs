use crate::config::{EncodeCfg, VocabCfg};
use crate::errors::{Error, Result};
use crate::types::VocabFile;

pub fn validate_vocab_cfg(cfg: &VocabCfg) -> Result<()> {
    if cfg.chunk_size == 0 {
        return Err(Error::InvalidConfig(
            "vocab.chunk_size must be greater than zero",
        ));
    }
    Ok(())
}

pub fn validate_encode_cfg(cfg: &EncodeCfg) -> Result<()> {
    if cfg.chunk_size == 0 {
        return Err(Error::InvalidConfig(
            "encode.chunk_size must be greater than zero",
        ));
    }
    if cfg.progress_every == 0 {
        return Err(Error::InvalidConfig(
            "encode.progress_every must be greater than zero",
        ));
    }
    Ok(())
}

/// Checks that the two tables describe one dense, code-point-ordered
/// bijection and returns the symbols indexed by id.
pub(crate) fn validate_tables(file: &VocabFile) -> Result<Vec<char>> {
    if file.stoi.len() != file.itos.len() {
        return Err(Error::Validation(format!(
            "stoi has {} entries but itos has {}",
            file.stoi.len(),
            file.itos.len()
        )));
    }

    let mut symbols = Vec::with_capacity(file.itos.len());
    for (expected, (&id, symbol)) in file.itos.iter().enumerate() {
        if id as usize != expected {
            return Err(Error::Validation(format!(
                "ids are not dense: expected {expected}, found {id}"
            )));
        }
        let mut chars = symbol.chars();
        let ch = match (chars.next(), chars.next()) {
            (Some(ch), None) => ch,
            _ => {
                return Err(Error::Validation(format!(
                    "id {id} maps to {symbol:?}, which is not a single character"
                )))
            }
        };
        if let Some(&prev) = symbols.last() {
            if prev >= ch {
                return Err(Error::Validation(format!(
                    "id {id} ({ch:?}) is out of code-point order after {prev:?}"
                )));
            }
        }
        if file.stoi.get(symbol.as_str()) != Some(&id) {
            return Err(Error::Validation(format!(
                "stoi and itos disagree on {symbol:?}"
            )));
        }
        symbols.push(ch);
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(pairs: &[(u32, &str)]) -> VocabFile {
        let mut file = VocabFile::default();
        for &(id, symbol) in pairs {
            file.stoi.insert(symbol.to_string(), id);
            file.itos.insert(id, symbol.to_string());
        }
        file
    }

    #[test]
    fn accepts_ordered_dense_tables() {
        let symbols = validate_tables(&file(&[(0, "\n"), (1, "A"), (2, "é")])).unwrap();
        assert_eq!(symbols, vec!['\n', 'A', 'é']);
    }

    #[test]
    fn rejects_gaps() {
        assert!(validate_tables(&file(&[(0, "A"), (2, "B")])).is_err());
    }

    #[test]
    fn rejects_multi_character_symbols() {
        assert!(validate_tables(&file(&[(0, "AB")])).is_err());
    }

    #[test]
    fn rejects_unsorted_symbols() {
        assert!(validate_tables(&file(&[(0, "b"), (1, "a")])).is_err());
    }

    #[test]
    fn rejects_disagreeing_tables() {
        let mut tables = file(&[(0, "a"), (1, "b")]);
        tables.stoi.insert("b".to_string(), 0);
        tables.stoi.insert("a".to_string(), 1);
        assert!(validate_tables(&tables).is_err());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let cfg = EncodeCfg {
            chunk_size: 0,
            ..EncodeCfg::default()
        };
        assert!(matches!(
            validate_encode_cfg(&cfg),
            Err(Error::InvalidConfig(_))
        ));
    }
}
