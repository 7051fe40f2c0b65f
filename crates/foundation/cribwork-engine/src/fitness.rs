//! N-gram Fitness
//!
//! A [`FitnessModel`] is an immutable table of per-n-gram scores loaded
//! from a JSON model file. [`NgramScorer`] slides a window over text and
//! sums the table entries; higher is more English-like.
//!
//! Two table layouts are accepted:
//! - `Dense`: base-|alphabet| index, `|alphabet|^k` entries
//! - `Packed`: 5 bits per symbol, `32^k` entries

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Largest alphabet a packed table can index
pub const MAX_ALPHABET: usize = 32;

const NO_SYMBOL: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableLayout {
    Dense,
    Packed,
}

/// On-disk model format
#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    alphabet: String,
    ngram_length: usize,
    ngrams: Vec<f64>,
    #[serde(default)]
    num_ngrams: Option<u64>,
    #[serde(default)]
    max_fitness: Option<f64>,
    #[serde(default)]
    average_fitness: Option<f64>,
}

/// Immutable n-gram score table
#[derive(Debug)]
pub struct FitnessModel {
    alphabet: String,
    ngram_length: usize,
    layout: TableLayout,
    table: Vec<f64>,
    /// Symbol index per ASCII character, case-insensitive
    symbols: [u8; 128],
    /// Dense layout: `|alphabet|^(k-1)`; packed layout: bitmask of k-1 symbols
    window: usize,
    num_ngrams: Option<u64>,
    max_fitness: Option<f64>,
    average_fitness: Option<f64>,
}

impl FitnessModel {
    /// Load a model file. Missing, malformed or mis-sized files are fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&json)?;

        tracing::info!(
            path = %path.display(),
            alphabet = %model.alphabet,
            ngram_length = model.ngram_length,
            layout = ?model.layout,
            "Loaded fitness model"
        );
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(json)?;
        let mut model = Self::from_parts(&file.alphabet, file.ngram_length, file.ngrams)?;
        model.num_ngrams = file.num_ngrams;
        model.max_fitness = file.max_fitness;
        model.average_fitness = file.average_fitness;
        Ok(model)
    }

    /// Build a model from its table. The layout is inferred from the table
    /// length.
    pub fn from_parts(alphabet: &str, ngram_length: usize, table: Vec<f64>) -> Result<Self> {
        let alphabet = alphabet.to_ascii_lowercase();
        if alphabet.is_empty() || !alphabet.is_ascii() {
            return Err(Error::InvalidModel("alphabet must be non-empty ASCII".into()));
        }
        if alphabet.len() > MAX_ALPHABET {
            return Err(Error::InvalidModel(format!(
                "alphabet has {} symbols, at most {} are supported",
                alphabet.len(),
                MAX_ALPHABET
            )));
        }
        if ngram_length == 0 {
            return Err(Error::InvalidModel("ngram_length must be at least 1".into()));
        }

        let mut symbols = [NO_SYMBOL; 128];
        for (i, b) in alphabet.bytes().enumerate() {
            if symbols[b as usize] != NO_SYMBOL {
                return Err(Error::InvalidModel(format!(
                    "alphabet repeats {:?}",
                    b as char
                )));
            }
            symbols[b as usize] = i as u8;
            symbols[b.to_ascii_uppercase() as usize] = i as u8;
        }

        let size = alphabet.len();
        let dense = (size as u128).checked_pow(ngram_length as u32);
        let packed = 32u128.checked_pow(ngram_length as u32);
        let found = table.len() as u128;

        let layout = if dense == Some(found) {
            TableLayout::Dense
        } else if packed == Some(found) {
            TableLayout::Packed
        } else {
            return Err(Error::ModelMismatch {
                symbols: size,
                length: ngram_length,
                dense: dense.unwrap_or(u128::MAX),
                packed: packed.unwrap_or(u128::MAX),
                found: table.len(),
            });
        };

        let window = match layout {
            TableLayout::Dense => size.pow(ngram_length as u32 - 1),
            TableLayout::Packed => (1usize << (5 * (ngram_length - 1))) - 1,
        };

        Ok(Self {
            alphabet,
            ngram_length,
            layout,
            table,
            symbols,
            window,
            num_ngrams: None,
            max_fitness: None,
            average_fitness: None,
        })
    }

    pub fn alphabet(&self) -> &str {
        &self.alphabet
    }

    pub fn ngram_length(&self) -> usize {
        self.ngram_length
    }

    pub fn layout(&self) -> TableLayout {
        self.layout
    }

    pub fn num_ngrams(&self) -> Option<u64> {
        self.num_ngrams
    }

    pub fn max_fitness(&self) -> Option<f64> {
        self.max_fitness
    }

    pub fn average_fitness(&self) -> Option<f64> {
        self.average_fitness
    }

    /// Whether `c` belongs to the model alphabet (case-insensitive)
    pub fn contains(&self, c: char) -> bool {
        self.symbol(c).is_some()
    }

    /// Table entry for a single n-gram of exactly `ngram_length` symbols
    pub fn entry(&self, ngram: &str) -> Option<f64> {
        let mut indices = self.ngram_indices(ngram);
        let idx = indices.next()?;
        if indices.next().is_some() || ngram.chars().count() != self.ngram_length {
            return None;
        }
        self.table.get(idx).copied()
    }

    fn symbol(&self, c: char) -> Option<usize> {
        if !c.is_ascii() {
            return None;
        }
        match self.symbols[c as usize] {
            NO_SYMBOL => None,
            s => Some(s as usize),
        }
    }

    fn advance(&self, idx: usize, symbol: usize) -> usize {
        match self.layout {
            TableLayout::Dense => (idx % self.window) * self.alphabet.len() + symbol,
            TableLayout::Packed => ((idx & self.window) << 5) | symbol,
        }
    }

    /// Table index of every full window over the in-alphabet characters of
    /// `text`. Out-of-alphabet characters are skipped.
    pub(crate) fn ngram_indices<'a>(&'a self, text: &'a str) -> impl Iterator<Item = usize> + 'a {
        let mut idx = 0usize;
        let mut filled = 0usize;
        text.chars().filter_map(move |c| {
            let symbol = self.symbol(c)?;
            idx = self.advance(idx, symbol);
            filled += 1;
            (filled >= self.ngram_length).then_some(idx)
        })
    }

    /// Build a dense model from a corpus using the generator's scoring:
    /// log frequency offset by a tenth of the rarest n-gram, normalized by
    /// the expected value and scaled to integers around 1000.
    #[cfg(test)]
    pub(crate) fn train(alphabet: &str, ngram_length: usize, corpus: &str) -> Result<Self> {
        let size = alphabet.len().pow(ngram_length as u32);
        let mut model = Self::from_parts(alphabet, ngram_length, vec![0.0; size])?;

        let mut counts = vec![0u64; size];
        for idx in model.ngram_indices(corpus) {
            counts[idx] += 1;
        }
        let total: u64 = counts.iter().sum();
        let min = counts.iter().copied().filter(|&n| n > 0).min().ok_or_else(|| {
            Error::InvalidModel("corpus contains no complete n-gram".into())
        })?;

        let offset = (min as f64 / 10.0 / total as f64).ln();
        let mut values = vec![0.0; size];
        let mut norm = 0.0;
        for (value, &count) in values.iter_mut().zip(&counts) {
            if count > 0 {
                let p = count as f64 / total as f64;
                *value = p.ln() - offset;
                norm += p * *value;
            }
        }
        for value in &mut values {
            *value = (*value / norm * 1000.0).round();
        }

        model.max_fitness = values.iter().copied().reduce(f64::max);
        model.average_fitness = Some(values.iter().sum::<f64>() / size as f64);
        model.num_ngrams = Some(total);
        model.table = values;
        Ok(model)
    }
}

/// Sliding-window scorer over a shared [`FitnessModel`]
#[derive(Debug, Clone)]
pub struct NgramScorer {
    model: Arc<FitnessModel>,
}

impl NgramScorer {
    pub fn new(model: Arc<FitnessModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &FitnessModel {
        &self.model
    }

    /// Sum of table entries over every window
    pub fn score(&self, text: &str) -> f64 {
        self.accumulate(text).0
    }

    /// Mean window score divided by 10 (roughly 0-100). Zero when the text
    /// has fewer in-alphabet characters than the n-gram length.
    pub fn fitness(&self, text: &str) -> f64 {
        match self.accumulate(text) {
            (_, 0) => 0.0,
            (sum, windows) => sum / windows as f64 / 10.0,
        }
    }

    fn accumulate(&self, text: &str) -> (f64, usize) {
        let table = &self.model.table;
        self.model
            .ngram_indices(text)
            .fold((0.0, 0), |(sum, windows), idx| (sum + table[idx], windows + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{quadgram_model, CORPUS};
    use serde_json::json;

    fn bigram_scorer(layout: TableLayout) -> NgramScorer {
        let mut table = match layout {
            TableLayout::Dense => vec![0.0; 9],
            TableLayout::Packed => vec![0.0; 1024],
        };
        // "ab" and "ba"
        match layout {
            TableLayout::Dense => {
                table[1] = 500.0;
                table[3] = 300.0;
            }
            TableLayout::Packed => {
                table[1] = 500.0;
                table[32] = 300.0;
            }
        }
        let model = FitnessModel::from_parts("abc", 2, table).unwrap();
        assert_eq!(model.layout(), layout);
        NgramScorer::new(Arc::new(model))
    }

    #[test]
    fn test_layouts_score_alike() {
        for layout in [TableLayout::Dense, TableLayout::Packed] {
            let scorer = bigram_scorer(layout);
            assert_eq!(scorer.score("ab"), 500.0);
            assert_eq!(scorer.score("aba"), 800.0);
            assert_eq!(scorer.fitness("aba"), 40.0);
            assert_eq!(scorer.model().entry("BA"), Some(300.0));
        }
    }

    #[test]
    fn test_skips_foreign_characters() {
        let scorer = bigram_scorer(TableLayout::Dense);
        assert_eq!(scorer.score("A-b!"), scorer.score("ab"));
        assert_eq!(scorer.fitness("a"), 0.0);
        assert_eq!(scorer.fitness("---"), 0.0);
    }

    #[test]
    fn test_table_size_mismatch() {
        let err = FitnessModel::from_parts("abc", 2, vec![0.0; 10]).unwrap_err();
        assert!(matches!(err, Error::ModelMismatch { found: 10, dense: 9, packed: 1024, .. }));
    }

    #[test]
    fn test_invalid_alphabet() {
        assert!(FitnessModel::from_parts("", 1, vec![]).is_err());
        assert!(FitnessModel::from_parts("aA", 1, vec![0.0; 2]).is_err());
        let long: String = (0..33).map(|i| (b'!' + i) as char).collect();
        assert!(FitnessModel::from_parts(&long, 1, vec![0.0; 33]).is_err());
    }

    #[test]
    fn test_load_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bigrams.json");
        let file = json!({
            "alphabet": "ABC",
            "num_ngrams": 42,
            "max_fitness": 500,
            "average_fitness": 88.9,
            "ngram_length": 2,
            "ngrams": [0, 500, 0, 300, 0, 0, 0, 0, 0],
        });
        std::fs::write(&path, file.to_string()).unwrap();

        let model = FitnessModel::load(&path).unwrap();
        assert_eq!(model.alphabet(), "abc");
        assert_eq!(model.num_ngrams(), Some(42));
        assert_eq!(model.max_fitness(), Some(500.0));
        assert_eq!(model.layout(), TableLayout::Dense);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FitnessModel::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, Error::ModelIo { .. }));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"alphabet\": \"ab\"").unwrap();
        assert!(matches!(FitnessModel::load(&path).unwrap_err(), Error::ModelFormat(_)));
    }

    #[test]
    fn test_english_outscores_noise() {
        let scorer = NgramScorer::new(quadgram_model());
        let english = scorer.fitness(&CORPUS[200..600]);
        let noise = scorer.fitness("QXZVJKQWPZXMVBQKZJXWQPZMXKVQZJWXPQ");
        assert!(english > noise);
        assert_eq!(english, scorer.fitness(&CORPUS[200..600]));
    }
}
