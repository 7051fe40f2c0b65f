//! Annealing Key Search
//!
//! Fitness-guided local search over permutation keys. A proposal perturbs
//! a copy of the current key; better or equal proposals are always kept,
//! worse ones with probability `exp(delta / T) - fudge` while the
//! temperature is positive. The best key is tracked separately.

use crate::ciphers::{self, Cipher, PLAYFAIR_ALPHABET};
use crate::fitness::NgramScorer;
use crate::{Error, Result};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Annealing schedule and stopping rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Proposals per temperature level
    pub iterations: usize,
    pub temperature: f64,
    /// Temperature decrement between levels
    pub step: f64,
    pub fudge: f64,
    /// Stop once the best fitness reaches this value
    pub threshold: f64,
}

impl SearchParams {
    pub const PLAYFAIR: SearchParams = SearchParams {
        iterations: 3000,
        temperature: 30.0,
        step: 0.2,
        fudge: 0.75,
        threshold: 95.0,
    };

    pub const SUBSTITUTION: SearchParams = SearchParams {
        iterations: 2000,
        temperature: 10.0,
        step: 0.5,
        fudge: 0.75,
        threshold: 95.0,
    };

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::InvalidParameters("iterations must be > 0".into()));
        }
        if !(self.temperature > 0.0 && self.temperature.is_finite()) {
            return Err(Error::InvalidParameters(format!(
                "temperature must be > 0, got {}",
                self.temperature
            )));
        }
        if !(self.step > 0.0 && self.step.is_finite()) {
            return Err(Error::InvalidParameters(format!("step must be > 0, got {}", self.step)));
        }
        if !(self.fudge >= 0.0 && self.fudge.is_finite()) {
            return Err(Error::InvalidParameters(format!("fudge must be >= 0, got {}", self.fudge)));
        }
        if self.threshold.is_nan() {
            return Err(Error::InvalidParameters("threshold must be a number".into()));
        }
        Ok(())
    }

    /// Temperature levels from `temperature` down to 0 inclusive
    pub fn levels(&self) -> usize {
        (self.temperature / self.step + 1e-9).floor() as usize + 1
    }

    fn temperature_at(&self, level: usize) -> f64 {
        (self.temperature - level as f64 * self.step).max(0.0)
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::PLAYFAIR
    }
}

/// A key the searcher can perturb and decrypt with
pub trait SearchKey: Clone + fmt::Display {
    /// Replace `self` with a random neighbour
    fn perturb<R: Rng>(&mut self, rng: &mut R);

    fn decrypt(&self, ciphertext: &str) -> String;
}

// ═══════════════════════════════════════════════════════════
// SUBSTITUTION KEYS
// ═══════════════════════════════════════════════════════════

/// Cipher alphabet for a simple substitution: plaintext symbol `i` of the
/// alphabet encrypts to `key[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionKey {
    alphabet: Vec<u8>,
    key: Vec<u8>,
    /// Plaintext symbol for each cipher symbol, 0 when unmapped
    decode: [u8; 128],
}

impl SubstitutionKey {
    pub fn identity(alphabet: &str) -> Result<Self> {
        Self::from_key(alphabet, alphabet)
    }

    pub fn random<R: Rng>(alphabet: &str, rng: &mut R) -> Result<Self> {
        let mut key = Self::identity(alphabet)?;
        key.key.shuffle(rng);
        key.rebuild();
        Ok(key)
    }

    /// `key` must be a permutation of `alphabet` (case-insensitive)
    pub fn from_key(alphabet: &str, key: &str) -> Result<Self> {
        let alphabet = alphabet.to_ascii_lowercase();
        let key = key.to_ascii_lowercase();
        if !alphabet.is_ascii() || alphabet.is_empty() {
            return Err(Error::InvalidKey("alphabet must be non-empty ASCII".into()));
        }
        // Validates the permutation
        Cipher::substitution_decrypt("", &alphabet, &key)?;

        let mut sub = Self {
            alphabet: alphabet.into_bytes(),
            key: key.into_bytes(),
            decode: [0; 128],
        };
        sub.rebuild();
        Ok(sub)
    }

    pub fn alphabet(&self) -> String {
        String::from_utf8_lossy(&self.alphabet).into_owned()
    }

    pub fn key(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }

    fn rebuild(&mut self) {
        self.decode = [0; 128];
        for (&plain, &cipher) in self.alphabet.iter().zip(&self.key) {
            self.decode[cipher as usize] = plain;
        }
    }
}

impl SearchKey for SubstitutionKey {
    fn perturb<R: Rng>(&mut self, rng: &mut R) {
        if self.key.len() < 2 {
            return;
        }
        let picked = index::sample(rng, self.key.len(), 2);
        let (a, b) = (picked.index(0), picked.index(1));
        self.key.swap(a, b);
        self.decode[self.key[a] as usize] = self.alphabet[a];
        self.decode[self.key[b] as usize] = self.alphabet[b];
    }

    fn decrypt(&self, ciphertext: &str) -> String {
        ciphertext
            .chars()
            .map(|c| {
                if !c.is_ascii() {
                    return c;
                }
                match self.decode[c.to_ascii_lowercase() as usize] {
                    0 => c,
                    plain if c.is_ascii_uppercase() => plain.to_ascii_uppercase() as char,
                    plain => plain as char,
                }
            })
            .collect()
    }
}

impl fmt::Display for SubstitutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// ═══════════════════════════════════════════════════════════
// PLAYFAIR GRIDS
// ═══════════════════════════════════════════════════════════

/// 5x5 Playfair key square, row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayfairGrid {
    cells: [u8; 25],
}

impl PlayfairGrid {
    /// Alphabetical grid without J
    pub fn standard() -> Self {
        let mut cells = [0u8; 25];
        cells.copy_from_slice(PLAYFAIR_ALPHABET.as_bytes());
        Self { cells }
    }

    pub fn from_keyword(keyword: &str) -> Result<Self> {
        Self::from_cells(&Cipher::playfair_grid(keyword))
    }

    /// 25 distinct letters without J, row-major
    pub fn from_cells(cells: &str) -> Result<Self> {
        Ok(Self {
            cells: ciphers::grid_bytes(cells)?,
        })
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut grid = Self::standard();
        grid.cells.shuffle(rng);
        grid
    }

    pub fn cells(&self) -> String {
        String::from_utf8_lossy(&self.cells).into_owned()
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        for col in 0..5 {
            self.cells.swap(a * 5 + col, b * 5 + col);
        }
    }

    fn swap_cols(&mut self, a: usize, b: usize) {
        for row in 0..5 {
            self.cells.swap(row * 5 + a, row * 5 + b);
        }
    }

    fn mirror_rows(&mut self) {
        self.swap_rows(0, 4);
        self.swap_rows(1, 3);
    }

    fn mirror_cols(&mut self) {
        self.swap_cols(0, 4);
        self.swap_cols(1, 3);
    }
}

impl SearchKey for PlayfairGrid {
    /// Mostly a two-letter swap; one time in ten a row, column or mirror move.
    fn perturb<R: Rng>(&mut self, rng: &mut R) {
        match rng.gen_range(0..50) {
            0 => {
                let rows = index::sample(rng, 5, 2);
                self.swap_rows(rows.index(0), rows.index(1));
            }
            1 => {
                let cols = index::sample(rng, 5, 2);
                self.swap_cols(cols.index(0), cols.index(1));
            }
            2 => {
                self.mirror_cols();
                self.mirror_rows();
            }
            3 => self.mirror_cols(),
            4 => self.mirror_rows(),
            _ => {
                let cells = index::sample(rng, 25, 2);
                self.cells.swap(cells.index(0), cells.index(1));
            }
        }
    }

    /// Digram decryption with filler letters removed
    fn decrypt(&self, ciphertext: &str) -> String {
        let letters = ciphers::playfair_letters(ciphertext);
        Cipher::playfair_strip_fillers(&ciphers::playfair_decrypt_letters(&self.cells, &letters))
    }
}

impl fmt::Display for PlayfairGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cells())
    }
}

// ═══════════════════════════════════════════════════════════
// SEARCH
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SearchOutcome<K> {
    pub key: K,
    pub plaintext: String,
    pub fitness: f64,
    pub evaluations: usize,
    /// Best fitness at the start and after each temperature level
    pub best_trace: Vec<f64>,
}

pub struct PermutationKeySearcher {
    scorer: NgramScorer,
    params: SearchParams,
}

impl PermutationKeySearcher {
    pub fn new(scorer: NgramScorer, params: SearchParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { scorer, params })
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn search<K: SearchKey, R: Rng>(&self, ciphertext: &str, initial: K, rng: &mut R) -> SearchOutcome<K> {
        let params = &self.params;
        let mut current = initial;
        let mut current_fitness = self.scorer.fitness(&current.decrypt(ciphertext));
        let mut best = current.clone();
        let mut best_fitness = current_fitness;
        let mut evaluations = 1;
        let mut best_trace = vec![best_fitness];

        'levels: for level in 0..params.levels() {
            if best_fitness >= params.threshold {
                break;
            }
            let temperature = params.temperature_at(level);

            for _ in 0..params.iterations {
                let mut candidate = current.clone();
                candidate.perturb(rng);
                let fitness = self.scorer.fitness(&candidate.decrypt(ciphertext));
                evaluations += 1;

                let delta = fitness - current_fitness;
                let accept = delta >= 0.0
                    || (temperature > 0.0
                        && (delta / temperature).exp() - params.fudge > rng.gen::<f64>());
                if !accept {
                    continue;
                }

                current = candidate;
                current_fitness = fitness;
                if current_fitness > best_fitness {
                    best = current.clone();
                    best_fitness = current_fitness;
                    if best_fitness >= params.threshold {
                        best_trace.push(best_fitness);
                        break 'levels;
                    }
                }
            }

            best_trace.push(best_fitness);
            tracing::trace!(level, temperature, best_fitness, key = %best, "Temperature level done");
        }

        tracing::debug!(evaluations, fitness = best_fitness, key = %best, "Key search finished");

        SearchOutcome {
            plaintext: best.decrypt(ciphertext),
            key: best,
            fitness: best_fitness,
            evaluations,
            best_trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{playfair_quadgram_model, quadgram_model, CORPUS};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quick(threshold: f64) -> SearchParams {
        SearchParams {
            iterations: 200,
            temperature: 4.0,
            step: 1.0,
            fudge: 0.75,
            threshold,
        }
    }

    #[test]
    fn test_validate() {
        assert!(SearchParams::PLAYFAIR.validate().is_ok());
        assert!(SearchParams::SUBSTITUTION.validate().is_ok());
        for params in [
            SearchParams { iterations: 0, ..quick(95.0) },
            SearchParams { temperature: 0.0, ..quick(95.0) },
            SearchParams { step: -1.0, ..quick(95.0) },
            SearchParams { fudge: -0.1, ..quick(95.0) },
            SearchParams { threshold: f64::NAN, ..quick(95.0) },
        ] {
            assert!(matches!(params.validate(), Err(Error::InvalidParameters(_))));
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(SearchParams::PLAYFAIR.levels(), 151);
        assert_eq!(quick(95.0).levels(), 5);
        assert_eq!(quick(95.0).temperature_at(4), 0.0);
    }

    #[test]
    fn test_substitution_key() {
        let alphabet = "abcdefghijklmnopqrstuvwxyz";
        let cipher_alphabet = Cipher::keyword_alphabet("cribwork", alphabet).unwrap();
        let key = SubstitutionKey::from_key(alphabet, &cipher_alphabet).unwrap();
        let ciphertext = Cipher::substitution_encrypt("Rain, then Wind.", alphabet, &cipher_alphabet).unwrap();
        assert_eq!(key.decrypt(&ciphertext), "Rain, then Wind.");
        assert_eq!(key.to_string(), cipher_alphabet);
        assert!(SubstitutionKey::from_key(alphabet, "abc").is_err());
    }

    #[test]
    fn test_substitution_perturb_keeps_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let alphabet = "abcdefghijklmnopqrstuvwxyz";
        let mut key = SubstitutionKey::random(alphabet, &mut rng).unwrap();
        for _ in 0..100 {
            key.perturb(&mut rng);
        }
        let rebuilt = SubstitutionKey::from_key(alphabet, &key.key()).unwrap();
        assert_eq!(rebuilt, key);
    }

    #[test]
    fn test_playfair_perturb_keeps_grid() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut grid = PlayfairGrid::random(&mut rng);
        for _ in 0..500 {
            grid.perturb(&mut rng);
        }
        assert!(PlayfairGrid::from_cells(&grid.cells()).is_ok());
    }

    #[test]
    fn test_playfair_grid_moves() {
        let mut grid = PlayfairGrid::standard();
        grid.mirror_rows();
        assert_eq!(&grid.cells()[..5], "VWXYZ");
        grid.mirror_rows();
        grid.mirror_cols();
        assert_eq!(&grid.cells()[..5], "EDCBA");
        grid.swap_rows(0, 1);
        assert_eq!(&grid.cells()[..5], "KIHGF");
    }

    #[test]
    fn test_playfair_grid_decrypt() {
        let grid = PlayfairGrid::from_keyword("playfair example").unwrap();
        let ciphertext = Cipher::playfair_encrypt("hide the gold in the tree stump", &grid.cells()).unwrap();
        assert_eq!(grid.decrypt(&ciphertext), "HIDETHEGOLDINTHETREESTUMP");
    }

    #[test]
    fn test_search_is_reproducible_and_monotonic() {
        let scorer = NgramScorer::new(playfair_quadgram_model());
        let searcher = PermutationKeySearcher::new(scorer, quick(200.0)).unwrap();
        let grid = PlayfairGrid::from_keyword("weather").unwrap();
        let ciphertext = Cipher::playfair_encrypt(&CORPUS[..400], &grid.cells()).unwrap();

        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let initial = PlayfairGrid::random(&mut rng);
            searcher.search(&ciphertext, initial, &mut rng)
        };
        let first = run(3);
        let second = run(3);

        assert_eq!(first.key, second.key);
        assert_eq!(first.fitness, second.fitness);
        assert_eq!(first.evaluations, 1 + 5 * 200);
        assert_eq!(first.best_trace.len(), 6);
        assert!(first.best_trace.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(first.best_trace.last(), Some(&first.fitness));
    }

    #[test]
    fn test_playfair_recovered_from_scrambled_grid() {
        let grid = PlayfairGrid::from_keyword("weather").unwrap();
        assert_eq!(grid.cells(), "WEATHRBCDFGIKLMNOPQSUVXYZ");
        let ciphertext = Cipher::playfair_encrypt(&CORPUS[..700], &grid.cells()).unwrap();
        let expected = grid.decrypt(&ciphertext);

        // W/Z and C/L exchanged
        let scrambled = PlayfairGrid::from_cells("ZEATHRBLDFGIKCMNOPQSUVXYW").unwrap();
        let params = SearchParams {
            iterations: 1000,
            temperature: 2.0,
            step: 1.0,
            fudge: 0.75,
            threshold: 95.0,
        };
        let scorer = NgramScorer::new(playfair_quadgram_model());
        let searcher = PermutationKeySearcher::new(scorer, params).unwrap();

        for seed in [1, 2, 3, 4] {
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = searcher.search(&ciphertext, scrambled, &mut rng);
            assert!(outcome.fitness >= params.threshold, "seed {seed}: fitness {}", outcome.fitness);
            let matching = outcome
                .plaintext
                .chars()
                .zip(expected.chars())
                .filter(|(found, wanted)| found == wanted)
                .count();
            assert!(
                matching * 100 >= expected.len() * 95,
                "seed {seed}: {matching} of {} letters recovered",
                expected.len()
            );
        }
    }

    #[test]
    fn test_threshold_stops_search() {
        let scorer = NgramScorer::new(quadgram_model());
        let searcher = PermutationKeySearcher::new(scorer, quick(-1.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let initial = SubstitutionKey::identity("abcdefghijklmnopqrstuvwxyz").unwrap();
        let outcome = searcher.search("zzzz qqqq", initial, &mut rng);
        assert_eq!(outcome.evaluations, 1);
        assert_eq!(outcome.best_trace, vec![outcome.fitness]);
    }

    #[test]
    fn test_substitution_recovered_from_nearby_key() {
        let alphabet = "abcdefghijklmnopqrstuvwxyz";
        let cipher_alphabet = Cipher::keyword_alphabet("lighthouse", alphabet).unwrap();
        let plaintext = CORPUS[..700].to_lowercase();
        let ciphertext = Cipher::substitution_encrypt(&plaintext, alphabet, &cipher_alphabet).unwrap();

        // Swap the cipher letters for 'e' and 't'
        let mut near: Vec<char> = cipher_alphabet.chars().collect();
        near.swap(4, 19);
        let near: String = near.into_iter().collect();
        let initial = SubstitutionKey::from_key(alphabet, &near).unwrap();

        let params = SearchParams {
            iterations: 4000,
            temperature: 0.01,
            step: 1.0,
            fudge: 1.0,
            threshold: 1000.0,
        };
        let scorer = NgramScorer::new(quadgram_model());
        let searcher = PermutationKeySearcher::new(scorer, params).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let outcome = searcher.search(&ciphertext, initial, &mut rng);

        assert_eq!(outcome.plaintext, plaintext);
    }
}
