//! Letter Frequency Scoring
//!
//! Sum of squared deviations from reference English letter frequencies.
//! Lower scores are more English-like.

use crate::ciphers::Cipher;
use serde::{Deserialize, Serialize};

/// Reference English letter frequencies (percent), A..Z
pub const ENGLISH_FREQUENCIES: [f64; 26] = [
    8.2, 1.5, 2.8, 4.3, 12.7, 2.2, 2.0, 6.1, 7.0, 0.2, 0.8, 4.0, 2.4,
    6.7, 7.5, 1.9, 0.1, 6.0, 6.3, 9.1, 2.8, 1.0, 2.4, 0.2, 2.0, 0.1,
];

/// Best shift found by exhaustive search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftCrack {
    pub shift: u8,
    pub plaintext: String,
    pub score: f64,
}

pub struct FrequencyScorer;

impl FrequencyScorer {
    /// Percentage frequency of each letter. The denominator is the full
    /// character count of `text`, so spaces and punctuation dilute every
    /// letter equally.
    pub fn frequencies(text: &str) -> [f64; 26] {
        let mut counts = [0usize; 26];
        let mut total = 0usize;
        for c in text.chars() {
            total += 1;
            if c.is_ascii_alphabetic() {
                counts[(c.to_ascii_uppercase() as u8 - b'A') as usize] += 1;
            }
        }

        let mut freq = [0.0; 26];
        if total == 0 {
            return freq;
        }
        for (f, &n) in freq.iter_mut().zip(&counts) {
            *f = n as f64 / total as f64 * 100.0;
        }
        freq
    }

    /// Squared deviation from English, rounded to one decimal place
    pub fn score(distribution: &[f64; 26]) -> f64 {
        let deviation: f64 = distribution
            .iter()
            .zip(&ENGLISH_FREQUENCIES)
            .map(|(observed, expected)| (observed - expected).powi(2))
            .sum();
        (deviation * 10.0).round() / 10.0
    }

    pub fn score_text(text: &str) -> f64 {
        Self::score(&Self::frequencies(text))
    }

    /// Score of the decryption under every shift, indexed by shift
    pub fn score_all_shifts(ciphertext: &str) -> [f64; 26] {
        let mut scores = [0.0; 26];
        for (shift, score) in scores.iter_mut().enumerate() {
            *score = Self::score_text(&Cipher::caesar_decrypt(ciphertext, shift as i32));
        }
        scores
    }

    /// Exhaustive shift crack. The lowest score wins; ties go to the lowest
    /// shift.
    pub fn crack_shift(ciphertext: &str) -> ShiftCrack {
        let scores = Self::score_all_shifts(ciphertext);
        let mut best = 0;
        for (shift, &score) in scores.iter().enumerate().skip(1) {
            if score < scores[best] {
                best = shift;
            }
        }

        tracing::debug!(shift = best, score = scores[best], "Shift crack finished");

        ShiftCrack {
            shift: best as u8,
            plaintext: Cipher::caesar_decrypt(ciphertext, best as i32),
            score: scores[best],
        }
    }
}
