//! Periodic Key Recovery
//!
//! Kasiski examination of repeated sequences to find candidate key lengths,
//! then per-column frequency scoring to recover each key letter of a
//! repeating-key shift cipher.

use crate::ciphers::{self, Cipher};
use crate::frequency::FrequencyScorer;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::ops::RangeInclusive;

/// Repeated-sequence lengths examined, in order
pub const SEQUENCE_LENGTHS: RangeInclusive<usize> = 4..=6;

/// Shifts kept per column
const TOP_SHIFTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicKey {
    pub key: String,
    pub plaintext: String,
    /// Mean column score (lower is better)
    pub score: f64,
    /// Repeated-sequence length whose factors produced this key length
    pub sequence_length: usize,
}

/// Column shift ordered by score, then by shift
#[derive(Debug, Clone, Copy)]
struct RankedShift {
    score: f64,
    shift: u8,
}

impl PartialEq for RankedShift {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedShift {}

impl PartialOrd for RankedShift {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedShift {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.shift.cmp(&other.shift))
    }
}

pub struct PeriodicKeyAnalyzer;

impl PeriodicKeyAnalyzer {
    /// Remove spaces, tabs and line breaks
    pub fn strip(text: &str) -> String {
        text.chars().filter(|&c| !ciphers::is_layout_space(c)).collect()
    }

    /// Key-length factors shared by every repeated sequence of
    /// `sequence_length` characters. `text` is used as given.
    pub fn common_factors(text: &str, sequence_length: usize) -> BTreeSet<usize> {
        let chars: Vec<char> = text.chars().collect();
        if sequence_length == 0 || chars.len() < sequence_length {
            return BTreeSet::new();
        }

        let mut positions: HashMap<&[char], Vec<usize>> = HashMap::new();
        for (start, window) in chars.windows(sequence_length).enumerate() {
            positions.entry(window).or_default().push(start);
        }

        let mut common: Option<BTreeSet<usize>> = None;
        for starts in positions.values().filter(|starts| starts.len() > 1) {
            let factors: BTreeSet<usize> = starts
                .windows(2)
                .flat_map(|pair| factors_of(pair[1] - pair[0]))
                .collect();
            common = Some(match common {
                None => factors,
                Some(acc) => acc.intersection(&factors).copied().collect(),
            });
        }
        common.unwrap_or_default()
    }

    /// Common factors for each examined sequence length
    pub fn key_length_candidates(text: &str) -> Vec<(usize, BTreeSet<usize>)> {
        let text = Self::strip(text);
        SEQUENCE_LENGTHS
            .map(|len| (len, Self::common_factors(&text, len)))
            .collect()
    }

    /// The `n` lowest-scoring shifts for one column, best first. Ties go to
    /// the lower shift.
    pub fn top_shifts(column: &str, n: usize) -> Vec<(u8, f64)> {
        let mut heap = BinaryHeap::with_capacity(n + 1);
        for (shift, score) in FrequencyScorer::score_all_shifts(column).into_iter().enumerate() {
            heap.push(RankedShift {
                score,
                shift: shift as u8,
            });
            if heap.len() > n {
                heap.pop();
            }
        }
        heap.into_sorted_vec()
            .into_iter()
            .map(|ranked| (ranked.shift, ranked.score))
            .collect()
    }

    /// Recover the key and plaintext of a repeating-key shift cipher.
    pub fn crack(ciphertext: &str) -> Result<PeriodicKey> {
        let text = Self::strip(ciphertext);
        let chars: Vec<char> = text.chars().collect();
        let mut best: Option<(String, f64, usize)> = None;

        for (sequence_length, factors) in Self::key_length_candidates(&text) {
            for key_length in factors {
                let (key, score) = Self::key_for_length(&chars, key_length);
                tracing::debug!(sequence_length, key_length, %key, score, "Key length candidate");

                if best.as_ref().map_or(true, |(_, best_score, _)| score < *best_score) {
                    best = Some((key, score, sequence_length));
                }
            }
        }

        let (key, score, sequence_length) = best.ok_or_else(|| {
            Error::NoPeriodicKey(format!(
                "no repeated sequence of length {}-{} shares a common spacing factor",
                SEQUENCE_LENGTHS.start(),
                SEQUENCE_LENGTHS.end()
            ))
        })?;

        tracing::info!(%key, score, "Periodic key recovered");

        Ok(PeriodicKey {
            plaintext: Cipher::vigenere_decrypt(&text, &key)?,
            key,
            score,
            sequence_length,
        })
    }

    /// Best key letter per column and the mean column score
    fn key_for_length(chars: &[char], key_length: usize) -> (String, f64) {
        let mut key = String::with_capacity(key_length);
        let mut total = 0.0;
        for offset in 0..key_length {
            let column: String = chars.iter().skip(offset).step_by(key_length).collect();
            let (shift, score) = Self::top_shifts(&column, TOP_SHIFTS)[0];
            key.push((b'A' + shift) as char);
            total += score;
        }
        (key, total / key_length as f64)
    }
}

/// Divisors of `n` excluding 1, including `n` itself
fn factors_of(n: usize) -> impl Iterator<Item = usize> {
    (2..=n / 2).filter(move |i| n % i == 0).chain(std::iter::once(n))
}
