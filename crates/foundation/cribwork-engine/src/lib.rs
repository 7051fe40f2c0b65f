//! Cribwork: Classical Cipher Cryptanalysis
//!
//! Recovers plaintext and key material from classical ciphertext using
//! statistical models of English.
//!
//! # Modules
//! - `ciphers` - Shift, Vigenère, substitution, Playfair, rail fence, XOR
//! - `frequency` - Letter frequency scoring, exhaustive shift search
//! - `fitness` - N-gram fitness model and scorer
//! - `kasiski` - Periodic key recovery by repeated-sequence analysis
//! - `rotor` - Rotor machine simulator and parallel key search
//! - `anneal` - Simulated annealing over permutation keys
//! - `crack` - Crack dispatcher and results

pub mod ciphers;
pub mod frequency;
pub mod fitness;
pub mod kasiski;
pub mod rotor;
pub mod anneal;
pub mod crack;

pub use ciphers::Cipher;
pub use frequency::{FrequencyScorer, ShiftCrack};
pub use fitness::{FitnessModel, NgramScorer, TableLayout};
pub use kasiski::{PeriodicKey, PeriodicKeyAnalyzer};
pub use rotor::{
    MachineConfig, MachineState, Plugboard, ReflectorId, Registry, RotorCrack, RotorId,
    RotorMachine, RotorMachineCracker,
};
pub use anneal::{PermutationKeySearcher, PlayfairGrid, SearchKey, SearchOutcome, SearchParams, SubstitutionKey};
pub use crack::{CrackOutcome, CrackResult, Cryptanalyst, RecoveredKey};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Rotor {0} is used more than once")]
    DuplicateRotor(RotorId),

    #[error("Unknown rotor: {0:?} (expected I, II, III, IV or V)")]
    UnknownRotor(String),

    #[error("Unknown reflector: {0:?} (expected B or C)")]
    UnknownReflector(String),

    #[error("Invalid {field} setting {value:?}: expected a single letter per rotor")]
    InvalidSetting { field: &'static str, value: String },

    #[error("Invalid plug {0:?}: expected two different letters")]
    InvalidPlug(String),

    #[error("Letter {0} is plugged more than once")]
    PlugConflict(char),

    #[error("Invalid message key {0:?}: expected three letters")]
    InvalidMessageKey(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Inconsistent day key: message key decrypted to {0:?}")]
    InconsistentDayKey(String),

    #[error("No rotor setting yields a consistent message key")]
    NoConsistentSetting,

    #[error("Failed to read fitness model {}: {source}", .path.display())]
    ModelIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed fitness model: {0}")]
    ModelFormat(#[from] serde_json::Error),

    #[error("Fitness model table has {found} entries; {symbols} symbols at n-gram length {length} need {dense} (dense) or {packed} (packed)")]
    ModelMismatch {
        symbols: usize,
        length: usize,
        dense: u128,
        packed: u128,
        found: usize,
    },

    #[error("Invalid fitness model: {0}")]
    InvalidModel(String),

    #[error("No fitness model loaded for {0}")]
    MissingModel(&'static str),

    #[error("No periodic key detected: {0}")]
    NoPeriodicKey(String),

    #[error("Invalid search parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Cipher families the engine knows how to attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherKind {
    Caesar,
    Vigenere,
    Enigma,
    Playfair,
    RailFence,
    Substitution,
    #[serde(rename = "otp")]
    OneTimePad,
}

impl CipherKind {
    pub const ALL: [CipherKind; 7] = [
        CipherKind::Caesar,
        CipherKind::Vigenere,
        CipherKind::Enigma,
        CipherKind::Playfair,
        CipherKind::RailFence,
        CipherKind::Substitution,
        CipherKind::OneTimePad,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CipherKind::Caesar => "Caesar Cipher",
            CipherKind::Vigenere => "Vigenère Cipher",
            CipherKind::Enigma => "Rotor Machine (Enigma M3)",
            CipherKind::Playfair => "Playfair Cipher",
            CipherKind::RailFence => "Rail Fence Cipher",
            CipherKind::Substitution => "Substitution Cipher",
            CipherKind::OneTimePad => "One-Time Pad",
        }
    }

    /// Short identifier used on the command line and in config files
    pub fn id(&self) -> &'static str {
        match self {
            CipherKind::Caesar => "caesar",
            CipherKind::Vigenere => "vigenere",
            CipherKind::Enigma => "enigma",
            CipherKind::Playfair => "playfair",
            CipherKind::RailFence => "railfence",
            CipherKind::Substitution => "substitution",
            CipherKind::OneTimePad => "otp",
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for CipherKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CipherKind::ALL
            .into_iter()
            .find(|kind| kind.id() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = CipherKind::ALL.iter().map(|k| k.id()).collect();
                format!("unknown cipher {:?} (expected one of: {})", s, known.join(", "))
            })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_kind_parse() {
        assert_eq!("Enigma".parse::<CipherKind>().unwrap(), CipherKind::Enigma);
        assert_eq!("otp".parse::<CipherKind>().unwrap(), CipherKind::OneTimePad);
        assert!("rot13".parse::<CipherKind>().is_err());
    }

    #[test]
    fn test_cipher_kind_ids_unique() {
        for (i, a) in CipherKind::ALL.iter().enumerate() {
            for b in &CipherKind::ALL[i + 1..] {
                assert_ne!(a.id(), b.id());
            }
        }
    }
}
