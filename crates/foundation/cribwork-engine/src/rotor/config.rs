//! Machine configuration: reflector, rotor order, start and ring letters,
//! plugboard. Everything is validated at construction.

use super::registry::{ReflectorId, RotorId};
use crate::{Error, Result};
use std::fmt;

/// Symmetric letter swap table, identity for unplugged letters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plugboard {
    wiring: [u8; 26],
}

impl Plugboard {
    pub fn identity() -> Self {
        let mut wiring = [0u8; 26];
        for (i, w) in wiring.iter_mut().enumerate() {
            *w = i as u8;
        }
        Self { wiring }
    }

    /// Build from letter pairs such as `["AB", "CD"]`. A letter may appear
    /// in at most one pair.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut board = Self::identity();
        for pair in pairs {
            let pair = pair.as_ref();
            let letters: Vec<char> = pair.chars().collect();
            let (a, b) = match letters[..] {
                [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                    (ordinal(a), ordinal(b))
                }
                _ => return Err(Error::InvalidPlug(pair.to_string())),
            };
            if a == b {
                return Err(Error::InvalidPlug(pair.to_string()));
            }
            for letter in [a, b] {
                if board.wiring[letter as usize] != letter {
                    return Err(Error::PlugConflict((b'A' + letter) as char));
                }
            }
            board.wiring[a as usize] = b;
            board.wiring[b as usize] = a;
        }
        Ok(board)
    }

    /// Parse whitespace- or comma-separated pairs, e.g. `"AB CD,EF"`
    pub fn parse(spec: &str) -> Result<Self> {
        Self::from_pairs(
            spec.split(|c: char| c.is_whitespace() || c == ',')
                .filter(|pair| !pair.is_empty()),
        )
    }

    pub fn swap(&self, letter: u8) -> u8 {
        self.wiring[letter as usize]
    }

    /// Plugged pairs in alphabetical order
    pub fn pairs(&self) -> Vec<String> {
        (0..26u8)
            .filter(|&a| self.wiring[a as usize] > a)
            .map(|a| format!("{}{}", (b'A' + a) as char, (b'A' + self.wiring[a as usize]) as char))
            .collect()
    }
}

impl Default for Plugboard {
    fn default() -> Self {
        Self::identity()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    reflector: ReflectorId,
    /// Left, middle, right
    rotors: [RotorId; 3],
    start: [u8; 3],
    ring: [u8; 3],
    plugboard: Plugboard,
}

impl MachineConfig {
    /// Rotors are given left to right and must be pairwise distinct. Start
    /// and ring letters default to `AAA`; the plugboard to identity.
    pub fn new(reflector: ReflectorId, rotors: [RotorId; 3]) -> Result<Self> {
        for (i, rotor) in rotors.iter().enumerate() {
            if rotors[..i].contains(rotor) {
                return Err(Error::DuplicateRotor(*rotor));
            }
        }
        Ok(Self {
            reflector,
            rotors,
            start: [0; 3],
            ring: [0; 3],
            plugboard: Plugboard::identity(),
        })
    }

    /// Build from text settings, e.g. `("B", "III II I", "AAA", "AAA", "AB CD")`
    pub fn parse(reflector: &str, rotors: &str, start: &str, ring: &str, plugs: &str) -> Result<Self> {
        let ids = rotors
            .split(|c: char| c.is_whitespace() || c == ',' || c == '-')
            .filter(|id| !id.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<RotorId>>>()?;
        let ids: [RotorId; 3] = ids
            .try_into()
            .map_err(|_| Error::InvalidSetting {
                field: "rotors",
                value: rotors.to_string(),
            })?;

        Ok(Self::new(reflector.parse()?, ids)?
            .with_start(start)?
            .with_ring(ring)?
            .with_plugboard(Plugboard::parse(plugs)?))
    }

    pub fn with_start(mut self, start: &str) -> Result<Self> {
        self.start = parse_letters("start", start)?;
        Ok(self)
    }

    pub fn with_ring(mut self, ring: &str) -> Result<Self> {
        self.ring = parse_letters("ring", ring)?;
        Ok(self)
    }

    pub fn with_plugboard(mut self, plugboard: Plugboard) -> Self {
        self.plugboard = plugboard;
        self
    }

    pub fn reflector(&self) -> ReflectorId {
        self.reflector
    }

    pub fn rotors(&self) -> [RotorId; 3] {
        self.rotors
    }

    pub fn start(&self) -> String {
        letters(self.start)
    }

    pub fn ring(&self) -> String {
        letters(self.ring)
    }

    pub fn plugboard(&self) -> &Plugboard {
        &self.plugboard
    }

    pub(crate) fn ring_ordinals(&self) -> [u8; 3] {
        self.ring
    }

    /// `(start - ring) mod 26` for each rotor
    pub fn initial_counters(&self) -> [u8; 3] {
        counters_for(self.start, self.ring)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            reflector: ReflectorId::B,
            rotors: [RotorId::III, RotorId::II, RotorId::I],
            start: [0; 3],
            ring: [0; 3],
            plugboard: Plugboard::identity(),
        }
    }
}

impl fmt::Display for MachineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}-{} start {} ring {}",
            self.reflector,
            self.rotors[0],
            self.rotors[1],
            self.rotors[2],
            self.start(),
            self.ring()
        )?;
        let pairs = self.plugboard.pairs();
        if !pairs.is_empty() {
            write!(f, " plugs {}", pairs.join(" "))?;
        }
        Ok(())
    }
}

pub(crate) fn counters_for(start: [u8; 3], ring: [u8; 3]) -> [u8; 3] {
    let mut counters = [0u8; 3];
    for i in 0..3 {
        counters[i] = (start[i] + 26 - ring[i]) % 26;
    }
    counters
}

/// Exactly three letters, case-insensitive, as ordinals
pub(crate) fn parse_letters(field: &'static str, value: &str) -> Result<[u8; 3]> {
    let invalid = || Error::InvalidSetting {
        field,
        value: value.to_string(),
    };
    let chars: Vec<char> = value.trim().chars().collect();
    match chars[..] {
        [a, b, c] if chars.iter().all(char::is_ascii_alphabetic) => {
            Ok([ordinal(a), ordinal(b), ordinal(c)])
        }
        _ => Err(invalid()),
    }
}

pub(crate) fn ordinal(letter: char) -> u8 {
    letter.to_ascii_uppercase() as u8 - b'A'
}

pub(crate) fn letters(ordinals: [u8; 3]) -> String {
    ordinals.iter().map(|&o| (b'A' + o) as char).collect()
}
