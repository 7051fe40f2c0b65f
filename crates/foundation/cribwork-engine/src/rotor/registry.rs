//! Rotor and reflector wiring tables.
//!
//! Tables are signed offsets: a signal entering contact `e` at rotor index
//! `i` leaves at `e + table[i]` (mod 26).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RotorId {
    I,
    II,
    III,
    IV,
    V,
}

impl RotorId {
    pub const ALL: [RotorId; 5] = [RotorId::I, RotorId::II, RotorId::III, RotorId::IV, RotorId::V];

    pub fn name(&self) -> &'static str {
        match self {
            RotorId::I => "I",
            RotorId::II => "II",
            RotorId::III => "III",
            RotorId::IV => "IV",
            RotorId::V => "V",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RotorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        RotorId::ALL
            .into_iter()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| Error::UnknownRotor(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReflectorId {
    B,
    C,
}

impl ReflectorId {
    pub const ALL: [ReflectorId; 2] = [ReflectorId::B, ReflectorId::C];

    pub fn name(&self) -> &'static str {
        match self {
            ReflectorId::B => "B",
            ReflectorId::C => "C",
        }
    }
}

impl fmt::Display for ReflectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReflectorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "B" => Ok(ReflectorId::B),
            "C" => Ok(ReflectorId::C),
            _ => Err(Error::UnknownReflector(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotorSpec {
    pub id: RotorId,
    pub forward: [i8; 26],
    pub reverse: [i8; 26],
    /// Counter value at which this rotor pushes its left neighbour
    pub notch: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectorSpec {
    pub id: ReflectorId,
    pub table: [i8; 26],
}

/// Immutable set of rotor and reflector specs, shared by reference.
#[derive(Debug, Clone)]
pub struct Registry {
    rotors: [RotorSpec; 5],
    reflectors: [ReflectorSpec; 2],
}

impl Registry {
    /// The five three-rotor machine rotors and reflectors B and C
    pub fn standard() -> Self {
        Self {
            rotors: [
                RotorSpec {
                    id: RotorId::I,
                    forward: [4, 9, 10, 2, 7, 1, -3, 9, 13, -10, 3, 8, 2, 9, 10, -8, 7, 3, 0, -4, 6, 13, 5, -6, 4, 10],
                    reverse: [-6, -5, -4, 3, -4, -2, -1, 8, -13, -10, -9, -7, -10, -3, -2, 4, -9, 6, 0, -8, -3, -13, -9, -7, -10, 10],
                    notch: 16,
                },
                RotorSpec {
                    id: RotorId::II,
                    forward: [0, 8, 1, 7, -12, 3, 11, 13, -11, -8, 1, -4, 10, 6, -2, 13, 0, -11, 7, -6, -5, 3, 9, -2, -10, 5],
                    reverse: [0, 8, -13, -1, -5, -9, 11, 4, -3, -8, -7, -1, 2, 6, 10, 5, 0, -11, 12, -6, -13, 2, -10, 11, -3, -7],
                    notch: 4,
                },
                RotorSpec {
                    id: RotorId::III,
                    forward: [1, 2, 3, 4, 5, 6, -4, 8, 9, 10, 13, 10, 13, 0, 10, -11, -8, 5, -12, 7, -10, -9, -2, -5, -8, -11],
                    reverse: [-7, -1, 4, -2, 11, -3, 12, -4, 8, -5, 10, -6, 9, 0, 11, -8, 8, -9, 5, -10, 2, -10, -5, -13, -10, -13],
                    notch: 21,
                },
                RotorSpec {
                    id: RotorId::IV,
                    forward: [4, -9, 12, -8, 11, -6, 3, -7, -10, 7, 10, -3, 5, -6, 9, -4, -3, -12, 1, 13, -10, 8, 6, -11, -2, 2],
                    reverse: [7, -2, -6, -8, -4, 12, -13, 6, 3, -3, 10, 4, 11, 3, -12, -11, -7, -5, 9, -1, -10, 8, 2, -9, 10, 6],
                    notch: 9,
                },
                RotorSpec {
                    id: RotorId::V,
                    forward: [-5, -2, -1, -12, 2, 3, 13, -9, 12, 6, 8, -8, 1, -6, -3, 8, 10, 5, -6, -10, -4, -7, 9, 7, 4, 11],
                    reverse: [-10, 1, -4, 8, -7, -9, -2, 6, -3, 10, -11, 3, 6, -1, 7, -6, 4, 12, -8, -13, -12, 5, -5, -8, 9, 2],
                    notch: 25,
                },
            ],
            reflectors: [
                ReflectorSpec {
                    id: ReflectorId::B,
                    table: [-2, -10, -8, 4, 12, 13, 5, -4, 7, -12, 3, -5, 2, -3, -2, -7, -12, 10, -13, 6, 8, 1, -1, 12, 2, -6],
                },
                ReflectorSpec {
                    id: ReflectorId::C,
                    table: [5, -6, 13, 6, 4, -5, 8, -9, -4, -6, 7, -12, 11, 9, -8, -13, 3, -7, 2, -3, -2, 6, -9, -11, 9, 12],
                },
            ],
        }
    }

    pub fn rotor(&self, id: RotorId) -> &RotorSpec {
        &self.rotors[id.index()]
    }

    pub fn reflector(&self, id: ReflectorId) -> &ReflectorSpec {
        match id {
            ReflectorId::B => &self.reflectors[0],
            ReflectorId::C => &self.reflectors[1],
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

/// `(value + offset) mod 26`
pub(crate) fn wire(value: u8, offset: i8) -> u8 {
    (value as i16 + offset as i16).rem_euclid(26) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        assert_eq!("iii".parse::<RotorId>().unwrap(), RotorId::III);
        assert_eq!(" V ".parse::<RotorId>().unwrap(), RotorId::V);
        assert!(matches!("VI".parse::<RotorId>(), Err(Error::UnknownRotor(_))));
        assert_eq!("c".parse::<ReflectorId>().unwrap(), ReflectorId::C);
        assert!(matches!("A".parse::<ReflectorId>(), Err(Error::UnknownReflector(_))));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = Registry::standard();
        for id in RotorId::ALL {
            assert_eq!(registry.rotor(id).id, id);
        }
        for id in ReflectorId::ALL {
            assert_eq!(registry.reflector(id).id, id);
        }
        assert_eq!(registry.rotor(RotorId::II).notch, 4);
    }

    #[test]
    fn test_reverse_inverts_forward() {
        let registry = Registry::standard();
        for id in RotorId::ALL {
            let spec = registry.rotor(id);
            for enter in 0..26u8 {
                let leave = wire(enter, spec.forward[enter as usize]);
                assert_eq!(wire(leave, spec.reverse[leave as usize]), enter, "rotor {}", id);
            }
        }
    }

    #[test]
    fn test_reflectors_are_involutions() {
        let registry = Registry::standard();
        for id in ReflectorId::ALL {
            let table = &registry.reflector(id).table;
            for enter in 0..26u8 {
                let leave = wire(enter, table[enter as usize]);
                assert_ne!(leave, enter);
                assert_eq!(wire(leave, table[leave as usize]), enter);
            }
        }
    }
}
