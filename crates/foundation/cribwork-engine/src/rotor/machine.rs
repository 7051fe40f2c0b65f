//! Rotor machine simulator and the doubled message-key wire format.

use super::config::{counters_for, letters, ordinal, MachineConfig, Plugboard};
use super::registry::{wire, ReflectorSpec, Registry, RotorSpec};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Rotor counters (left, middle, right), each 0-25
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MachineState {
    pub counters: [u8; 3],
}

impl MachineState {
    pub fn from_config(config: &MachineConfig) -> Self {
        Self {
            counters: config.initial_counters(),
        }
    }

    /// Counters as letters, e.g. `"ADP"`
    pub fn position(&self) -> String {
        letters(self.counters)
    }
}

/// Stateful simulator. Wiring is borrowed from a [`Registry`]; the
/// counters are owned by this instance.
#[derive(Debug, Clone)]
pub struct RotorMachine<'r> {
    registry: &'r Registry,
    rotors: [&'r RotorSpec; 3],
    reflector: &'r ReflectorSpec,
    plugboard: Plugboard,
    ring: [u8; 3],
    state: MachineState,
}

impl<'r> RotorMachine<'r> {
    pub fn new(registry: &'r Registry, config: &MachineConfig) -> Self {
        let [left, middle, right] = config.rotors();
        Self {
            registry,
            rotors: [
                registry.rotor(left),
                registry.rotor(middle),
                registry.rotor(right),
            ],
            reflector: registry.reflector(config.reflector()),
            plugboard: *config.plugboard(),
            ring: config.ring_ordinals(),
            state: MachineState::from_config(config),
        }
    }

    /// Apply a new configuration, re-deriving the counters
    pub fn reset(&mut self, config: &MachineConfig) {
        *self = Self::new(self.registry, config);
    }

    /// Move to new start letters (ordinals 0-25), keeping rings, rotors
    /// and plugboard
    pub fn rekey(&mut self, start: [u8; 3]) {
        self.state.counters = counters_for(start, self.ring);
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Advance the counters for one keypress. The middle rotor at its notch
    /// moves itself and the left rotor; the right rotor at its notch moves
    /// the middle rotor; the right rotor always moves.
    pub fn step(&mut self) {
        let [left, middle, right] = &mut self.state.counters;
        if *middle == self.rotors[1].notch {
            *left = (*left + 1) % 26;
            *middle = (*middle + 1) % 26;
        }
        if *right == self.rotors[2].notch {
            *middle = (*middle + 1) % 26;
        }
        *right = (*right + 1) % 26;
    }

    /// Pass a letter ordinal through plugboard, rotors and reflector at the
    /// current position. Does not step.
    pub fn encode_letter(&self, letter: u8) -> u8 {
        let counters = self.state.counters;
        let mut signal = self.plugboard.swap(letter);

        for slot in [2, 1, 0] {
            let idx = (signal + counters[slot]) % 26;
            signal = wire(signal, self.rotors[slot].forward[idx as usize]);
        }

        signal = wire(signal, self.reflector.table[signal as usize]);

        for slot in [0, 1, 2] {
            let idx = (signal + counters[slot]) % 26;
            signal = wire(signal, self.rotors[slot].reverse[idx as usize]);
        }

        self.plugboard.swap(signal)
    }

    /// Step and encode one character. Non-letters pass through unchanged
    /// without stepping; letters come back uppercase.
    pub fn keypress(&mut self, c: char) -> char {
        if !c.is_ascii_alphabetic() {
            return c;
        }
        self.step();
        (b'A' + self.encode_letter(ordinal(c))) as char
    }

    pub fn process(&mut self, text: &str) -> String {
        text.chars().map(|c| self.keypress(c)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedMessage {
    pub plaintext: String,
    pub message_key: String,
}

/// Encrypt under the day key in `config`: the message key typed twice,
/// a space, then the body encrypted with the message key as start letters.
pub fn encrypt_message(
    registry: &Registry,
    config: &MachineConfig,
    message_key: &str,
    plaintext: &str,
) -> Result<String> {
    let key = parse_message_key(message_key)?;
    let mut machine = RotorMachine::new(registry, config);

    let mut ciphertext = String::with_capacity(plaintext.len() + 7);
    for &letter in key.iter().chain(key.iter()) {
        ciphertext.push(machine.keypress((b'A' + letter) as char));
    }
    ciphertext.push(' ');

    machine.rekey(key);
    ciphertext.push_str(&machine.process(plaintext));
    Ok(ciphertext)
}

/// Decrypt a message produced by [`encrypt_message`]. Fails with
/// `InconsistentDayKey` when the doubled message key does not repeat.
pub fn decrypt_message(registry: &Registry, config: &MachineConfig, ciphertext: &str) -> Result<DecryptedMessage> {
    let (prefix, body) = split_message(ciphertext)?;
    let mut machine = RotorMachine::new(registry, config);

    let key = read_message_key(&mut machine, &prefix).map_err(|decoded| {
        Error::InconsistentDayKey(decoded.iter().map(|&o| (b'A' + o) as char).collect())
    })?;

    machine.rekey(key);
    Ok(DecryptedMessage {
        plaintext: machine.process(body),
        message_key: letters(key),
    })
}

/// Split into the six message-key ordinals and the trimmed body
pub(crate) fn split_message(ciphertext: &str) -> Result<([u8; 6], &str)> {
    let mut prefix = [0u8; 6];
    let mut chars = ciphertext.char_indices();
    for slot in prefix.iter_mut() {
        match chars.next() {
            Some((_, c)) if c.is_ascii_alphabetic() => *slot = ordinal(c),
            Some(_) => {
                return Err(Error::MalformedMessage(
                    "the first six characters must be letters".into(),
                ))
            }
            None => {
                return Err(Error::MalformedMessage(format!(
                    "expected at least six characters, got {}",
                    ciphertext.chars().count()
                )))
            }
        }
    }
    let body = chars.next().map_or("", |(offset, _)| &ciphertext[offset..]);
    Ok((prefix, body.trim()))
}

/// Decode the doubled message key. On mismatch the six decoded letters are
/// returned as the error.
pub(crate) fn read_message_key(
    machine: &mut RotorMachine<'_>,
    prefix: &[u8; 6],
) -> std::result::Result<[u8; 3], [u8; 6]> {
    let mut decoded = [0u8; 6];
    for (out, &letter) in decoded.iter_mut().zip(prefix) {
        machine.step();
        *out = machine.encode_letter(letter);
    }
    if decoded[..3] == decoded[3..] {
        Ok([decoded[0], decoded[1], decoded[2]])
    } else {
        Err(decoded)
    }
}

fn parse_message_key(message_key: &str) -> Result<[u8; 3]> {
    let chars: Vec<char> = message_key.trim().chars().collect();
    match chars[..] {
        [a, b, c] if chars.iter().all(char::is_ascii_alphabetic) => {
            Ok([ordinal(a), ordinal(b), ordinal(c)])
        }
        _ => Err(Error::InvalidMessageKey(message_key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotor::{ReflectorId, RotorId};

    fn config(rotors: [RotorId; 3], start: &str) -> MachineConfig {
        MachineConfig::new(ReflectorId::B, rotors)
            .unwrap()
            .with_start(start)
            .unwrap()
    }

    #[test]
    fn test_stepping_sequence() {
        let registry = Registry::standard();
        let mut machine = RotorMachine::new(&registry, &config([RotorId::III, RotorId::II, RotorId::I], "ADO"));
        assert_eq!(machine.state().counters, [0, 3, 14]);

        let expected = [[0, 3, 15], [0, 3, 16], [0, 4, 17], [1, 5, 18], [1, 5, 19], [1, 5, 20]];
        for counters in expected {
            machine.step();
            assert_eq!(machine.state().counters, counters);
        }
    }

    #[test]
    fn test_non_letters_do_not_step() {
        let registry = Registry::standard();
        let mut machine = RotorMachine::new(&registry, &MachineConfig::default());
        assert_eq!(machine.keypress(' '), ' ');
        assert_eq!(machine.keypress('7'), '7');
        assert_eq!(machine.state().counters, [0, 0, 0]);
    }

    #[test]
    fn test_known_output() {
        let registry = Registry::standard();
        let mut machine = RotorMachine::new(&registry, &MachineConfig::default());
        assert_eq!(machine.process("HELLO WORLD"), "MFNCZ BBFZM");
    }

    #[test]
    fn test_encode_is_reciprocal() {
        let registry = Registry::standard();
        let config = config([RotorId::V, RotorId::I, RotorId::IV], "QEV")
            .with_ring("CXA")
            .unwrap()
            .with_plugboard(Plugboard::parse("AZ BY QM").unwrap());
        let machine = RotorMachine::new(&registry, &config);
        for letter in 0..26 {
            let out = machine.encode_letter(letter);
            assert_ne!(out, letter);
            assert_eq!(machine.encode_letter(out), letter);
        }
    }

    #[test]
    fn test_encrypt_message() {
        let registry = Registry::standard();
        let config = MachineConfig::default();
        let ciphertext = encrypt_message(&registry, &config, "ABC", "ATTACKATDAWN").unwrap();
        assert_eq!(ciphertext, "FUVMNG FLRSSLZBBOTQ");

        let message = decrypt_message(&registry, &config, &ciphertext).unwrap();
        assert_eq!(message.message_key, "ABC");
        assert_eq!(message.plaintext, "ATTACKATDAWN");
    }

    #[test]
    fn test_message_roundtrip_with_plugs_and_rings() {
        let registry = Registry::standard();
        let config = MachineConfig::parse("C", "II V III", "RFW", "BQK", "AE TJ LO").unwrap();
        let plaintext = "the weather over the northern sea will be strong from the west";
        let ciphertext = encrypt_message(&registry, &config, "kdx", plaintext).unwrap();

        let message = decrypt_message(&registry, &config, &ciphertext).unwrap();
        assert_eq!(message.message_key, "KDX");
        assert_eq!(message.plaintext, plaintext.to_uppercase());
    }

    #[test]
    fn test_wrong_day_key() {
        let registry = Registry::standard();
        let config = MachineConfig::default();
        let ciphertext = encrypt_message(&registry, &config, "ABC", "ATTACKATDAWN").unwrap();

        let wrong = MachineConfig::default().with_start("QQQ").unwrap();
        let err = decrypt_message(&registry, &wrong, &ciphertext).unwrap_err();
        assert!(matches!(err, Error::InconsistentDayKey(_)));
    }

    #[test]
    fn test_malformed_messages() {
        let registry = Registry::standard();
        let config = MachineConfig::default();
        assert!(matches!(
            decrypt_message(&registry, &config, "ABC"),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            decrypt_message(&registry, &config, "AB CDEF GHI"),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            encrypt_message(&registry, &config, "AB", "text"),
            Err(Error::InvalidMessageKey(_))
        ));
    }
}
