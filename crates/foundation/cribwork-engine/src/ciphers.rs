//! Classic Ciphers
//!
//! Deterministic encode/decode transforms the analyzers use to turn a
//! candidate key into checkable plaintext: Caesar, Vigenère, substitution,
//! Playfair, rail fence and XOR.

use crate::{Error, Result};

/// Playfair grid alphabet (J folds into I)
pub const PLAYFAIR_ALPHABET: &str = "ABCDEFGHIKLMNOPQRSTUVWXYZ";

pub struct Cipher;

impl Cipher {
    // ═══════════════════════════════════════════════════════════
    // CAESAR CIPHER
    // ═══════════════════════════════════════════════════════════

    pub fn caesar_encrypt(input: &str, shift: i32) -> String {
        let shift = shift.rem_euclid(26) as u8;
        input.chars().map(|c| shift_char(c, shift)).collect()
    }

    pub fn caesar_decrypt(input: &str, shift: i32) -> String {
        Self::caesar_encrypt(input, -shift)
    }

    // ═══════════════════════════════════════════════════════════
    // VIGENÈRE CIPHER
    // ═══════════════════════════════════════════════════════════

    /// Encrypt with a repeating keyword. Whitespace passes through without
    /// consuming a key position; every other character does.
    pub fn vigenere_encrypt(input: &str, key: &str) -> Result<String> {
        let shifts = key_shifts(key)?;
        Ok(vigenere_apply(input, &shifts, |shift| shift))
    }

    pub fn vigenere_decrypt(input: &str, key: &str) -> Result<String> {
        let shifts = key_shifts(key)?;
        Ok(vigenere_apply(input, &shifts, |shift| (26 - shift) % 26))
    }

    // ═══════════════════════════════════════════════════════════
    // SUBSTITUTION CIPHER
    // ═══════════════════════════════════════════════════════════

    /// Build a cipher alphabet from a password: the password's distinct
    /// symbols, then the rest of `alphabet` starting after the password's
    /// last symbol and wrapping around.
    pub fn keyword_alphabet(password: &str, alphabet: &str) -> Result<String> {
        let alphabet: Vec<char> = alphabet.to_lowercase().chars().collect();
        let mut key: Vec<char> = Vec::with_capacity(alphabet.len());
        for c in password.to_lowercase().chars() {
            if alphabet.contains(&c) && !key.contains(&c) {
                key.push(c);
            }
        }

        let last = key
            .last()
            .copied()
            .ok_or_else(|| Error::InvalidKey("Password has no usable characters".into()))?;
        let start = alphabet.iter().rposition(|&c| c == last).map_or(0, |p| p + 1);

        for offset in 0..alphabet.len() {
            let c = alphabet[(start + offset) % alphabet.len()];
            if !key.contains(&c) {
                key.push(c);
            }
        }

        Ok(key.into_iter().collect())
    }

    /// Replace each symbol of `alphabet` by the symbol at the same position
    /// in `key`. Case is preserved for letters; other input passes through.
    pub fn substitution_encrypt(input: &str, alphabet: &str, key: &str) -> Result<String> {
        let (from, to) = substitution_tables(alphabet, key)?;
        Ok(translate(input, &from, &to))
    }

    pub fn substitution_decrypt(input: &str, alphabet: &str, key: &str) -> Result<String> {
        let (from, to) = substitution_tables(alphabet, key)?;
        Ok(translate(input, &to, &from))
    }

    // ═══════════════════════════════════════════════════════════
    // PLAYFAIR CIPHER
    // ═══════════════════════════════════════════════════════════

    /// 5x5 grid (row-major, 25 letters) from a keyword
    pub fn playfair_grid(keyword: &str) -> String {
        let mut grid = String::with_capacity(25);
        let letters = keyword
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| fold_j(c.to_ascii_uppercase()))
            .chain(PLAYFAIR_ALPHABET.chars());
        for c in letters {
            if !grid.contains(c) {
                grid.push(c);
            }
        }
        grid
    }

    pub fn playfair_encrypt(input: &str, grid: &str) -> Result<String> {
        let grid = grid_bytes(grid)?;
        let mut letters: Vec<u8> = playfair_letters(input);
        let mut digrams = Vec::with_capacity(letters.len() + 1);

        let mut idx = 0;
        while idx < letters.len() {
            let a = letters[idx];
            let b = match letters.get(idx + 1) {
                Some(&b) if b != a => {
                    idx += 2;
                    b
                }
                _ => {
                    idx += 1;
                    filler_for(a)
                }
            };
            digrams.push((a, b));
        }
        letters.clear();

        let position = grid_positions(&grid);
        for (a, b) in digrams {
            let (x, y) = playfair_pair(&grid, &position, a, b, 1);
            letters.push(x);
            letters.push(y);
        }
        Ok(String::from_utf8_lossy(&letters).into_owned())
    }

    /// Decrypt digram by digram. A trailing unpaired letter is dropped.
    /// Filler letters are left in place; see [`Cipher::playfair_strip_fillers`].
    pub fn playfair_decrypt(input: &str, grid: &str) -> Result<String> {
        let grid = grid_bytes(grid)?;
        let letters = playfair_letters(input);
        Ok(playfair_decrypt_letters(&grid, &letters))
    }

    /// Remove filler letters: a Q between two identical letters, an X
    /// between two Qs, and a trailing Q (or X after a Q).
    pub fn playfair_strip_fillers(text: &str) -> String {
        let chars: Vec<char> = text.chars().map(|c| c.to_ascii_uppercase()).collect();
        let mut out = String::with_capacity(text.len());
        for (i, c) in text.chars().enumerate() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let is_filler = match (chars[i], prev, next) {
                ('Q', Some(p), Some(n)) => p == n,
                ('X', Some('Q'), Some('Q')) => true,
                ('Q', Some(_), None) => true,
                ('X', Some('Q'), None) => true,
                _ => false,
            };
            if !is_filler {
                out.push(c);
            }
        }
        out
    }

    // ═══════════════════════════════════════════════════════════
    // RAIL FENCE CIPHER
    // ═══════════════════════════════════════════════════════════

    pub fn rail_fence_encrypt(input: &str, rails: usize) -> Result<String> {
        if rails < 2 {
            return Err(Error::InvalidKey("Rails must be >= 2".into()));
        }

        let chars: Vec<char> = input.chars().collect();
        let order = rail_order(chars.len(), rails);
        Ok(order.into_iter().map(|i| chars[i]).collect())
    }

    pub fn rail_fence_decrypt(input: &str, rails: usize) -> Result<String> {
        if rails < 2 {
            return Err(Error::InvalidKey("Rails must be >= 2".into()));
        }

        let chars: Vec<char> = input.chars().collect();
        let order = rail_order(chars.len(), rails);
        let mut plain = vec![' '; chars.len()];
        for (cipher_idx, plain_idx) in order.into_iter().enumerate() {
            plain[plain_idx] = chars[cipher_idx];
        }
        Ok(plain.into_iter().collect())
    }

    // ═══════════════════════════════════════════════════════════
    // XOR (ONE-TIME PAD)
    // ═══════════════════════════════════════════════════════════

    /// XOR `data` with `key`; output is as long as the shorter of the two.
    pub fn xor(data: &[u8], key: &[u8]) -> Vec<u8> {
        data.iter().zip(key).map(|(d, k)| d ^ k).collect()
    }
}

/// Shift an ASCII letter forward by `shift` positions, preserving case.
pub(crate) fn shift_char(c: char, shift: u8) -> char {
    if c.is_ascii_lowercase() {
        ((c as u8 - b'a' + shift) % 26 + b'a') as char
    } else if c.is_ascii_uppercase() {
        ((c as u8 - b'A' + shift) % 26 + b'A') as char
    } else {
        c
    }
}

/// Characters that separate words without carrying a key position
pub(crate) fn is_layout_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn vigenere_apply(input: &str, shifts: &[u8], adjust: impl Fn(u8) -> u8) -> String {
    let mut position = 0;
    input
        .chars()
        .map(|c| {
            if is_layout_space(c) {
                return c;
            }
            let shift = adjust(shifts[position % shifts.len()]);
            position += 1;
            shift_char(c, shift)
        })
        .collect()
}

fn key_shifts(key: &str) -> Result<Vec<u8>> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidKey("Key must be non-empty alphabetic".into()));
    }
    Ok(key.bytes().map(|b| b.to_ascii_uppercase() - b'A').collect())
}

fn substitution_tables(alphabet: &str, key: &str) -> Result<(Vec<char>, Vec<char>)> {
    let from: Vec<char> = alphabet.to_lowercase().chars().collect();
    let to: Vec<char> = key.to_lowercase().chars().collect();
    if from.len() != to.len() {
        return Err(Error::InvalidKey(format!(
            "Key has {} symbols but the alphabet has {}",
            to.len(),
            from.len()
        )));
    }
    for (i, c) in to.iter().enumerate() {
        if !from.contains(c) || to[..i].contains(c) {
            return Err(Error::InvalidKey(format!(
                "Key must be a permutation of the alphabet (problem at {:?})",
                c
            )));
        }
    }
    Ok((from, to))
}

fn translate(input: &str, from: &[char], to: &[char]) -> String {
    input
        .chars()
        .map(|c| {
            let lower = c.to_ascii_lowercase();
            match from.iter().position(|&f| f == lower) {
                Some(i) if c.is_ascii_uppercase() => to[i].to_ascii_uppercase(),
                Some(i) => to[i],
                None => c,
            }
        })
        .collect()
}

fn fold_j(c: char) -> char {
    if c == 'J' {
        'I'
    } else {
        c
    }
}

fn filler_for(letter: u8) -> u8 {
    if letter == b'Q' {
        b'X'
    } else {
        b'Q'
    }
}

pub(crate) fn playfair_letters(input: &str) -> Vec<u8> {
    input
        .bytes()
        .filter(u8::is_ascii_alphabetic)
        .map(|b| match b.to_ascii_uppercase() {
            b'J' => b'I',
            upper => upper,
        })
        .collect()
}

pub(crate) fn grid_bytes(grid: &str) -> Result<[u8; 25]> {
    let mut cells = [0u8; 25];
    let bytes = grid.as_bytes();
    if bytes.len() != 25 {
        return Err(Error::InvalidKey(format!(
            "Playfair grid needs 25 letters, got {}",
            bytes.len()
        )));
    }
    for (i, &b) in bytes.iter().enumerate() {
        let upper = b.to_ascii_uppercase();
        if upper == b'J' || !upper.is_ascii_uppercase() || cells[..i].contains(&upper) {
            return Err(Error::InvalidKey(format!(
                "Playfair grid must hold each letter except J once (problem at {:?})",
                b as char
            )));
        }
        cells[i] = upper;
    }
    Ok(cells)
}

/// Cell index of every letter in the grid, indexed by `letter - b'A'`
pub(crate) fn grid_positions(grid: &[u8; 25]) -> [u8; 26] {
    let mut position = [0u8; 26];
    for (i, &letter) in grid.iter().enumerate() {
        position[(letter - b'A') as usize] = i as u8;
    }
    position
}

/// Apply the Playfair rules to one digram; `direction` is 1 to encrypt and
/// 4 (i.e. -1 mod 5) to decrypt.
fn playfair_pair(grid: &[u8; 25], position: &[u8; 26], a: u8, b: u8, direction: usize) -> (u8, u8) {
    let pa = position[(a - b'A') as usize] as usize;
    let pb = position[(b - b'A') as usize] as usize;
    let (row_a, col_a) = (pa / 5, pa % 5);
    let (row_b, col_b) = (pb / 5, pb % 5);

    if col_a == col_b {
        (
            grid[((row_a + direction) % 5) * 5 + col_a],
            grid[((row_b + direction) % 5) * 5 + col_b],
        )
    } else if row_a == row_b {
        (
            grid[row_a * 5 + (col_a + direction) % 5],
            grid[row_b * 5 + (col_b + direction) % 5],
        )
    } else {
        (grid[row_a * 5 + col_b], grid[row_b * 5 + col_a])
    }
}

pub(crate) fn playfair_decrypt_letters(grid: &[u8; 25], letters: &[u8]) -> String {
    let position = grid_positions(grid);
    let mut plain = Vec::with_capacity(letters.len());
    for pair in letters.chunks_exact(2) {
        let (x, y) = playfair_pair(grid, &position, pair[0], pair[1], 4);
        plain.push(x);
        plain.push(y);
    }
    String::from_utf8_lossy(&plain).into_owned()
}

/// Plaintext indices in ciphertext order for a zigzag over `rails` rows
fn rail_order(len: usize, rails: usize) -> Vec<usize> {
    let cycle = 2 * (rails - 1);
    let mut order: Vec<usize> = (0..len).collect();
    order.sort_by_key(|&i| {
        let phase = i % cycle;
        phase.min(cycle - phase)
    });
    order
}
