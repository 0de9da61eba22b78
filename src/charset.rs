//! Static character ↔ representation tables.
//!
//! A representation is a string of `.` and `-` marks. Lookups are pure
//! functions; the reverse map is built once on first use.

use std::collections::HashMap;
use std::sync::OnceLock;

/// The supported alphabet with ITU representations.
pub const MORSE_TABLE: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('0', "-----"),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('"', ".-..-."),
    ('\'', ".----."),
    ('$', "...-..-"),
    ('(', "-.--."),
    (')', "-.--.-"),
    ('+', ".-.-."),
    (',', "--..--"),
    ('-', "-....-"),
    ('.', ".-.-.-"),
    ('/', "-..-."),
    (':', "---..."),
    (';', "-.-.-."),
    ('=', "-...-"),
    ('?', "..--.."),
    ('_', "..--.-"),
    ('@', ".--.-."),
    ('!', "-.-.--"),
];

fn forward_map() -> &'static HashMap<char, &'static str> {
    static MAP: OnceLock<HashMap<char, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| MORSE_TABLE.iter().copied().collect())
}

fn reverse_map() -> &'static HashMap<&'static str, char> {
    static MAP: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    MAP.get_or_init(|| MORSE_TABLE.iter().map(|&(c, r)| (r, c)).collect())
}

/// Representation for a character, case-insensitive.
pub fn representation_of(c: char) -> Option<&'static str> {
    forward_map().get(&c.to_ascii_uppercase()).copied()
}

/// Character for a dot/dash representation.
pub fn character_of(representation: &str) -> Option<char> {
    reverse_map().get(representation).copied()
}

/// Whether the character can be sent (a space counts: it is a word gap).
pub fn is_sendable(c: char) -> bool {
    c == ' ' || representation_of(c).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_round_trips() {
        for &(c, repr) in MORSE_TABLE {
            assert_eq!(representation_of(c), Some(repr), "{c}");
            assert_eq!(character_of(repr), Some(c), "{repr}");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(representation_of('a'), Some(".-"));
        assert_eq!(representation_of('z'), Some("--.."));
    }

    #[test]
    fn unknown_inputs_yield_none() {
        assert_eq!(representation_of('~'), None);
        assert_eq!(character_of(".-.-.-.-.-"), None);
        assert_eq!(character_of(""), None);
    }

    #[test]
    fn no_duplicate_representations() {
        assert_eq!(reverse_map().len(), MORSE_TABLE.len());
    }
}
