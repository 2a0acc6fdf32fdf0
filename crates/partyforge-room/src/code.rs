//! 4-letter room code generation (spec §3, §4.2, §8 invariant 1).

use partyforge_protocol::RoomCode;
use rand::Rng;

/// Draws a random 4-letter code from [`RoomCode::ALPHABET`].
///
/// Collision avoidance (retry on an already-live code) is the caller's
/// responsibility — this function only knows how to generate, not how
/// to check uniqueness against the live room table.
pub fn generate() -> RoomCode {
    let mut rng = rand::rng();
    let alphabet = RoomCode::ALPHABET;
    let bytes = [
        alphabet[rng.random_range(0..alphabet.len())],
        alphabet[rng.random_range(0..alphabet.len())],
        alphabet[rng.random_range(0..alphabet.len())],
        alphabet[rng.random_range(0..alphabet.len())],
    ];
    RoomCode::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_parseable_code() {
        let code = generate();
        let reparsed = RoomCode::parse(&code.to_string()).unwrap();
        assert_eq!(code, reparsed);
    }

    #[test]
    fn test_generate_many_are_mostly_unique() {
        use std::collections::HashSet;
        let codes: HashSet<String> =
            (0..200).map(|_| generate().to_string()).collect();
        // 24^4 possible codes — 200 draws should overwhelmingly be unique.
        assert!(codes.len() > 190);
    }
}
