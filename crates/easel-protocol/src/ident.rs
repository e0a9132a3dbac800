//! Identity utilities: room codes, usernames, opaque IDs, sanitization.
//!
//! Pure string functions plus a little randomness. Everything a client
//! types passes through [`sanitize`] before it is stored or echoed.

use rand::Rng;

use crate::{RoomId, UserId};

/// Characters allowed in room codes. Confusable glyphs (`0`/`O`, `1`/`I`)
/// are excluded so codes survive being read aloud.
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHIJKLMNPQRSTUVWXYZ23456789";

/// Room codes are exactly this long.
pub const ROOM_CODE_LEN: usize = 6;

const ID_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a random 6-character room code.
///
/// Uniqueness is the registry's job — it regenerates on the rare
/// collision against a live room.
pub fn generate_room_code() -> String {
    let bytes = ROOM_CODE_ALPHABET.as_bytes();
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| bytes[rng.random_range(0..bytes.len())] as char)
        .collect()
}

/// Normalizes a user-supplied room code: trim whitespace, uppercase.
/// Idempotent.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Checks that a (normalized) room code has the right length and alphabet.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code.chars().all(|c| ROOM_CODE_ALPHABET.contains(c))
}

/// Validates a username: 3–20 characters, alphanumeric plus underscore,
/// and none of the reserved words.
pub fn is_valid_username(name: &str) -> bool {
    if name.len() < 3 || name.len() > 20 {
        return false;
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    !["admin", "system", "root"]
        .iter()
        .any(|word| lower.contains(word))
}

/// Strips markup-significant characters from user input and trims it.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '&' | '"' | '\''))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Generates an opaque user ID (`user_` + 12 random characters).
pub fn generate_user_id() -> UserId {
    UserId(format!("user_{}", random_suffix(12)))
}

/// Generates an opaque room ID (`room_` + 12 random characters).
pub fn generate_room_id() -> RoomId {
    RoomId(format!("room_{}", random_suffix(12)))
}

fn random_suffix(len: usize) -> String {
    let bytes = ID_ALPHABET.as_bytes();
    let mut rng = rand::rng();
    (0..len)
        .map(|_| bytes[rng.random_range(0..bytes.len())] as char)
        .collect()
}
