use rand::rngs::OsRng;
use rand::Rng;

/// URL-safe alphabet: 64 symbols, so each character carries exactly 6 bits.
const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// 32 characters x 6 bits = 192 bits of entropy, unguessable within any
/// realistic brute-force window. Collisions are not prevented here; the
/// UNIQUE constraint on tickets.token catches the negligible case.
pub const TOKEN_LEN: usize = 32;

/// Generate a fresh ticket token from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut rng = OsRng;
    (0..TOKEN_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
