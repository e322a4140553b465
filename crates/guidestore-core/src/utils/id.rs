// Identifier and capability-token generation.

use rand::Rng;

/// Character set used for opaque tokens: a-z, A-Z, 0-9, -, _ (64 characters).
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";

/// Access tokens carry a recognizable prefix for log scrubbing and support.
const ACCESS_TOKEN_PREFIX: &str = "gat_";
const ACCESS_TOKEN_RANDOM_LEN: usize = 40;

/// Generate a document id (nanoid, 21 characters).
pub fn generate_id() -> String {
    nanoid::nanoid!()
}

/// Generate a random string of the specified length over [`CHARSET`].
pub fn random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Generate a purchase access token. Unguessable; never regenerated.
pub fn generate_access_token() -> String {
    format!("{ACCESS_TOKEN_PREFIX}{}", random_string(ACCESS_TOKEN_RANDOM_LEN))
}

/// Generate an admin session token.
pub fn generate_session_token() -> String {
    random_string(32)
}
