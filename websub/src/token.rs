//! Random tokens for secrets and callback paths.
//!
//! The alphabet has 64 entries so that reducing a random byte modulo its
//! length is unbiased (64 divides 256).

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// URL-safe characters tokens are drawn from.
pub const TOKEN_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Fill a buffer of length `n` with characters from [`TOKEN_ALPHABET`] using
/// the supplied cryptographic random source.
///
/// # Panics
///
/// Panics if the random source fails.
pub fn random_token_with<R>(rng: &mut R, n: usize) -> Vec<u8>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut randomness = vec![0u8; n];
    rng.fill_bytes(&mut randomness);

    randomness
        .into_iter()
        .map(|byte| TOKEN_ALPHABET[usize::from(byte) % TOKEN_ALPHABET.len()])
        .collect()
}

/// [`random_token_with`] over the operating system's random source.
pub fn random_token(n: usize) -> Vec<u8> {
    random_token_with(&mut OsRng, n)
}

/// A random token as a `String`. Tokens are always ASCII.
pub fn random_token_string(n: usize) -> String {
    random_token(n).into_iter().map(char::from).collect()
}
