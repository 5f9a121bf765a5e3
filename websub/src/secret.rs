//! The shared secret used to authenticate notifications.

use std::fmt;

use crate::config::MAX_SECRET_LEN;
use crate::error::{Result, SubscriptionError};
use crate::token::random_token_string;

/// A hub secret: 1 to 199 bytes of text.
///
/// The secret travels to the hub as a form field, so it has to be text.
/// `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Validate and wrap a caller-chosen secret.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SubscriptionError::InvalidSecret(
                "secret must not be empty".to_string(),
            ));
        }
        if secret.len() > MAX_SECRET_LEN {
            return Err(SubscriptionError::InvalidSecret(format!(
                "secret is {} bytes, the limit is {MAX_SECRET_LEN}",
                secret.len()
            )));
        }
        Ok(Self(secret))
    }

    /// A fresh random secret of `len` bytes, clamped to the valid range.
    pub fn generate(len: usize) -> Self {
        Self(random_token_string(len.clamp(1, MAX_SECRET_LEN)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The HMAC key.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({} bytes)", self.0.len())
    }
}
