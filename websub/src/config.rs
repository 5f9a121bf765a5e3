//! Configuration types for the websub crate
//!
//! This module defines the settings that control how a subscription talks to
//! its hub and when it renews its lease.

use std::time::Duration;

use crate::error::{Result, SubscriptionError};

/// Longest secret a hub has to accept.
pub const MAX_SECRET_LEN: usize = 199;

/// Configuration shared by subscriptions
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Timeout for discovery and hub requests
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Fraction of the remaining lease after which renewal fires
    /// Default: 0.75
    pub renewal_fraction: f64,

    /// Length of secrets generated at subscribe time
    /// Default: 199
    pub secret_length: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            renewal_fraction: 0.75,
            secret_length: MAX_SECRET_LEN,
        }
    }
}

impl SubscriberConfig {
    /// Create a new SubscriberConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout == Duration::ZERO {
            return Err(SubscriptionError::Configuration(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if !(self.renewal_fraction > 0.0 && self.renewal_fraction <= 1.0) {
            return Err(SubscriptionError::Configuration(format!(
                "Renewal fraction must be in (0, 1], got {}",
                self.renewal_fraction
            )));
        }

        if self.secret_length == 0 || self.secret_length > MAX_SECRET_LEN {
            return Err(SubscriptionError::Configuration(format!(
                "Secret length must be between 1 and {MAX_SECRET_LEN}, got {}",
                self.secret_length
            )));
        }

        Ok(())
    }

    /// Build the HTTP client used for discovery and hub requests.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?;
        Ok(client)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_renewal_fraction(mut self, fraction: f64) -> Self {
        self.renewal_fraction = fraction;
        self
    }

    pub fn with_secret_length(mut self, length: usize) -> Self {
        self.secret_length = length;
        self
    }
}
