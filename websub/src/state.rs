//! Subscription lifecycle states and protocol modes.

use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Not subscribed. Initial state, and where a denial leaves us.
    #[default]
    Unsubscribed,
    /// A subscribe or unsubscribe request was sent and awaits verification
    Requested,
    /// Verified by the hub, lease active
    Subscribed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Unsubscribed => "Unsubscribed",
            State::Requested => "Requested",
            State::Subscribed => "Subscribed",
        };
        f.write_str(name)
    }
}

/// The `hub.mode` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Subscribe,
    Unsubscribe,
    Denied,
}

impl Mode {
    /// The wire value of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Subscribe => "subscribe",
            Mode::Unsubscribe => "unsubscribe",
            Mode::Denied => "denied",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a `hub.mode` value is not part of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown hub.mode: {0:?}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(Mode::Subscribe),
            "unsubscribe" => Ok(Mode::Unsubscribe),
            "denied" => Ok(Mode::Denied),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}
