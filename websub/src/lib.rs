//! # websub
//!
//! The subscriber side of WebSub (formerly PubSubHubbub).
//!
//! A [`Subscription`] discovers the hub a topic advertises, asks that hub for
//! a leased subscription, answers the hub's verification handshake on its
//! callback URL, checks the HMAC signature of every notification, and renews
//! the lease before it runs out.
//!
//! `Subscription` implements [`callback_server::CallbackHandler`], so serving
//! it is a matter of registering it on a [`callback_server::CallbackServer`]
//! at the path of its callback URL.
//!
//! Errors from calls you make (discovery, subscribe, unsubscribe) are
//! returned. Errors caused by inbound requests, including denials and bad
//! signatures, are handed to the `on_error` hook instead; a hub or stranger
//! sending garbage never reaches your control flow.

mod config;
mod discover;
mod error;
mod handler;
mod hub;
mod renewal;
mod secret;
mod signature;
mod state;
mod subscription;
mod token;

pub use config::{SubscriberConfig, MAX_SECRET_LEN};
pub use discover::{discover, find_hub_link};
pub use error::{Result, SubscriptionError};
pub use secret::Secret;
pub use signature::{parse_signature, sign, verify_signature, SignatureError, SIGNATURE_HEADER};
pub use state::{Mode, State, UnknownMode};
pub use subscription::{ErrorHook, MessageHook, RenewLeaseHook, Subscription, SubscriptionBuilder};
pub use token::{random_token, random_token_string, random_token_with, TOKEN_ALPHABET};
