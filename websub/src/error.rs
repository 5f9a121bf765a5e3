//! Error types for the websub crate.

use callback_server::http::{HeaderMap, Method, StatusCode};
use callback_server::CallbackRequest;

/// Errors produced by subscriptions.
///
/// Errors from caller-initiated operations (discovery, subscribe,
/// unsubscribe) are returned directly. Errors caused by inbound callback
/// requests are never returned from the handler; they are passed to the
/// subscription's `on_error` hook instead.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// An inbound callback request was malformed or contextually invalid
    ///
    /// Signature failures land here too. Signatures only cover the body, so a
    /// request that passes the check may still carry tampered headers.
    #[error("{message} ({method} {path})")]
    Request {
        /// What was wrong with the request
        message: String,
        /// Method of the offending request
        method: Method,
        /// Path of the offending request
        path: String,
    },

    /// The hub refused or revoked the subscription
    #[error("Subscription to {topic} denied: {reason}")]
    Denied {
        /// The topic the denial was issued for
        topic: String,
        /// Free-text reason supplied by the hub
        reason: String,
    },

    /// A hub or topic server answered with something other than expected
    #[error("{message} (HTTP {status})")]
    Response {
        /// What was expected
        message: String,
        /// Status code of the response
        status: StatusCode,
        /// Response headers
        headers: HeaderMap,
        /// Response body, lossily decoded
        body: String,
    },

    /// The Content-Type of a response could not be parsed
    #[error("Malformed Content-Type header: {0:?}")]
    MalformedContentType(String),

    /// No hub URL is known for the subscription
    #[error("Subscription has no hub; set one or discover it first")]
    MissingHub,

    /// No callback URL is set on the subscription
    #[error("Subscription has no callback URL")]
    MissingCallback,

    /// The secret is empty, too long or not text
    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure or body read failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL could not be parsed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl SubscriptionError {
    /// A request error describing `request`.
    pub(crate) fn request(request: &CallbackRequest, message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
            method: request.method.clone(),
            path: request.path.clone(),
        }
    }

    /// A response error that keeps the whole response for diagnostics.
    pub(crate) async fn response(message: impl Into<String>, response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();

        Self::Response {
            message: message.into(),
            status,
            headers,
            body,
        }
    }
}

/// Convenience type alias for Results using SubscriptionError.
pub type Result<T> = std::result::Result<T, SubscriptionError>;
