//! Transport-neutral request and response types for callback handlers.
//!
//! The server converts every inbound HTTP request into a [`CallbackRequest`]
//! before handing it to a [`CallbackHandler`], so handlers never touch warp
//! types directly and can be exercised in tests without a socket.

use async_trait::async_trait;
use bytes::Bytes;
use warp::http::header::{HeaderName, HeaderValue};
use warp::http::{HeaderMap, Method, StatusCode};

/// An inbound request addressed to a callback endpoint.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    /// HTTP method of the request
    pub method: Method,
    /// Request path, always starting with `/`
    pub path: String,
    /// Raw (still percent-encoded) query string, empty when absent
    pub query: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Full request body
    pub body: Bytes,
}

impl CallbackRequest {
    /// Create a request with no query, headers or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Replace the raw query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Replace the query string with the form encoding of `pairs`.
    pub fn with_query_pairs<'a, I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Decoded value of the first query parameter called `name`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Value of a header as text, if present and valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The reply a handler produces for a [`CallbackRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResponse {
    pub status: StatusCode,
    pub body: String,
}

impl CallbackResponse {
    /// An empty `200 OK`.
    pub fn ok() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// An empty response with the given status.
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// A `200 OK` carrying `body`.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// An error status with a short plain-text explanation.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: message.into(),
        }
    }
}

/// Something that answers requests for one callback path.
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    async fn handle(&self, request: CallbackRequest) -> CallbackResponse;
}
