//! Path-based routing for HTTP callback requests.
//!
//! This module provides the `CallbackRouter` which maps callback paths to the
//! handlers registered for them and forwards every inbound request to the
//! handler owning its path.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::request::{CallbackHandler, CallbackRequest, CallbackResponse};

/// Routes requests from HTTP callbacks to registered handlers.
///
/// Paths are matched exactly. A trailing slash or a different case is a
/// different path, so callers that embed random tokens in paths get an exact
/// capability check for free.
#[derive(Clone, Default)]
pub struct CallbackRouter {
    /// Registered handlers keyed by path
    handlers: Arc<RwLock<HashMap<String, Arc<dyn CallbackHandler>>>>,
}

impl CallbackRouter {
    /// Create an empty router.
    ///
    /// # Example
    ///
    /// ```
    /// use callback_server::CallbackRouter;
    ///
    /// let router = CallbackRouter::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a path.
    ///
    /// A path that does not start with `/` gets one prepended. Registering a
    /// path twice replaces the previous handler.
    ///
    /// # Arguments
    ///
    /// * `path` - The callback path, e.g. `/subs/abc123`
    /// * `handler` - The handler answering requests for this path
    pub async fn register(&self, path: impl Into<String>, handler: Arc<dyn CallbackHandler>) {
        let path = normalize(path.into());
        tracing::debug!(path = %path, "registered callback handler");
        let mut handlers = self.handlers.write().await;
        handlers.insert(path, handler);
    }

    /// Unregister a path.
    ///
    /// Returns `true` if a handler was registered for it.
    pub async fn unregister(&self, path: &str) -> bool {
        let path = normalize(path.to_string());
        let mut handlers = self.handlers.write().await;
        handlers.remove(&path).is_some()
    }

    /// Whether a handler is registered for `path`.
    pub async fn is_registered(&self, path: &str) -> bool {
        let handlers = self.handlers.read().await;
        handlers.contains_key(&normalize(path.to_string()))
    }

    /// Route a request to the handler registered for its path.
    ///
    /// Returns `None` if nothing is registered for the request path. The
    /// registry lock is released before the handler runs, so a slow handler
    /// never blocks registration or other requests.
    pub async fn route(&self, request: CallbackRequest) -> Option<CallbackResponse> {
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&request.path).cloned()
        }?;

        Some(handler.handle(request).await)
    }
}

fn normalize(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}
