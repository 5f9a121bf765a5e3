//! Generic HTTP callback server for hub verification and notification requests.
//!
//! This crate provides a lightweight HTTP server that subscription handlers
//! hang off. It has no knowledge of the subscription protocol itself.
//!
//! # Overview
//!
//! The callback server consists of three main components:
//!
//! - [`CallbackServer`]: HTTP server that binds a listener and accepts every
//!   method on every path.
//! - [`CallbackRouter`]: Routes incoming requests by exact path to the
//!   [`CallbackHandler`] registered for that path.
//! - [`CallbackRequest`] / [`CallbackResponse`]: transport-neutral request and
//!   reply types, so handlers can be tested without a socket.
//!
//! All protocol logic (verification handshakes, signatures, state) lives in
//! the handlers registered by the consuming crate.
//!
//! # Example: Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use callback_server::{CallbackHandler, CallbackRequest, CallbackResponse, CallbackServer};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl CallbackHandler for Echo {
//!     async fn handle(&self, request: CallbackRequest) -> CallbackResponse {
//!         CallbackResponse::text(request.query_param("hub.challenge").unwrap_or_default())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = CallbackServer::bind(([127, 0, 0, 1], 0).into()).await?;
//!     server.router().register("/echo", Arc::new(Echo)).await;
//!
//!     println!("Callback server listening at: {}/echo", server.base_url());
//!
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod request;
pub mod router;
pub mod server;

pub use error::{CallbackServerError, Result};
pub use request::{CallbackHandler, CallbackRequest, CallbackResponse};
pub use router::CallbackRouter;
pub use server::{CallbackServer, DEFAULT_BODY_LIMIT};

/// HTTP types used in requests and responses.
pub use warp::http;
