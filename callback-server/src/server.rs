//! HTTP server for receiving hub verification requests and notifications.

use std::net::SocketAddr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{Stream, TryStreamExt};
use tokio::sync::mpsc;
use warp::http::{HeaderMap, Method, StatusCode};
use warp::Filter;

use crate::error::{CallbackServerError, Result};
use crate::request::CallbackRequest;
use crate::router::CallbackRouter;

/// Largest request body accepted by [`CallbackServer::bind`] and
/// [`CallbackServer::with_router`].
pub const DEFAULT_BODY_LIMIT: u64 = 8 * 1024 * 1024;

/// HTTP callback server for subscription endpoints.
///
/// The `CallbackServer` binds a listener and accepts every method on every
/// path. Each request is converted into a [`CallbackRequest`] and routed by
/// path through a [`CallbackRouter`]; requests for unregistered paths get a
/// `404` before their body is read. Bodies larger than the server's limit
/// get a `413` and never reach a handler.
///
/// # Example
///
/// ```no_run
/// use callback_server::CallbackServer;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = CallbackServer::bind(([0, 0, 0, 0], 8080).into()).await?;
///
///     println!("Server listening at: {}", server.base_url());
///
///     server.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct CallbackServer {
    /// The address the server is bound to
    local_addr: SocketAddr,
    /// Router for handling incoming requests
    router: CallbackRouter,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind a new callback server with an empty router.
    ///
    /// Port `0` asks the OS for a free port; use [`CallbackServer::local_addr`]
    /// to find out which one was chosen.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Self::with_router(addr, CallbackRouter::new()).await
    }

    /// Bind a new callback server that routes through `router`.
    ///
    /// The listener is bound before this returns, so a hub can reach the
    /// callback as soon as the caller starts subscribing.
    pub async fn with_router(addr: SocketAddr, router: CallbackRouter) -> Result<Self> {
        Self::with_body_limit(addr, router, DEFAULT_BODY_LIMIT).await
    }

    /// Bind a new callback server that routes through `router` and rejects
    /// request bodies over `body_limit` bytes.
    pub async fn with_body_limit(
        addr: SocketAddr,
        router: CallbackRouter,
        body_limit: u64,
    ) -> Result<Self> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let routes = Self::routes(router.clone(), body_limit);
        let (local_addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, async move {
                shutdown_rx.recv().await;
            })
            .map_err(|source| CallbackServerError::Bind { addr, source })?;

        tracing::info!(addr = %local_addr, body_limit, "callback server listening");
        let server_handle = tokio::spawn(server);

        Ok(Self {
            local_addr,
            router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://<local_addr>`, handy for tests and local setups.
    ///
    /// Hubs usually need a public URL instead; the daemon takes that from its
    /// configuration.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Get a reference to the router.
    ///
    /// The router can be used to register and unregister callback paths
    /// while the server is running.
    pub fn router(&self) -> &CallbackRouter {
        &self.router
    }

    /// Shutdown the callback server gracefully.
    ///
    /// Sends a shutdown signal to the HTTP server and waits for it to finish
    /// any in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.server_handle.take() {
            handle.await?;
        }

        tracing::info!(addr = %self.local_addr, "callback server stopped");
        Ok(())
    }

    /// Build the catch-all route.
    fn routes(
        router: CallbackRouter,
        body_limit: u64,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
        // warp::query::raw rejects requests without a query string
        let query = warp::query::raw()
            .or(warp::any().map(String::new))
            .unify();
        let router = warp::any().map(move || router.clone());

        // The path is checked before the body so unknown paths cost nothing
        let registered = warp::path::full()
            .and(router.clone())
            .and_then(|path: warp::path::FullPath, router: CallbackRouter| async move {
                if router.is_registered(path.as_str()).await {
                    Ok(())
                } else {
                    Err(warp::reject::not_found())
                }
            })
            .untuple_one();

        // warp::body::content_length_limit would also reject bodyless GETs
        // and chunked POSTs, which carry no Content-Length
        let body = warp::header::optional::<u64>("content-length")
            .and(warp::body::stream())
            .and_then(move |length, stream| read_body(length, stream, body_limit));

        warp::method()
            .and(warp::path::full())
            .and(query)
            .and(warp::header::headers_cloned())
            .and(registered)
            .and(body)
            .and(router)
            .and_then(dispatch)
            .recover(handle_rejection)
    }
}

/// The request body was larger than the server accepts.
#[derive(Debug)]
struct BodyTooLarge;

impl warp::reject::Reject for BodyTooLarge {}

/// The connection failed while the body was being read.
#[derive(Debug)]
struct BodyReadFailed;

impl warp::reject::Reject for BodyReadFailed {}

/// Collect a request body of at most `limit` bytes.
///
/// A declared `Content-Length` over the limit is refused without reading
/// anything; otherwise reading stops as soon as the limit is passed.
async fn read_body<S, B>(
    length: Option<u64>,
    stream: S,
    limit: u64,
) -> std::result::Result<Bytes, warp::Rejection>
where
    S: Stream<Item = std::result::Result<B, warp::Error>>,
    B: Buf,
{
    if length.is_some_and(|length| length > limit) {
        return Err(warp::reject::custom(BodyTooLarge));
    }

    futures::pin_mut!(stream);
    let mut body = BytesMut::new();
    while let Some(chunk) = stream.try_next().await.map_err(|e| {
        tracing::debug!(error = %e, "failed to read callback request body");
        warp::reject::custom(BodyReadFailed)
    })? {
        if (body.len() + chunk.remaining()) as u64 > limit {
            return Err(warp::reject::custom(BodyTooLarge));
        }
        body.put(chunk);
    }
    Ok(body.freeze())
}

/// Convert the request and hand it to the router.
async fn dispatch(
    method: Method,
    path: warp::path::FullPath,
    query: String,
    headers: HeaderMap,
    body: Bytes,
    router: CallbackRouter,
) -> std::result::Result<warp::reply::WithStatus<String>, warp::Rejection> {
    tracing::debug!(
        method = %method,
        path = path.as_str(),
        body_len = body.len(),
        "incoming callback request"
    );

    let request = CallbackRequest {
        method,
        path: path.as_str().to_string(),
        query,
        headers,
        body,
    };

    match router.route(request).await {
        Some(response) => Ok(warp::reply::with_status(response.body, response.status)),
        None => {
            tracing::debug!(path = path.as_str(), "no handler registered for path");
            Err(warp::reject::not_found())
        }
    }
}

/// Handle rejections and convert them to HTTP responses.
async fn handle_rejection(
    err: warp::Rejection,
) -> std::result::Result<impl warp::Reply, std::convert::Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Callback not found";
    } else if err.find::<BodyTooLarge>().is_some() {
        tracing::debug!("callback request body too large");
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large";
    } else if err.find::<BodyReadFailed>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Unreadable body";
    } else if err.find::<warp::reject::InvalidHeader>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid header";
    } else {
        tracing::warn!(rejection = ?err, "callback request rejected");
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error";
    }

    Ok(warp::reply::with_status(message, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{CallbackHandler, CallbackResponse};
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[tokio::test]
    async fn test_callback_server_creation() {
        let server = CallbackServer::bind(loopback()).await;
        assert!(server.is_ok());

        let server = server.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server
            .base_url()
            .contains(&server.local_addr().port().to_string()));

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = CallbackServer::bind(loopback()).await.unwrap();

        let second = CallbackServer::bind(first.local_addr()).await;
        assert!(matches!(second, Err(CallbackServerError::Bind { .. })));

        first.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unregistered_path_is_not_found() {
        let server = CallbackServer::bind(loopback()).await.unwrap();

        let response = warp::test::request()
            .method("GET")
            .path("/nobody-home?hub.mode=subscribe")
            .reply(&CallbackServer::routes(server.router().clone(), DEFAULT_BODY_LIMIT))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        server.shutdown().await.unwrap();
    }

    /// Counts the requests that reach it.
    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CallbackHandler for Counter {
        async fn handle(&self, request: CallbackRequest) -> CallbackResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CallbackResponse::text(request.body.len().to_string())
        }
    }

    async fn counted_router() -> (CallbackRouter, Arc<Counter>) {
        let router = CallbackRouter::new();
        let counter = Arc::new(Counter::default());
        router.register("/sub", counter.clone()).await;
        (router, counter)
    }

    #[tokio::test]
    async fn test_body_within_limit_is_delivered() {
        let (router, counter) = counted_router().await;

        let response = warp::test::request()
            .method("POST")
            .path("/sub")
            .body(vec![b'x'; 1024])
            .reply(&CallbackServer::routes(router, 1024))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "1024");
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let (router, counter) = counted_router().await;

        let response = warp::test::request()
            .method("POST")
            .path("/sub")
            .body(vec![b'x'; 1025])
            .reply(&CallbackServer::routes(router, 1024))
            .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_to_unknown_path_is_not_found() {
        let (router, counter) = counted_router().await;

        let response = warp::test::request()
            .method("POST")
            .path("/elsewhere")
            .body(vec![b'x'; 4096])
            .reply(&CallbackServer::routes(router, 1024))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_without_body_passes_limit() {
        let (router, counter) = counted_router().await;

        let response = warp::test::request()
            .method("GET")
            .path("/sub?hub.challenge=abc")
            .reply(&CallbackServer::routes(router, 0))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undeclared_length_is_cut_off() {
        fn chunks(
            parts: &[&'static [u8]],
        ) -> impl Stream<Item = std::result::Result<Bytes, warp::Error>> {
            let parts: Vec<_> = parts
                .iter()
                .map(|part| Ok(Bytes::from_static(part)))
                .collect();
            futures::stream::iter(parts)
        }

        let rejection = read_body(None, chunks(&[b"0123", b"4567", b"89"]), 8)
            .await
            .unwrap_err();
        assert!(rejection.find::<BodyTooLarge>().is_some());

        let body = read_body(None, chunks(&[b"0123", b"4567"]), 8).await.unwrap();
        assert_eq!(&body[..], b"01234567");
    }
}
