//! Full round trips: callback server, subscription and a verifying hub.

mod helpers;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use callback_server::CallbackServer;
use helpers::FakeHub;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;
use websub::{random_token_string, sign, State, Subscription, SubscriptionError, SIGNATURE_HEADER};

const TOPIC: &str = "https://example.com/feed.xml";

async fn serve(subscription: &Subscription, server: &CallbackServer) {
    let path = subscription.callback().unwrap().path().to_string();
    server
        .router()
        .register(path, Arc::new(subscription.clone()))
        .await;
}

async fn callback_server() -> CallbackServer {
    CallbackServer::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await
        .unwrap()
}

fn callback_url(server: &CallbackServer) -> Url {
    Url::parse(&format!("{}/{}", server.base_url(), random_token_string(99))).unwrap()
}

#[tokio::test]
async fn test_subscribe_verify_notify_unsubscribe() {
    let mut hub = FakeHub::verifying(3600).await;
    let server = callback_server().await;

    let (messages_tx, mut messages) = mpsc::unbounded_channel();
    let (errors_tx, mut errors) = mpsc::unbounded_channel::<SubscriptionError>();
    let subscription = Subscription::builder(Url::parse(TOPIC).unwrap())
        .hub(hub.url.clone())
        .callback(callback_url(&server))
        .on_message(move |_request, body| {
            let _ = messages_tx.send(body.to_vec());
        })
        .on_error(move |err| {
            let _ = errors_tx.send(err);
        })
        .build()
        .unwrap();
    serve(&subscription, &server).await;

    // Subscribe and let the hub verify
    subscription.subscribe().await.unwrap();
    let verification = hub.next_verification().await;
    assert_eq!(verification.status, 200);
    assert_eq!(verification.body, verification.challenge);
    assert_eq!(subscription.state(), State::Subscribed);
    assert!(subscription.has_pending_renewal());

    let remaining = subscription
        .lease_expiry()
        .unwrap()
        .duration_since(SystemTime::now())
        .unwrap();
    assert!(remaining > Duration::from_secs(3590));

    // Deliver a signed notification
    let body = "<feed><entry><title>hello</title></entry></feed>";
    let secret = subscription.secret().unwrap();
    let response = reqwest::Client::new()
        .post(subscription.callback().unwrap())
        .header(SIGNATURE_HEADER, sign(secret.as_bytes(), body.as_bytes()))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let delivered = timeout(Duration::from_secs(1), messages.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered, body.as_bytes());

    // Unsubscribe and let the hub verify
    subscription.unsubscribe().await.unwrap();
    let verification = hub.next_verification().await;
    assert_eq!(verification.body, verification.challenge);
    assert_eq!(subscription.state(), State::Unsubscribed);
    assert!(subscription.lease_expiry().is_none());
    assert!(!subscription.has_pending_renewal());

    assert!(errors.try_recv().is_err(), "no errors expected");
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_forged_notification_is_not_delivered() {
    let mut hub = FakeHub::verifying(3600).await;
    let server = callback_server().await;

    let (messages_tx, mut messages) = mpsc::unbounded_channel::<Vec<u8>>();
    let (errors_tx, mut errors) = mpsc::unbounded_channel();
    let subscription = Subscription::builder(Url::parse(TOPIC).unwrap())
        .hub(hub.url.clone())
        .callback(callback_url(&server))
        .on_message(move |_request, body| {
            let _ = messages_tx.send(body.to_vec());
        })
        .on_error(move |err| {
            let _ = errors_tx.send(err);
        })
        .build()
        .unwrap();
    serve(&subscription, &server).await;

    subscription.subscribe().await.unwrap();
    hub.next_verification().await;

    let response = reqwest::Client::new()
        .post(subscription.callback().unwrap())
        .header(SIGNATURE_HEADER, sign(b"guessed", b"payload"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let error = timeout(Duration::from_secs(1), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(error, SubscriptionError::Request { .. }));
    assert!(messages.try_recv().is_err());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lease_is_renewed_before_expiry() {
    // A one second lease renews after roughly 750ms
    let mut hub = FakeHub::verifying(1).await;
    let server = callback_server().await;

    let subscription = Subscription::builder(Url::parse(TOPIC).unwrap())
        .hub(hub.url.clone())
        .callback(callback_url(&server))
        .on_renew_lease(|subscription| async move { subscription.subscribe().await })
        .build()
        .unwrap();
    serve(&subscription, &server).await;

    subscription.subscribe().await.unwrap();
    let first = hub.next_request().await;
    hub.next_verification().await;

    let renewal = hub.next_request().await;
    assert_eq!(renewal["hub.mode"], "subscribe");
    assert_eq!(renewal["hub.secret"], first["hub.secret"]);

    hub.next_verification().await;
    assert_eq!(subscription.state(), State::Subscribed);

    subscription.cancel_renewal();
    server.shutdown().await.unwrap();
}
