//! A fake hub for integration tests.
//!
//! Accepts form-encoded subscribe/unsubscribe requests on `/hub`, records
//! them, answers with a fixed status and optionally performs the
//! verification handshake against the callback right away.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;
use warp::http::StatusCode;
use warp::Filter;

pub type Form = HashMap<String, String>;

/// Outcome of a verification GET the hub sent to a callback.
#[derive(Debug)]
pub struct Verification {
    pub status: u16,
    pub body: String,
    pub challenge: String,
}

pub struct FakeHub {
    pub url: Url,
    requests: mpsc::UnboundedReceiver<Form>,
    verifications: mpsc::UnboundedReceiver<Verification>,
}

impl FakeHub {
    /// A hub that answers every request with `status` and never verifies.
    pub async fn start(status: StatusCode) -> Self {
        Self::spawn(status, None).await
    }

    /// A hub that accepts every request and verifies it, granting
    /// `lease_seconds` to subscriptions.
    pub async fn verifying(lease_seconds: u64) -> Self {
        Self::spawn(StatusCode::ACCEPTED, Some(lease_seconds)).await
    }

    async fn spawn(status: StatusCode, lease_seconds: Option<u64>) -> Self {
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (verifications_tx, verifications) = mpsc::unbounded_channel();

        let route = warp::post()
            .and(warp::path("hub"))
            .and(warp::body::form())
            .map(move |form: Form| {
                let _ = requests_tx.send(form.clone());
                if let Some(lease_seconds) = lease_seconds {
                    tokio::spawn(verify_callback(
                        form,
                        lease_seconds,
                        verifications_tx.clone(),
                    ));
                }
                warp::reply::with_status(String::new(), status)
            });

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        Self {
            url: Url::parse(&format!("http://{addr}/hub")).unwrap(),
            requests,
            verifications,
        }
    }

    /// The next request the hub received.
    pub async fn next_request(&mut self) -> Form {
        timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("hub should receive a request")
            .expect("hub is running")
    }

    /// The next verification the hub performed.
    pub async fn next_verification(&mut self) -> Verification {
        timeout(Duration::from_secs(5), self.verifications.recv())
            .await
            .expect("hub should verify the callback")
            .expect("hub is running")
    }
}

async fn verify_callback(
    form: Form,
    lease_seconds: u64,
    verifications: mpsc::UnboundedSender<Verification>,
) {
    let challenge = websub::random_token_string(32);
    let mode = form["hub.mode"].clone();

    let mut callback = Url::parse(&form["hub.callback"]).unwrap();
    {
        let mut query = callback.query_pairs_mut();
        query
            .append_pair("hub.mode", &mode)
            .append_pair("hub.topic", &form["hub.topic"])
            .append_pair("hub.challenge", &challenge);
        if mode == "subscribe" {
            query.append_pair("hub.lease_seconds", &lease_seconds.to_string());
        }
    }

    let response = reqwest::get(callback).await.unwrap();
    let _ = verifications.send(Verification {
        status: response.status().as_u16(),
        body: response.text().await.unwrap(),
        challenge,
    });
}
