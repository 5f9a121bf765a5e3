//! Callback protocol handling: the verification handshake and notification
//! delivery.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use callback_server::http::{Method, StatusCode};
use callback_server::{CallbackHandler, CallbackRequest, CallbackResponse};
use url::Url;

use crate::error::SubscriptionError;
use crate::signature::{parse_signature, verify_signature, SIGNATURE_HEADER};
use crate::state::{Mode, State};
use crate::subscription::Subscription;

#[async_trait]
impl CallbackHandler for Subscription {
    async fn handle(&self, request: CallbackRequest) -> CallbackResponse {
        match request.method {
            Method::GET => self.verify(&request),
            Method::POST => self.deliver(&request),
            _ => {
                self.report_error(SubscriptionError::request(&request, "Unknown request"));
                CallbackResponse::error(StatusCode::BAD_REQUEST, "Unknown request")
            }
        }
    }
}

/// What a verification request asks for, once the record has been updated.
enum Verified {
    Challenge(String),
    Denied { reason: String },
    Unexpected { mode: String, state: State },
}

impl Subscription {
    /// Handle a verification GET.
    ///
    /// The state check and the transition happen under one lock, so a
    /// response is only sent once the transition (and its renewal timer) is
    /// fully committed. Hooks run after the lock is released.
    fn verify(&self, request: &CallbackRequest) -> CallbackResponse {
        if !self.topic_matches(request.query_param("hub.topic").as_deref()) {
            self.report_error(SubscriptionError::request(request, "Topic not found"));
            return CallbackResponse::error(StatusCode::NOT_FOUND, "Topic not found");
        }

        let mode = request.query_param("hub.mode").unwrap_or_default();
        let outcome = match self.apply_verification(request, &mode) {
            Ok(outcome) => outcome,
            Err(message) => {
                self.report_error(SubscriptionError::request(request, message.clone()));
                return CallbackResponse::error(StatusCode::BAD_REQUEST, message);
            }
        };

        match outcome {
            Verified::Challenge(challenge) => CallbackResponse::text(challenge),
            Verified::Denied { reason } => {
                self.report_error(SubscriptionError::Denied {
                    topic: self.topic().to_string(),
                    reason,
                });
                CallbackResponse::ok()
            }
            Verified::Unexpected { mode, state } => {
                self.report_error(SubscriptionError::request(
                    request,
                    format!("Received mode: {mode} in state: {state}"),
                ));
                CallbackResponse::ok()
            }
        }
    }

    fn apply_verification(
        &self,
        request: &CallbackRequest,
        mode: &str,
    ) -> Result<Verified, String> {
        let parsed = mode.parse::<Mode>();
        let mut record = self.lock();

        // Denial is honored in any state
        if record.state != State::Requested && parsed != Ok(Mode::Denied) {
            return Ok(Verified::Unexpected {
                mode: mode.to_string(),
                state: record.state,
            });
        }

        match parsed.map_err(|e| e.to_string())? {
            Mode::Denied => {
                record.state = State::Unsubscribed;
                Subscription::clear_lease(&mut record);
                return Ok(Verified::Denied {
                    reason: request.query_param("hub.reason").unwrap_or_default(),
                });
            }
            Mode::Subscribe => {
                let expiry = parse_lease(request.query_param("hub.lease_seconds").as_deref())?;
                record.state = State::Subscribed;
                record.lease_expiry = Some(expiry);
                self.arm_renewal(&mut record);
                tracing::info!(topic = %self.topic(), "subscription verified");
            }
            Mode::Unsubscribe => {
                record.state = State::Unsubscribed;
                Subscription::clear_lease(&mut record);
                tracing::info!(topic = %self.topic(), "unsubscription verified");
            }
        }

        Ok(Verified::Challenge(
            request.query_param("hub.challenge").unwrap_or_default(),
        ))
    }

    /// Handle a notification POST.
    fn deliver(&self, request: &CallbackRequest) -> CallbackResponse {
        let Some(on_message) = self.on_message() else {
            return CallbackResponse::ok();
        };

        let digest = match parse_signature(request.header(SIGNATURE_HEADER)) {
            Ok(digest) => digest,
            Err(e) => {
                let message = e.to_string();
                self.report_error(SubscriptionError::request(request, message.clone()));
                return CallbackResponse::error(StatusCode::BAD_REQUEST, message);
            }
        };

        let secret = self.secret();
        let verified = secret
            .as_ref()
            .map(|secret| verify_signature(secret.as_bytes(), &request.body, &digest))
            .unwrap_or(false);

        if verified {
            tracing::debug!(topic = %self.topic(), body_len = request.body.len(), "notification received");
            on_message(request, &request.body);
        } else {
            self.report_error(SubscriptionError::request(request, "Invalid HMAC signature"));
        }
        CallbackResponse::ok()
    }

    fn topic_matches(&self, topic: Option<&str>) -> bool {
        topic
            .and_then(|topic| Url::parse(topic).ok())
            .map(|topic| &topic == self.topic())
            .unwrap_or(false)
    }
}

/// Turn `hub.lease_seconds` into an absolute expiry.
fn parse_lease(lease_seconds: Option<&str>) -> Result<SystemTime, String> {
    let raw = lease_seconds.unwrap_or_default();
    let seconds: u64 = raw
        .parse()
        .map_err(|_| format!("Invalid hub.lease_seconds: {raw:?}"))?;

    SystemTime::now()
        .checked_add(Duration::from_secs(seconds))
        .ok_or_else(|| format!("hub.lease_seconds out of range: {seconds}"))
}
