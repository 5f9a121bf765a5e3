//! Subscribe and unsubscribe requests sent to the hub.

use callback_server::http::StatusCode;

use crate::error::{Result, SubscriptionError};
use crate::secret::Secret;
use crate::state::{Mode, State};
use crate::subscription::Subscription;

impl Subscription {
    /// Ask the hub for a subscription with the hub's default lease.
    pub async fn subscribe(&self) -> Result<()> {
        self.subscribe_with_lease(0).await
    }

    /// Ask the hub for a subscription, suggesting a lease of `lease_seconds`.
    ///
    /// `0` leaves the lease to the hub. A secret is generated if none is set.
    /// On success the subscription is `Requested`; it only becomes
    /// `Subscribed` once the hub verifies the callback.
    pub async fn subscribe_with_lease(&self, lease_seconds: u32) -> Result<()> {
        self.send(Mode::Subscribe, lease_seconds).await
    }

    /// Ask the hub to end the subscription.
    ///
    /// Like [`Subscription::subscribe`] this completes once the hub accepted
    /// the request; the state changes when the hub verifies it.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.send(Mode::Unsubscribe, 0).await
    }

    async fn send(&self, mode: Mode, lease_seconds: u32) -> Result<()> {
        let hub;
        let mut form: Vec<(&str, String)> = vec![("hub.mode", mode.as_str().to_string())];
        {
            let mut record = self.lock();
            hub = record.hub.clone().ok_or(SubscriptionError::MissingHub)?;
            let callback = record
                .callback
                .clone()
                .ok_or(SubscriptionError::MissingCallback)?;

            if mode == Mode::Subscribe {
                if lease_seconds != 0 {
                    form.push(("hub.lease_seconds", lease_seconds.to_string()));
                }
                let secret_length = self.config().secret_length;
                let secret = record
                    .secret
                    .get_or_insert_with(|| Secret::generate(secret_length));
                form.push(("hub.secret", secret.as_str().to_string()));
            }
            form.push(("hub.callback", callback.to_string()));
            form.push(("hub.topic", self.topic().to_string()));

            // Set before sending; the hub may verify before it answers us
            record.state = State::Requested;
        }

        tracing::info!(hub = %hub, topic = %self.topic(), mode = %mode, "sending request to hub");
        let response = self.client().post(hub).form(&form).send().await?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(SubscriptionError::response("Expected 202 Accepted from hub", response).await);
        }

        tracing::debug!(topic = %self.topic(), mode = %mode, "hub accepted request");
        Ok(())
    }
}
