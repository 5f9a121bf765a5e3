//! The subscription record and its lifecycle hooks.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use callback_server::CallbackRequest;
use futures::future::BoxFuture;
use parking_lot::{Mutex, MutexGuard};
use url::Url;

use crate::config::SubscriberConfig;
use crate::discover;
use crate::error::{Result, SubscriptionError};
use crate::renewal::{renewal_delay, RenewalTimer};
use crate::secret::Secret;
use crate::state::State;

/// Called with every notification whose signature checks out.
pub type MessageHook = Arc<dyn Fn(&CallbackRequest, &[u8]) + Send + Sync>;

/// Called with errors caused by inbound requests and failed renewals.
pub type ErrorHook = Arc<dyn Fn(SubscriptionError) + Send + Sync>;

/// Called when the lease is due for renewal.
pub type RenewLeaseHook =
    Arc<dyn Fn(Subscription) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A subscription to one topic on one hub.
///
/// `Subscription` is a cheap handle; clones share the same record. The
/// mutable part (hub, callback, secret, state, lease expiry and the pending
/// renewal timer) sits behind a single mutex, so a verification request, a
/// notification and a firing renewal never observe a torn record.
///
/// # Example
///
/// ```no_run
/// use url::Url;
/// use websub::Subscription;
///
/// # async fn run() -> websub::Result<()> {
/// let subscription = Subscription::builder(Url::parse("https://example.com/feed.xml")?)
///     .callback(Url::parse("https://this-server.example/subs/abc123")?)
///     .on_message(|_request, body| println!("{} bytes", body.len()))
///     .on_error(|err| eprintln!("{err}"))
///     .on_renew_lease(|subscription| async move { subscription.subscribe().await })
///     .build()?;
///
/// subscription.discover().await?;
/// subscription.subscribe().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

struct Inner {
    topic: Url,
    client: reqwest::Client,
    config: SubscriberConfig,
    hooks: Hooks,
    record: Mutex<Record>,
}

#[derive(Default)]
struct Hooks {
    on_message: Option<MessageHook>,
    on_error: Option<ErrorHook>,
    on_renew_lease: Option<RenewLeaseHook>,
}

/// Everything about a subscription that changes after construction.
pub(crate) struct Record {
    pub(crate) hub: Option<Url>,
    pub(crate) callback: Option<Url>,
    pub(crate) secret: Option<Secret>,
    pub(crate) state: State,
    pub(crate) lease_expiry: Option<SystemTime>,
    renewal: Option<RenewalTimer>,
}

impl Subscription {
    /// Start building a subscription to `topic`.
    pub fn builder(topic: Url) -> SubscriptionBuilder {
        SubscriptionBuilder::new(topic)
    }

    /// The topic this subscription receives notifications for.
    pub fn topic(&self) -> &Url {
        &self.inner.topic
    }

    pub fn hub(&self) -> Option<Url> {
        self.lock().hub.clone()
    }

    pub fn set_hub(&self, hub: Url) {
        self.lock().hub = Some(hub);
    }

    /// The URL the hub calls back on.
    pub fn callback(&self) -> Option<Url> {
        self.lock().callback.clone()
    }

    pub fn set_callback(&self, callback: Url) {
        self.lock().callback = Some(callback);
    }

    pub fn secret(&self) -> Option<Secret> {
        self.lock().secret.clone()
    }

    pub fn set_secret(&self, secret: Secret) {
        self.lock().secret = Some(secret);
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    /// When the current lease runs out. Only set while subscribed.
    pub fn lease_expiry(&self) -> Option<SystemTime> {
        self.lock().lease_expiry
    }

    /// The client used for discovery and hub requests.
    pub fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    pub fn config(&self) -> &SubscriberConfig {
        &self.inner.config
    }

    /// Discover the hub advertised by the topic and remember it.
    ///
    /// Returns the discovered hub. When the topic advertises none, the
    /// current hub is left as it is and `Ok(None)` is returned.
    pub async fn discover(&self) -> Result<Option<Url>> {
        let hub = discover::discover(self.topic(), self.client()).await?;
        if let Some(hub) = &hub {
            self.set_hub(hub.clone());
        }
        Ok(hub)
    }

    /// Arm the renewal timer for the current lease, replacing any pending one.
    ///
    /// Fires after three quarters (by default) of the time left until
    /// `lease_expiry`, immediately if there is no lease or it already ran out.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the timer is a
    /// spawned task.
    pub fn schedule_renewal(&self) {
        let mut record = self.lock();
        self.arm_renewal(&mut record);
    }

    /// Cancel the pending renewal.
    ///
    /// Returns `true` if a renewal was pending and is now canceled; `false`
    /// if none was armed or it already started firing. Never blocks on an
    /// in-flight renewal and leaves the state untouched.
    pub fn cancel_renewal(&self) -> bool {
        let timer = self.lock().renewal.take();
        timer.map(|timer| timer.cancel()).unwrap_or(false)
    }

    /// Whether a renewal timer is armed and has not fired yet.
    pub fn has_pending_renewal(&self) -> bool {
        self.lock()
            .renewal
            .as_ref()
            .map(RenewalTimer::is_pending)
            .unwrap_or(false)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Record> {
        self.inner.record.lock()
    }

    pub(crate) fn on_message(&self) -> Option<&MessageHook> {
        self.inner.hooks.on_message.as_ref()
    }

    /// Hand an error to `on_error`, or drop it if no hook is registered.
    ///
    /// Never call this while holding the record lock; the hook may call back
    /// into the subscription.
    pub(crate) fn report_error(&self, error: SubscriptionError) {
        tracing::warn!(topic = %self.topic(), error = %error, "subscription error");
        if let Some(on_error) = &self.inner.hooks.on_error {
            on_error(error);
        }
    }

    /// Replace the pending renewal with one for `record.lease_expiry`.
    pub(crate) fn arm_renewal(&self, record: &mut Record) {
        if let Some(previous) = record.renewal.take() {
            previous.cancel();
        }

        let now = SystemTime::now();
        let delay = renewal_delay(
            record.lease_expiry.unwrap_or(now),
            now,
            self.inner.config.renewal_fraction,
        );
        tracing::debug!(topic = %self.topic(), ?delay, "scheduled lease renewal");

        let weak = Arc::downgrade(&self.inner);
        record.renewal = Some(RenewalTimer::arm(delay, renew_lease(weak)));
    }

    /// Drop the lease and retire its renewal.
    pub(crate) fn clear_lease(record: &mut Record) -> bool {
        record.lease_expiry = None;
        record
            .renewal
            .take()
            .map(|timer| timer.cancel())
            .unwrap_or(false)
    }
}

/// Body of a firing renewal timer.
///
/// Holds only a weak reference while sleeping so a pending timer never keeps
/// a dropped subscription alive.
async fn renew_lease(inner: Weak<Inner>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let subscription = Subscription { inner };

    let Some(hook) = subscription.inner.hooks.on_renew_lease.clone() else {
        tracing::debug!(topic = %subscription.topic(), "lease due but no renewal hook registered");
        return;
    };

    tracing::info!(topic = %subscription.topic(), "renewing lease");
    if let Err(e) = hook(subscription.clone()).await {
        subscription.report_error(e);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.lock();
        f.debug_struct("Subscription")
            .field("topic", &self.inner.topic.as_str())
            .field("hub", &record.hub.as_ref().map(Url::as_str))
            .field("callback", &record.callback.as_ref().map(Url::as_str))
            .field("state", &record.state)
            .field("lease_expiry", &record.lease_expiry)
            .finish()
    }
}

/// Builder for [`Subscription`].
pub struct SubscriptionBuilder {
    topic: Url,
    hub: Option<Url>,
    callback: Option<Url>,
    secret: Option<Secret>,
    client: Option<reqwest::Client>,
    config: SubscriberConfig,
    hooks: Hooks,
}

impl SubscriptionBuilder {
    pub fn new(topic: Url) -> Self {
        Self {
            topic,
            hub: None,
            callback: None,
            secret: None,
            client: None,
            config: SubscriberConfig::default(),
            hooks: Hooks::default(),
        }
    }

    pub fn hub(mut self, hub: Url) -> Self {
        self.hub = Some(hub);
        self
    }

    /// The URL the hub should call back on. It may carry a query string;
    /// embed a hard-to-guess path component so strangers cannot drive the
    /// state machine.
    pub fn callback(mut self, callback: Url) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Use a fixed secret instead of generating one at subscribe time.
    pub fn secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Share an existing HTTP client instead of building one from the config.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(mut self, config: SubscriberConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_message<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallbackRequest, &[u8]) + Send + Sync + 'static,
    {
        self.hooks.on_message = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(SubscriptionError) + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    /// Called when the lease is due. Errors it returns go to `on_error`.
    pub fn on_renew_lease<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Subscription) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let hook: RenewLeaseHook =
            Arc::new(move |subscription| -> BoxFuture<'static, Result<()>> {
                Box::pin(hook(subscription))
            });
        self.hooks.on_renew_lease = Some(hook);
        self
    }

    /// Validate the configuration and build the subscription.
    pub fn build(self) -> Result<Subscription> {
        self.config.validate()?;
        let client = match self.client {
            Some(client) => client,
            None => self.config.build_client()?,
        };

        Ok(Subscription {
            inner: Arc::new(Inner {
                topic: self.topic,
                client,
                config: self.config,
                hooks: self.hooks,
                record: Mutex::new(Record {
                    hub: self.hub,
                    callback: self.callback,
                    secret: self.secret,
                    state: State::Unsubscribed,
                    lease_expiry: None,
                    renewal: None,
                }),
            }),
        })
    }
}
