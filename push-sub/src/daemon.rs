//! Wiring configured subscriptions to a callback server.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use callback_server::CallbackServer;
use futures::future::join_all;
use tracing::{error, info, warn};
use url::Url;
use websub::{random_token_string, Subscription};

use crate::command::MessageCommand;
use crate::config::{Config, SubscriptionConfig};

/// Length of the random callback path. Nobody who has not been told the
/// callback URL can drive a subscription's state machine.
const CALLBACK_TOKEN_LEN: usize = 99;

/// A subscription with the settings it was configured with.
#[derive(Debug, Clone)]
pub struct ManagedSubscription {
    pub name: String,
    pub subscription: Subscription,
    pub lease_seconds: u32,
}

pub struct Daemon {
    server: CallbackServer,
    subscriptions: Vec<ManagedSubscription>,
}

impl Daemon {
    /// Resolve every subscription's hub, then start listening.
    ///
    /// Nothing is sent to a hub yet.
    pub async fn start(config: &Config) -> Result<Self> {
        let mut subscriptions = Vec::with_capacity(config.subscriptions.len());
        for (name, subscription) in &config.subscriptions {
            let managed = prepare_subscription(name, subscription, &config.base_path)
                .await
                .with_context(|| format!("Failed to set up subscription {name}"))?;
            subscriptions.push(managed);
        }

        let server = CallbackServer::bind(config.address)
            .await
            .context("Failed to start callback server")?;

        for managed in &subscriptions {
            let Some(callback) = managed.subscription.callback() else {
                continue;
            };
            server
                .router()
                .register(callback.path(), Arc::new(managed.subscription.clone()))
                .await;
            info!(name = %managed.name, endpoint = %callback, "registered");
        }

        Ok(Self {
            server,
            subscriptions,
        })
    }

    /// Subscribe everything until Ctrl-C, then unsubscribe everything.
    ///
    /// If a subscribe request fails the server is shut down and the error
    /// returned.
    pub async fn run(self) -> Result<()> {
        tokio::select! {
            result = self.subscribe_all() => {
                if let Err(e) = result {
                    error!(error = %e, "shutting down");
                    self.server.shutdown().await?;
                    return Err(e);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                return self.shutdown().await;
            }
        }

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        self.shutdown().await
    }

    /// Subscribe every configured subscription, one after another.
    pub async fn subscribe_all(&self) -> Result<()> {
        for managed in &self.subscriptions {
            info!(name = %managed.name, "subscribing");
            managed
                .subscription
                .subscribe_with_lease(managed.lease_seconds)
                .await
                .with_context(|| format!("Failed to subscribe {}", managed.name))?;
            info!(name = %managed.name, "subscribed");
        }
        Ok(())
    }

    /// Stop renewing and unsubscribe everything concurrently.
    ///
    /// Failures are logged, not returned.
    pub async fn unsubscribe_all(&self) {
        let requests = self.subscriptions.iter().map(|managed| async move {
            managed.subscription.cancel_renewal();
            info!(name = %managed.name, "unsubscribing");
            match managed.subscription.unsubscribe().await {
                Ok(()) => info!(name = %managed.name, "unsubscribed"),
                Err(e) => error!(name = %managed.name, error = %e, "failed to unsubscribe"),
            }
        });
        join_all(requests).await;
    }

    pub async fn shutdown(self) -> Result<()> {
        info!("shutting down");
        self.unsubscribe_all().await;
        self.server
            .shutdown()
            .await
            .context("Failed to stop callback server")
    }
}

/// Build the subscription for one configuration entry, discovering its hub
/// if none is configured.
pub async fn prepare_subscription(
    name: &str,
    config: &SubscriptionConfig,
    base_path: &Url,
) -> Result<ManagedSubscription> {
    let callback = callback_url(base_path, &random_token_string(CALLBACK_TOKEN_LEN))?;
    let lease_seconds = config.lease_seconds.unwrap_or(0);
    let command = MessageCommand::new(config.bin.clone(), config.args.clone());

    let subscription = Subscription::builder(config.topic.clone())
        .callback(callback)
        .on_message({
            let name = name.to_string();
            move |_request, body| {
                info!(name = %name, "received message");
                command.spawn(name.clone(), body.to_vec());
            }
        })
        .on_error({
            let name = name.to_string();
            move |err| warn!(name = %name, error = %err, "subscription error")
        })
        .on_renew_lease({
            let name = name.to_string();
            move |subscription| {
                info!(name = %name, "renewing");
                async move { subscription.subscribe_with_lease(lease_seconds).await }
            }
        })
        .build()?;

    match &config.hub {
        Some(hub) => subscription.set_hub(hub.clone()),
        None => {
            info!(name = %name, "discovering hub");
            let discovered = subscription
                .discover()
                .await?
                .ok_or_else(|| anyhow!("{} advertises no hub", config.topic))?;
            let hub = secure_hub(discovered, config.allow_insecure)?;
            info!(name = %name, hub = %hub, "discovered hub");
            subscription.set_hub(hub);
        }
    }

    Ok(ManagedSubscription {
        name: name.to_string(),
        subscription,
        lease_seconds,
    })
}

/// The public callback URL for `token`.
///
/// The path is always `/<token>`, the same path the server routes on, so a
/// path component in `base_path` is replaced.
pub fn callback_url(base_path: &Url, token: &str) -> Result<Url> {
    Ok(base_path.join(&format!("/{token}"))?)
}

/// Force a discovered hub onto https unless insecure hubs are allowed.
pub fn secure_hub(mut hub: Url, allow_insecure: bool) -> Result<Url> {
    if !allow_insecure && hub.scheme() != "https" {
        hub.set_scheme("https")
            .map_err(|()| anyhow!("Cannot use https for hub {hub}"))?;
    }
    Ok(hub)
}
