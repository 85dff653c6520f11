// Coordination channel: start/stop commands over the store's pub/sub, driving the session manager.

pub mod message;

pub use message::{Command, CommandMessage};

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::session_manager::SessionManager;
use crate::store::StateStore;

pub const DEFAULT_CHANNEL: &str = "stress_test_client";

pub struct CoordinationChannel {
    store: Arc<dyn StateStore>,
    channel: String,
    liveness_interval: Duration,
}

impl CoordinationChannel {
    pub fn new(store: Arc<dyn StateStore>, channel: &str, liveness_interval: Duration) -> Self {
        Self {
            store,
            channel: channel.to_string(),
            liveness_interval,
        }
    }

    /// Publishes a command. Returns how many listeners received it.
    #[instrument(skip(self), fields(channel = %self.channel, operation = "publish"))]
    pub async fn call(&self, test_id: &str, command: Command) -> Result<usize> {
        let message = CommandMessage {
            command,
            test_id: test_id.to_string(),
        };
        let payload = message.encode()?;
        let receivers = self.store.publish(&self.channel, &payload).await?;
        debug!(receivers, "command published");
        Ok(receivers)
    }

    /// Receives commands until `shutdown` fires or the store stops answering. Liveness is
    /// re-checked before every receive, and at least once per `liveness_interval` while idle.
    /// Any active session is stopped before returning.
    pub async fn listen(
        &self,
        manager: &mut SessionManager,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let result = self.receive_loop(manager, &shutdown).await;
        manager.shutdown().await;
        result
    }

    async fn receive_loop(
        &self,
        manager: &mut SessionManager,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let subscribed = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("listener shutting down before subscribing");
                return Ok(());
            }
            r = tokio::time::timeout(
                self.liveness_interval,
                self.store.subscribe(&self.channel),
            ) => r,
        };
        let mut messages = match subscribed {
            Ok(stream) => stream?,
            Err(_) => {
                warn!(channel = %self.channel, "subscribe timed out");
                return Err(Error::StoreUnreachable(format!(
                    "subscribe to {} timed out after {:?}",
                    self.channel, self.liveness_interval
                )));
            }
        };
        info!(channel = %self.channel, "listening for commands");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("listener shutting down");
                    return Ok(());
                }
                alive = self.check_liveness() => alive?,
            }

            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("listener shutting down");
                    return Ok(());
                }
                r = tokio::time::timeout(self.liveness_interval, messages.next()) => r,
            };

            match received {
                Err(_) => continue,
                Ok(None) => {
                    warn!(channel = %self.channel, "subscription closed");
                    return Err(Error::StoreUnreachable(format!(
                        "subscription to {} closed",
                        self.channel
                    )));
                }
                Ok(Some(payload)) => dispatch(manager, &payload).await,
            }
        }
    }

    /// Pings the store; no answer within `liveness_interval` counts as unreachable.
    async fn check_liveness(&self) -> Result<()> {
        let err = match tokio::time::timeout(self.liveness_interval, self.store.ping()).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => Error::from(e),
            Err(_) => Error::StoreUnreachable(format!(
                "ping unanswered after {:?}",
                self.liveness_interval
            )),
        };
        warn!(error = %err, operation = "check_liveness", "coordination store lost");
        Err(err)
    }
}

async fn dispatch(manager: &mut SessionManager, payload: &str) {
    let message = match CommandMessage::decode(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, payload, "dropping coordination message");
            return;
        }
    };
    match manager.handle(&message).await {
        Ok(transition) => debug!(?transition, "command applied"),
        Err(e) => warn!(error = %e, test_id = %message.test_id, "command ignored"),
    }
}
