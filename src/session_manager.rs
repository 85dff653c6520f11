// Session manager: Idle / Active(test_id) state machine around at most one polling session.

use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, instrument, warn};

use crate::coordination::message::{Command, CommandMessage};
use crate::error::{Error, Result};
use crate::polling::{self, PollingConfig, PollingDeps, PollingSession, SessionExit};
use crate::probe::MetricsProbe;
use crate::sink::SnapshotSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionManagerConfig {
    pub polling: PollingConfig,
    /// How long `stop` waits for the loop before aborting it.
    pub stop_timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&crate::config::MonitoringConfig> for SessionManagerConfig {
    fn from(c: &crate::config::MonitoringConfig) -> Self {
        Self {
            polling: PollingConfig {
                sample_interval_ms: c.sample_interval_ms,
                max_failed_ticks: c.max_failed_ticks,
            },
            stop_timeout: c.stop_timeout(),
        }
    }
}

/// What a handled command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Started(String),
    Stopped { test_id: String, exit: SessionExit },
}

pub struct SessionManager {
    deps: PollingDeps,
    config: SessionManagerConfig,
    active: Option<PollingSession>,
}

impl SessionManager {
    pub fn new(
        probe: Arc<dyn MetricsProbe>,
        sink: Arc<dyn SnapshotSink>,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            deps: PollingDeps { probe, sink },
            config,
            active: None,
        }
    }

    /// A session that ended on its own reads as `Idle`.
    pub fn state(&self) -> SessionState {
        match &self.active {
            Some(s) if !s.is_finished() => SessionState::Active(s.test_id().to_string()),
            _ => SessionState::Idle,
        }
    }

    pub async fn handle(&mut self, message: &CommandMessage) -> Result<Transition> {
        match message.command {
            Command::Start => self.start(&message.test_id).await.map(Transition::Started),
            Command::Stop => {
                let (test_id, exit) = self.stop(&message.test_id).await?;
                Ok(Transition::Stopped { test_id, exit })
            }
        }
    }

    /// Idle -> Active(test_id). Rejected while any session runs, even one with the same id.
    #[instrument(skip(self), fields(operation = "start"))]
    pub async fn start(&mut self, test_id: &str) -> Result<String> {
        self.reap().await;
        if let Some(current) = &self.active {
            warn!(current = current.test_id(), "start rejected; a session is already active");
            return Err(Error::InvalidStateTransition(format!(
                "start {} while {} is active",
                test_id,
                current.test_id()
            )));
        }
        let session = polling::spawn(test_id, self.deps.clone(), self.config.polling);
        self.active = Some(session);
        info!("session active");
        Ok(test_id.to_string())
    }

    /// Active(_) -> Idle. Stops whatever session is active; `test_id` is not matched against it.
    /// Returns the id of the session actually stopped.
    #[instrument(skip(self), fields(operation = "stop"))]
    pub async fn stop(&mut self, test_id: &str) -> Result<(String, SessionExit)> {
        self.reap().await;
        let Some(session) = self.active.take() else {
            warn!("nothing to stop");
            return Err(Error::InvalidStateTransition(format!(
                "stop {} while idle",
                test_id
            )));
        };
        let current = session.test_id().to_string();
        if current != test_id {
            warn!(current = %current, "stop id does not match active session; stopping it anyway");
        }
        let exit = session.stop(self.config.stop_timeout).await;
        info!(current = %current, ?exit, "session idle");
        Ok((current, exit))
    }

    /// Stops the active session, if any. Used on shutdown.
    pub async fn shutdown(&mut self) -> Option<SessionExit> {
        let session = self.active.take()?;
        let exit = session.stop(self.config.stop_timeout).await;
        info!(?exit, "session stopped on shutdown");
        Some(exit)
    }

    /// Drops a session whose loop already returned, logging why it ended.
    async fn reap(&mut self) {
        if self.active.as_ref().is_some_and(|s| s.is_finished())
            && let Some(session) = self.active.take()
        {
            let test_id = session.test_id().to_string();
            let exit = session.join().await;
            warn!(test_id = %test_id, ?exit, "session had ended on its own");
        }
    }
}
