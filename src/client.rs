//! Queue status polling and monitoring over one shared session

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    command::AmiAction,
    config::AmiConfig,
    connection::{AmiSession, ConnectionState},
    correlate::{channels_from_events, correlate, Queue},
    directory::{load_member_names, MemberDirectory, StaticMemberDirectory},
    error::AmiResult,
    fields::EventName,
    monitor::{build_originate, evaluate_response, MonitorOutcome, SpyMode},
};

/// Long-lived handle owning the manager session.
///
/// Every operation takes the session lock for its whole duration, so a poll
/// and a monitoring request never interleave on the socket. Share it behind
/// an [`Arc`].
pub struct QueueStatusClient {
    session: Mutex<AmiSession>,
    directory: Arc<dyn MemberDirectory>,
}

impl std::fmt::Debug for QueueStatusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStatusClient")
            .finish_non_exhaustive()
    }
}

impl QueueStatusClient {
    /// Client that resolves names from protocol data only.
    pub fn new(config: AmiConfig) -> Self {
        Self::with_directory(config, Arc::new(StaticMemberDirectory::default()))
    }

    /// Client that looks up display names in `directory` on every poll.
    pub fn with_directory(config: AmiConfig, directory: Arc<dyn MemberDirectory>) -> Self {
        Self {
            session: Mutex::new(AmiSession::new(config)),
            directory,
        }
    }

    /// Poll channels and queues and merge them.
    ///
    /// Any transport failure aborts the poll and drops the session; partial
    /// results are never returned.
    pub async fn fetch_queue_status(&self) -> AmiResult<Vec<Queue>> {
        let mut session = self
            .session
            .lock()
            .await;
        session
            .ensure_connected()
            .await?;

        let directory_timeout = session
            .config()
            .directory_timeout;
        let names = load_member_names(self.directory.as_ref(), directory_timeout).await;

        let status_events = session
            .collect_until(&AmiAction::Status, EventName::StatusComplete)
            .await?;
        let channels = channels_from_events(&status_events);

        let queue_events = session
            .collect_until(&AmiAction::QueueStatus, EventName::QueueStatusComplete)
            .await?;

        let queues = correlate(&channels, &queue_events, &names);
        debug!(
            "Polled {} channels into {} queues",
            channels.len(),
            queues.len()
        );
        Ok(queues)
    }

    /// Like [`fetch_queue_status()`](Self::fetch_queue_status), but logs the
    /// error and returns an empty list.
    pub async fn get_queue_status(&self) -> Vec<Queue> {
        match self
            .fetch_queue_status()
            .await
        {
            Ok(queues) => queues,
            Err(e) => {
                warn!("Queue status poll failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Ring `supervisor_extension` and attach it to `target_interface` with ChanSpy.
    ///
    /// Never fails outright; problems come back as an error outcome.
    pub async fn trigger_monitor(
        &self,
        supervisor_extension: &str,
        target_interface: &str,
        mode: SpyMode,
    ) -> MonitorOutcome {
        if supervisor_extension.is_empty() || target_interface.is_empty() {
            return MonitorOutcome::error("supervisor extension and target interface are required");
        }

        let mut session = self
            .session
            .lock()
            .await;
        let action = AmiAction::Originate(build_originate(
            session.config(),
            supervisor_extension,
            target_interface,
        ));
        let limit = session
            .config()
            .originate_timeout;

        info!(
            "Monitor requested: supervisor {} -> {} ({})",
            supervisor_extension, target_interface, mode
        );
        match originate(&mut session, &action, limit).await {
            Ok(raw) => {
                let outcome = evaluate_response(&raw, mode, target_interface);
                if !outcome.is_success() {
                    warn!("Monitor rejected: {}", outcome.message);
                }
                outcome
            }
            Err(e) => {
                warn!("Monitor request failed: {}", e);
                MonitorOutcome::error(e.to_string())
            }
        }
    }

    /// Current session state. Waits for any operation in progress.
    pub async fn connection_state(&self) -> ConnectionState {
        self.session
            .lock()
            .await
            .state()
    }

    /// Log off and drop the session. The next operation reconnects.
    pub async fn disconnect(&self) {
        self.session
            .lock()
            .await
            .logoff()
            .await;
    }
}

async fn originate(
    session: &mut AmiSession,
    action: &AmiAction,
    limit: Duration,
) -> AmiResult<String> {
    session
        .ensure_connected()
        .await?;
    session
        .send_action(action)
        .await?;
    session
        .read_raw_block(limit)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::OutcomeStatus;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        listener
            .local_addr()
            .unwrap()
            .port()
    }

    fn config(port: u16) -> AmiConfig {
        AmiConfig {
            port,
            connect_timeout: Duration::from_millis(500),
            ..AmiConfig::default()
        }
    }

    #[tokio::test]
    async fn unreachable_pbx_degrades_to_empty() {
        let client = QueueStatusClient::new(config(closed_port().await));
        assert!(client
            .get_queue_status()
            .await
            .is_empty());
        assert!(client
            .fetch_queue_status()
            .await
            .is_err());
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn unreachable_pbx_monitor_is_error_outcome() {
        let client = QueueStatusClient::new(config(closed_port().await));
        let outcome = client
            .trigger_monitor("104", "PJSIP/102", SpyMode::Spy)
            .await;
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(!outcome
            .message
            .is_empty());
    }

    #[tokio::test]
    async fn monitor_requires_arguments() {
        let client = QueueStatusClient::new(AmiConfig::default());
        let outcome = client
            .trigger_monitor("", "PJSIP/102", SpyMode::Spy)
            .await;
        assert!(!outcome.is_success());
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_when_idle_is_noop() {
        let client = QueueStatusClient::new(AmiConfig::default());
        client
            .disconnect()
            .await;
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }
}
