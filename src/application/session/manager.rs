//! Session manager - owns the live sessions, keyed by charge point id

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::ChargePointSession;
use crate::application::handlers::{OcppHandlerV16, ProtocolSettings};
use crate::application::plugins::PluginPipeline;
use crate::domain::RepositoryProvider;
use crate::support::errors::RegisterError;

pub const DUPLICATE_CONNECTION_REASON: &str = "Charge point already connected";
pub const SHUTDOWN_REASON: &str = "Server shutting down";

/// Manages charge point sessions
pub struct SessionManager {
    sessions: DashMap<String, Arc<ChargePointSession>>,
    repos: Arc<dyn RepositoryProvider>,
    plugins: Arc<PluginPipeline>,
    settings: Arc<ProtocolSettings>,
}

impl SessionManager {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        plugins: Arc<PluginPipeline>,
        settings: Arc<ProtocolSettings>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            repos,
            plugins,
            settings,
        }
    }

    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    /// Claim `charge_point_id` for a new connection.
    ///
    /// Fails while another session for the same id is Connecting or Active;
    /// a session that is already tearing down is replaced.
    pub fn open_session(
        &self,
        charge_point_id: &str,
        remote_addr: Option<SocketAddr>,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<Arc<ChargePointSession>, RegisterError> {
        let session = Arc::new(ChargePointSession::new(
            charge_point_id,
            remote_addr,
            sender,
            self.settings.call_timeout,
        ));

        match self.sessions.entry(charge_point_id.to_string()) {
            Entry::Occupied(mut current) => {
                if current.get().is_live() {
                    warn!(
                        charge_point_id,
                        remote_addr = ?remote_addr,
                        existing = %current.get().connection_id(),
                        "Rejecting duplicate connection"
                    );
                    return Err(RegisterError::AlreadyConnected(charge_point_id.to_string()));
                }
                current.insert(session.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
            }
        }
        Ok(session)
    }

    /// Connecting → Active: persist connectivity and run plugin `initialize`.
    pub async fn activate(&self, session: &Arc<ChargePointSession>) {
        let charge_point_id = session.charge_point_id();
        if let Err(e) = self
            .repos
            .charge_points()
            .set_connected(charge_point_id, true, session.connected_at())
            .await
        {
            error!(charge_point_id, error = %e, "Failed to mark charge point connected");
        }

        if !session.activate() {
            warn!(charge_point_id, state = ?session.state(), "Session closed before activation");
            return;
        }
        self.plugins.initialize(session).await;

        info!(
            charge_point_id,
            remote_addr = ?session.remote_addr(),
            connection_id = %session.connection_id(),
            "Charge point connected"
        );
    }

    /// The inbound dispatcher for `session`.
    pub fn handler_for(&self, session: &Arc<ChargePointSession>) -> OcppHandlerV16 {
        OcppHandlerV16::new(
            session.clone(),
            self.repos.clone(),
            self.plugins.clone(),
            self.settings.clone(),
        )
    }

    /// Tear a session down. Safe to call more than once; only the first
    /// call runs plugin `cleanup` and marks the charge point disconnected.
    pub async fn disconnect(&self, session: &Arc<ChargePointSession>, reason: &str) {
        session.close(reason);
        if !session.begin_teardown() {
            return;
        }

        let charge_point_id = session.charge_point_id();
        if session.was_activated() {
            self.plugins.cleanup(session).await;
        }

        // A newer connection may already own the id.
        let current = self
            .sessions
            .get(charge_point_id)
            .map(|entry| entry.connection_id() == session.connection_id())
            .unwrap_or(false);
        if current {
            if let Err(e) = self
                .repos
                .charge_points()
                .set_connected(charge_point_id, false, Utc::now())
                .await
            {
                error!(charge_point_id, error = %e, "Failed to mark charge point disconnected");
            }
        }

        session.mark_closed();
        self.sessions
            .remove_if(charge_point_id, |_, s| s.connection_id() == session.connection_id());

        info!(
            charge_point_id,
            reason = session.close_reason().unwrap_or(reason),
            connection_id = %session.connection_id(),
            "Charge point disconnected"
        );
    }

    pub fn get(&self, charge_point_id: &str) -> Option<Arc<ChargePointSession>> {
        self.sessions.get(charge_point_id).map(|e| e.value().clone())
    }

    pub fn is_connected(&self, charge_point_id: &str) -> bool {
        self.sessions
            .get(charge_point_id)
            .map(|e| e.is_active())
            .unwrap_or(false)
    }

    pub fn connected_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Disconnect every session; returns how many there were.
    pub async fn close_all(&self, reason: &str) -> usize {
        let sessions: Vec<_> = self.sessions.iter().map(|e| e.value().clone()).collect();
        for session in &sessions {
            self.disconnect(session, reason).await;
        }
        sessions.len()
    }
}

/// Thread-safe session manager
pub type SharedSessionManager = Arc<SessionManager>;
