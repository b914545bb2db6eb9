use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::{
    session::EngineSession,
    types::{EngineConfig, EngineResult, Role, SessionState},
};

/// Maps logical roles to at most one live engine session each.
///
/// Sessions for different roles never share process state. `acquire` and
/// `release` are serialized with respect to each other; the role map is
/// mutated nowhere else. `release_all` is the pool's safety contract: after
/// it returns, no engine process is left running.
#[derive(Debug, Default)]
pub struct SessionPool {
    sessions: DashMap<Role, EngineSession>,
    /// Serializes acquire/release so a role is never started twice
    ops: Mutex<()>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session bound to `role`, starting one if none exists or the existing
    /// one no longer matches `config`. Reusing a matching `Ready` session is
    /// preferred — it avoids the restart cost.
    pub async fn acquire(&self, role: Role, config: &EngineConfig) -> EngineResult<EngineSession> {
        let _serial = self.ops.lock().await;

        if let Some(entry) = self.sessions.get(&role) {
            let existing = entry.value().clone();
            // Ref must not be held across an await
            drop(entry);

            if existing.config() == config
                && existing.state() == SessionState::Ready
                && existing.is_alive().await
            {
                debug!("reusing session #{} for {role}", existing.id());
                return Ok(existing);
            }

            info!(
                "replacing session #{} for {role} (config changed or session unusable)",
                existing.id()
            );
            existing.stop().await;
            self.sessions.remove(&role);
        }

        let session = EngineSession::start(config.clone()).await?;
        info!("session #{} bound to {role}", session.id());
        self.sessions.insert(role, session.clone());
        Ok(session)
    }

    /// Stop and discard the session for `role`, if any
    pub async fn release(&self, role: Role) {
        let _serial = self.ops.lock().await;
        self.release_locked(role).await;
    }

    /// Stop every session. Cancels in-flight requests first, then tears each
    /// process down. Must be called on game end and application shutdown.
    pub async fn release_all(&self) {
        let _serial = self.ops.lock().await;
        let roles: Vec<Role> = self.sessions.iter().map(|e| *e.key()).collect();
        for role in roles {
            self.release_locked(role).await;
        }
    }

    async fn release_locked(&self, role: Role) {
        if let Some((_, session)) = self.sessions.remove(&role) {
            if session.state() == SessionState::Busy {
                debug!("cancelling in-flight request on {role} before release");
                if let Err(e) = session.cancel().await {
                    warn!("cancel during release of {role} failed: {e}");
                }
            }
            session.stop().await;
            info!("released session for {role}");
        }
    }

    /// Peek at the live session for a role without acquiring it
    pub fn session(&self, role: Role) -> Option<EngineSession> {
        self.sessions.get(&role).map(|e| e.value().clone())
    }

    /// Roles that currently have a live session bound
    pub fn live_roles(&self) -> Vec<Role> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }
}
