//! Slot-indexed session registry and command dispatcher.
//!
//! The registry owns the credential list for the process lifetime and maps
//! each slot to at most one live [`Session`]. Entries appear only through a
//! successful connect and disappear through an explicit disconnect or a
//! terminal reconnect failure. A per-slot lock table serializes concurrent
//! connect/disconnect on the same slot; different slots never contend.
//!
//! [`SessionRegistry::dispatch`] is the command surface: it re-validates the
//! command, resolves the slot, invokes the session operation, and folds the
//! result into a [`DispatchOutcome`]. A failing command never unwinds the
//! registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use voxgate_core::command::Command;
use voxgate_core::error::{VoxError, VoxResult};

use crate::session::{Session, SessionConfig, SessionStatus};
use crate::transport::Connector;

/// One authentication secret bound to a slot index.
#[derive(Debug, Clone)]
pub struct Credential {
    pub slot: usize,
    pub token: String,
}

/// Human-readable result of dispatching one command.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub ok: bool,
    pub message: String,
}

impl DispatchOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Slot-indexed pool of sessions sharing one guild.
pub struct SessionRegistry {
    tokens: HashMap<usize, String>,
    max_slot: usize,
    guild_id: String,
    config: SessionConfig,
    connector: Connector,
    sessions: RwLock<HashMap<usize, Arc<Session>>>,
    /// Per-slot serialization for connect/disconnect. Keyed identically to
    /// `tokens`.
    slot_locks: HashMap<usize, Mutex<()>>,
}

impl SessionRegistry {
    pub fn new(
        credentials: Vec<Credential>,
        guild_id: String,
        config: SessionConfig,
        connector: Connector,
    ) -> Self {
        let tokens: HashMap<usize, String> = credentials
            .into_iter()
            .map(|c| (c.slot, c.token))
            .collect();
        let max_slot = tokens.keys().copied().max().unwrap_or(0);
        let slot_locks = tokens.keys().map(|&slot| (slot, Mutex::new(()))).collect();

        Self {
            tokens,
            max_slot,
            guild_id,
            config,
            connector,
            sessions: RwLock::new(HashMap::new()),
            slot_locks,
        }
    }

    /// Number of loaded credentials.
    pub fn slot_count(&self) -> usize {
        self.tokens.len()
    }

    /// The live session at `slot`, if any.
    pub async fn get(&self, slot: usize) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&slot).cloned()
    }

    /// Connect the slot's session and join the given voice channel.
    ///
    /// On an occupied, still-connected slot this is a channel switch (or a
    /// no-op when already in the target channel); a stale occupant is evicted
    /// first. At most one session ever occupies the slot.
    pub async fn connect(&self, slot: usize, channel_id: &str) -> VoxResult<()> {
        let token = self.token_for(slot)?;
        let guard = self
            .slot_locks
            .get(&slot)
            .ok_or(VoxError::SlotOutOfRange {
                slot,
                max: self.max_slot,
            })?;
        let _guard = guard.lock().await;

        let existing = self.get(slot).await;
        if let Some(session) = existing {
            if session.is_connected().await {
                let status = session.status().await;
                if status.voice_connected && status.channel_id.as_deref() == Some(channel_id) {
                    tracing::debug!(slot, channel_id, "already in target channel");
                    return Ok(());
                }
                return session.join_voice(&self.guild_id, channel_id).await;
            }
            tracing::info!(slot, "evicting stale session");
            let _ = session.disconnect().await;
            self.sessions.write().await.remove(&slot);
        }

        let session =
            Session::connect(slot, token, self.config.clone(), self.connector.clone()).await?;
        // A fresh session only earns its slot once the join confirms; a
        // channel switch above keeps the existing session even when the
        // switch itself fails.
        if let Err(e) = session.join_voice(&self.guild_id, channel_id).await {
            let _ = session.disconnect().await;
            return Err(e);
        }
        self.sessions.write().await.insert(slot, session);
        Ok(())
    }

    /// Disconnect and remove the slot's session. No-op on an empty slot.
    pub async fn disconnect(&self, slot: usize) -> VoxResult<()> {
        if slot > self.max_slot {
            return Err(VoxError::SlotOutOfRange {
                slot,
                max: self.max_slot,
            });
        }
        let guard = match self.slot_locks.get(&slot) {
            Some(guard) => guard,
            None => return Ok(()),
        };
        let _guard = guard.lock().await;

        let session = self.sessions.write().await.remove(&slot);
        if let Some(session) = session {
            session.disconnect().await?;
        }
        Ok(())
    }

    /// Snapshot every occupied slot, pruning sessions that reached their
    /// terminal state.
    pub async fn list(&self) -> Vec<SessionStatus> {
        let snapshot: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut statuses = Vec::with_capacity(snapshot.len());
        let mut dead = Vec::new();
        for session in snapshot {
            if session.is_closed().await {
                dead.push(session.slot());
            } else {
                statuses.push(session.status().await);
            }
        }
        if !dead.is_empty() {
            let mut sessions = self.sessions.write().await;
            for slot in dead {
                sessions.remove(&slot);
            }
        }

        statuses.sort_by_key(|s| s.slot);
        statuses
    }

    /// Disconnect every session. Used on shutdown.
    pub async fn disconnect_all(&self) {
        let slots: Vec<usize> = self.sessions.read().await.keys().copied().collect();
        for slot in slots {
            if let Err(e) = self.disconnect(slot).await {
                tracing::warn!(slot, "disconnect failed: {}", e);
            }
        }
    }

    /// Execute one structured command against the pool.
    pub async fn dispatch(&self, command: &Command) -> DispatchOutcome {
        if let Err(e) = command.validate() {
            return DispatchOutcome::failure(e.to_string());
        }
        if let Some(slot) = command.slot() {
            if !self.tokens.contains_key(&slot) {
                let e = VoxError::SlotOutOfRange {
                    slot,
                    max: self.max_slot,
                };
                return DispatchOutcome::failure(e.to_string());
            }
        }

        match command {
            Command::Connect { slot, channel_id } => match self.connect(*slot, channel_id).await {
                Ok(()) => {
                    DispatchOutcome::success(format!("slot {slot} connected to channel {channel_id}"))
                }
                Err(e) => DispatchOutcome::failure(format!("connect failed: {e}")),
            },
            Command::Disconnect { slot } => match self.disconnect(*slot).await {
                Ok(()) => DispatchOutcome::success(format!("slot {slot} disconnected")),
                Err(e) => DispatchOutcome::failure(format!("disconnect failed: {e}")),
            },
            Command::ToggleStream { slot } => {
                self.with_session(*slot, |session| async move {
                    session.toggle_stream().await.map(|on| {
                        if on {
                            "stream started".to_string()
                        } else {
                            "stream stopped".to_string()
                        }
                    })
                })
                .await
            }
            Command::ToggleVideo { slot } => {
                self.with_session(*slot, |session| async move {
                    session.toggle_video().await.map(|on| {
                        if on {
                            "camera on".to_string()
                        } else {
                            "camera off".to_string()
                        }
                    })
                })
                .await
            }
            Command::Mute { slot } => {
                self.with_session(*slot, |session| async move {
                    session.set_mute(true).await.map(|()| "muted".to_string())
                })
                .await
            }
            Command::Unmute { slot } => {
                self.with_session(*slot, |session| async move {
                    session.set_mute(false).await.map(|()| "unmuted".to_string())
                })
                .await
            }
            Command::Deafen { slot } => {
                self.with_session(*slot, |session| async move {
                    session.set_deafen(true).await.map(|()| "deafened".to_string())
                })
                .await
            }
            Command::Undeafen { slot } => {
                self.with_session(*slot, |session| async move {
                    session
                        .set_deafen(false)
                        .await
                        .map(|()| "undeafened".to_string())
                })
                .await
            }
            Command::SendMessage {
                slot,
                channel_id,
                text,
            } => {
                let channel_id = channel_id.clone();
                let text = text.clone();
                self.with_session(*slot, |session| async move {
                    session
                        .send_message(&channel_id, &text)
                        .await
                        .map(|()| format!("message sent to channel {channel_id}"))
                })
                .await
            }
            Command::ListSessions => {
                let statuses = self.list().await;
                DispatchOutcome::success(format!(
                    "{} of {} slots active",
                    statuses.len(),
                    self.slot_count()
                ))
            }
        }
    }

    fn token_for(&self, slot: usize) -> VoxResult<String> {
        self.tokens
            .get(&slot)
            .cloned()
            .ok_or(VoxError::SlotOutOfRange {
                slot,
                max: self.max_slot,
            })
    }

    async fn with_session<F, Fut>(&self, slot: usize, op: F) -> DispatchOutcome
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: std::future::Future<Output = VoxResult<String>>,
    {
        let Some(session) = self.get(slot).await else {
            return DispatchOutcome::failure(format!("slot {slot} is not connected"));
        };
        if session.is_closed().await {
            // Terminal entries leave the pool here; an exhausted reconnect
            // budget is reported as such rather than as a generic miss.
            self.sessions.write().await.remove(&slot);
            if session.is_exhausted().await {
                return DispatchOutcome::failure(format!(
                    "slot {slot}: {}",
                    VoxError::ReconnectExhausted
                ));
            }
            return DispatchOutcome::failure(format!("slot {slot} is not connected"));
        }
        match op(session).await {
            Ok(message) => DispatchOutcome::success(format!("slot {slot}: {message}")),
            Err(e) => DispatchOutcome::failure(format!("slot {slot}: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{spawn_acceptor, spawn_server, test_config, ServerScript};
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;

    fn credentials(n: usize) -> Vec<Credential> {
        (0..n)
            .map(|slot| Credential {
                slot,
                token: format!("tok-{slot}"),
            })
            .collect()
    }

    fn scripted_registry(n: usize, script: ServerScript) -> Arc<SessionRegistry> {
        let (accept_tx, accept_rx) = mpsc::channel(32);
        spawn_acceptor(accept_rx, script);
        Arc::new(SessionRegistry::new(
            credentials(n),
            "10".into(),
            test_config(),
            Connector::Local(accept_tx),
        ))
    }

    async fn wait_for<F>(registry: &SessionRegistry, slot: usize, what: &str, pred: F)
    where
        F: Fn(&SessionStatus) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let statuses = registry.list().await;
            if statuses
                .iter()
                .any(|s| s.slot == slot && pred(s))
            {
                return;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn concurrent_connects_yield_one_session() {
        let registry = scripted_registry(1, ServerScript::default());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(tokio::spawn(
                async move { registry.connect(0, "20").await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(registry.list().await.len(), 1);
        let session = registry.get(0).await.expect("occupied slot");
        assert!(session.is_connected().await);
    }

    #[tokio::test]
    async fn connect_disconnect_connect_leaves_no_residue() {
        let registry = scripted_registry(1, ServerScript::default());

        registry.connect(0, "20").await.unwrap();
        let outcome = registry.dispatch(&Command::Mute { slot: 0 }).await;
        assert!(outcome.ok, "{}", outcome.message);
        wait_for(&registry, 0, "mute confirmation", |s| s.self_mute).await;

        registry.disconnect(0).await.unwrap();
        assert!(registry.list().await.is_empty());

        registry.connect(0, "20").await.unwrap();
        let statuses = registry.list().await;
        assert_eq!(statuses.len(), 1);
        let status = &statuses[0];
        assert!(status.voice_connected);
        assert_eq!(status.channel_id.as_deref(), Some("20"));
        assert!(!status.self_mute && !status.self_deaf && !status.streaming);
    }

    #[tokio::test]
    async fn same_channel_connect_is_noop_and_switch_reuses_session() {
        let registry = scripted_registry(1, ServerScript::default());

        registry.connect(0, "20").await.unwrap();
        let first = registry.get(0).await.unwrap();

        registry.connect(0, "20").await.unwrap();
        assert!(Arc::ptr_eq(&first, &registry.get(0).await.unwrap()));

        registry.connect(0, "30").await.unwrap();
        let session = registry.get(0).await.unwrap();
        assert!(Arc::ptr_eq(&first, &session), "switch reuses the session");
        assert_eq!(session.status().await.channel_id.as_deref(), Some("30"));
    }

    #[tokio::test]
    async fn disconnect_on_empty_slot_is_noop() {
        let registry = scripted_registry(2, ServerScript::default());
        registry.disconnect(1).await.unwrap();
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_slot_leaves_registry_unchanged() {
        let registry = scripted_registry(3, ServerScript::default());

        let outcome = registry
            .dispatch(&Command::Connect {
                slot: 99,
                channel_id: "20".into(),
            })
            .await;
        assert!(!outcome.ok);
        assert!(outcome.message.contains("99"));
        assert!(registry.list().await.is_empty());

        assert!(matches!(
            registry.connect(99, "20").await,
            Err(VoxError::SlotOutOfRange { slot: 99, max: 2 })
        ));
    }

    #[tokio::test]
    async fn dispatch_end_to_end_voice_scenario() {
        let registry = scripted_registry(1, ServerScript::default());

        let outcome = registry
            .dispatch(&Command::Connect {
                slot: 0,
                channel_id: "20".into(),
            })
            .await;
        assert!(outcome.ok, "{}", outcome.message);

        let statuses = registry.list().await;
        assert!(statuses[0].voice_connected);
        assert_eq!(statuses[0].channel_id.as_deref(), Some("20"));

        let outcome = registry.dispatch(&Command::Mute { slot: 0 }).await;
        assert!(outcome.ok, "{}", outcome.message);
        wait_for(&registry, 0, "mute confirmation", |s| s.self_mute).await;

        let outcome = registry.dispatch(&Command::ListSessions).await;
        assert!(outcome.ok);
        assert_eq!(outcome.message, "1 of 1 slots active");
    }

    #[tokio::test]
    async fn exhausted_session_surfaces_reconnect_exhausted() {
        let (accept_tx, mut accept_rx) = mpsc::channel(8);
        let registry = Arc::new(SessionRegistry::new(
            credentials(1),
            "10".into(),
            test_config(),
            Connector::Local(accept_tx),
        ));

        let connect = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.connect(0, "20").await })
        };
        let ep = accept_rx.recv().await.expect("first connection");
        let server = spawn_server(ep, ServerScript::default());
        connect.await.unwrap().unwrap();

        // Kill the transport, then refuse every reconnect until the budget
        // is spent.
        server.abort();
        while let Ok(Some(ep)) =
            tokio::time::timeout(Duration::from_secs(2), accept_rx.recv()).await
        {
            drop(ep);
        }

        let outcome = registry.dispatch(&Command::Mute { slot: 0 }).await;
        assert!(!outcome.ok);
        assert!(outcome.message.contains("reconnect attempts exhausted"));

        // The terminal entry left the pool when it was reported.
        assert!(registry.get(0).await.is_none());
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn mutators_on_unconnected_slot_fail_cleanly() {
        let registry = scripted_registry(1, ServerScript::default());

        for command in [
            Command::Mute { slot: 0 },
            Command::Deafen { slot: 0 },
            Command::ToggleVideo { slot: 0 },
            Command::ToggleStream { slot: 0 },
        ] {
            let outcome = registry.dispatch(&command).await;
            assert!(!outcome.ok);
            assert!(outcome.message.contains("not connected"));
        }
    }

    #[tokio::test]
    async fn invalid_command_fields_rejected_before_any_session_work() {
        let registry = scripted_registry(1, ServerScript::default());

        let outcome = registry
            .dispatch(&Command::Connect {
                slot: 0,
                channel_id: String::new(),
            })
            .await;
        assert!(!outcome.ok);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn join_timeout_rolls_back_the_fresh_session() {
        let registry = scripted_registry(
            1,
            ServerScript {
                echo_voice_joins: false,
                ..ServerScript::default()
            },
        );

        assert!(matches!(
            registry.connect(0, "20").await,
            Err(VoxError::VoiceJoinTimeout)
        ));

        // The unconfirmed session is torn down, never registered.
        assert!(registry.list().await.is_empty());
        assert!(registry.get(0).await.is_none());
    }

    #[tokio::test]
    async fn failed_switch_keeps_the_existing_session() {
        // The server confirms the first join only, so the channel switch
        // times out while the session itself stays healthy.
        let registry = scripted_registry(
            1,
            ServerScript {
                max_join_echoes: Some(1),
                ..ServerScript::default()
            },
        );

        registry.connect(0, "20").await.unwrap();
        let first = registry.get(0).await.unwrap();

        assert!(matches!(
            registry.connect(0, "30").await,
            Err(VoxError::VoiceJoinTimeout)
        ));

        let session = registry.get(0).await.expect("slot still occupied");
        assert!(Arc::ptr_eq(&first, &session));
        assert!(session.is_connected().await);
        assert_eq!(session.status().await.channel_id.as_deref(), Some("20"));
    }
}
