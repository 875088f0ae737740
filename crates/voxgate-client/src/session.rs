//! One authenticated gateway session.
//!
//! A [`Session`] owns a primary connection and runs four background tasks
//! around it: a writer serializing the outbound send path, a read loop
//! consuming inbound frames, the heartbeat loop, and a coarse keepalive.
//! Commands that mutate voice state are fire-and-forget requests whose
//! effect is only observable through unsolicited server events, so the
//! mutating operations poll local state (bounded) until it converges.
//!
//! Transport failure and missed heartbeat acks feed a reconnect supervisor
//! that re-runs the handshake with exponential backoff, re-joining the
//! remembered voice channel on success. Exhausting the attempt budget marks
//! the session permanently disconnected; nothing resurrects it silently.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use voxgate_core::error::{VoxError, VoxResult};
use voxgate_core::gateway::{GatewayEvent, GatewayFrame, OP_DISPATCH, OP_HEARTBEAT_ACK, OP_HELLO};

use crate::backoff;
use crate::heartbeat;
use crate::rest::{RestClient, DEFAULT_API_BASE};
use crate::transport::{Connector, GatewayRx, GatewayTx};
use crate::voice::{VoiceState, VoiceTarget};

const OUTBOUND_CAPACITY: usize = 64;
const RECONNECT_SIGNAL_CAPACITY: usize = 8;

/// Tunables for one session. Defaults match the production gateway; tests
/// shrink the bounds to keep the suite fast.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL for one-shot REST requests.
    pub api_base: String,
    /// Bound on waiting for hello + session id during connect.
    pub handshake_timeout: Duration,
    /// Bound on waiting for server confirmation of a voice join.
    pub voice_join_timeout: Duration,
    /// Bound on waiting for server confirmation of a voice leave.
    pub voice_leave_timeout: Duration,
    /// Granularity of the bounded convergence polls.
    pub poll_slice: Duration,
    /// Period of the coarse keepalive task.
    pub keepalive_period: Duration,
    /// Idle time after which the keepalive re-asserts voice state.
    pub keepalive_reassert: Duration,
    /// Backoff unit; attempt `n` waits `base * 2^n`.
    pub backoff_base: Duration,
    /// Reconnect attempts before the session gives up.
    pub max_reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            handshake_timeout: Duration::from_secs(10),
            voice_join_timeout: Duration::from_secs(5),
            voice_leave_timeout: Duration::from_secs(5),
            poll_slice: Duration::from_millis(100),
            keepalive_period: Duration::from_secs(30),
            keepalive_reassert: Duration::from_secs(60),
            backoff_base: Duration::from_secs(1),
            max_reconnect_attempts: backoff::MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Mutable session state shared by the dispatcher-facing operations and the
/// background tasks. Every flag group is updated under one lock hold so the
/// membership invariant (channel set ⇔ voice connected) never tears.
pub(crate) struct SessionState {
    pub(crate) session_id: Option<String>,
    pub(crate) user_id: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) transport_connected: bool,
    pub(crate) closed: bool,
    /// Set when the reconnect budget ran out; the session is then closed for
    /// that reason rather than by an explicit disconnect.
    pub(crate) exhausted: bool,
    /// Server-confirmed voice membership. Written only by the event consumer.
    pub(crate) voice: VoiceState,
    /// Desired voice membership. Written by commands; drives re-joins.
    pub(crate) target: VoiceTarget,
    pub(crate) ack_received: bool,
    pub(crate) reconnect_attempts: u32,
    pub(crate) last_keepalive: Instant,
    /// Send half of the current connection generation's writer.
    pub(crate) outbound: Option<mpsc::Sender<GatewayFrame>>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            session_id: None,
            user_id: None,
            username: None,
            transport_connected: false,
            closed: false,
            exhausted: false,
            voice: VoiceState::default(),
            target: VoiceTarget::default(),
            ack_received: true,
            reconnect_attempts: 0,
            last_keepalive: Instant::now(),
            outbound: None,
        }
    }
}

/// Voice-state frame from the desired target (used for joins).
pub(crate) fn target_frame(target: &VoiceTarget) -> GatewayFrame {
    GatewayFrame::voice_state_update(
        target.guild_id.as_deref(),
        target.channel_id.as_deref(),
        target.self_mute,
        target.self_deaf,
        target.self_video,
    )
}

/// Voice-state frame re-asserting the confirmed membership with the desired
/// flags (used by the keepalive).
pub(crate) fn reassert_frame(s: &SessionState) -> Option<GatewayFrame> {
    if !s.voice.connected {
        return None;
    }
    let channel = s.voice.channel_id.as_deref()?;
    let guild = s.voice.guild_id.as_deref().or(s.target.guild_id.as_deref());
    Some(GatewayFrame::voice_state_update(
        guild,
        Some(channel),
        s.target.self_mute,
        s.target.self_deaf,
        s.target.self_video,
    ))
}

/// Point-in-time snapshot of one session, for the status renderer.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub slot: usize,
    pub username: Option<String>,
    pub connected: bool,
    pub voice_connected: bool,
    pub channel_id: Option<String>,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub self_video: bool,
    pub streaming: bool,
    /// Time since the last successful liveness action.
    pub staleness: Duration,
}

/// One authenticated gateway session bound to a credential slot.
pub struct Session {
    slot: usize,
    token: String,
    config: SessionConfig,
    rest: RestClient,
    connector: Connector,
    shared: Arc<Mutex<SessionState>>,
    shutdown: watch::Sender<bool>,
    reconnect_tx: mpsc::Sender<()>,
    /// Tasks tied to the current connection generation (writer, read loop,
    /// heartbeat). Replaced wholesale on reconnect.
    generation_tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Session-lifetime tasks (keepalive, reconnect supervisor).
    service_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Open the primary connection, complete the identify handshake, and
    /// start the background tasks.
    ///
    /// Blocks (bounded) until the server assigns a session id. Fails with
    /// `EndpointUnavailable` when the gateway URL cannot be resolved and
    /// `HandshakeTimeout` when no session id arrives in time.
    pub async fn connect(
        slot: usize,
        token: String,
        config: SessionConfig,
        connector: Connector,
    ) -> VoxResult<Arc<Self>> {
        let rest = RestClient::new(&config.api_base, &token);
        let (shutdown, _) = watch::channel(false);
        let (reconnect_tx, reconnect_rx) = mpsc::channel(RECONNECT_SIGNAL_CAPACITY);

        let session = Arc::new(Self {
            slot,
            token,
            config,
            rest,
            connector,
            shared: Arc::new(Mutex::new(SessionState::new())),
            shutdown,
            reconnect_tx,
            generation_tasks: Mutex::new(Vec::new()),
            service_tasks: Mutex::new(Vec::new()),
        });

        if let Err(e) = session.establish().await {
            session.teardown().await;
            return Err(e);
        }

        let keepalive = heartbeat::spawn_keepalive(
            session.shared.clone(),
            session.config.keepalive_period,
            session.config.keepalive_reassert,
            session.shutdown.subscribe(),
        );
        let supervisor = tokio::spawn(reconnect_supervisor(
            Arc::downgrade(&session),
            reconnect_rx,
            session.shutdown.subscribe(),
        ));
        session
            .service_tasks
            .lock()
            .await
            .extend([keepalive, supervisor]);

        Ok(session)
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Whether the transport is up and the handshake completed.
    pub async fn is_connected(&self) -> bool {
        let s = self.shared.lock().await;
        !s.closed && s.transport_connected && s.session_id.is_some()
    }

    /// Whether the session reached its terminal state (explicit disconnect or
    /// reconnect exhaustion). Distinct from a transient transport drop.
    pub async fn is_closed(&self) -> bool {
        self.shared.lock().await.closed
    }

    /// Whether the session died by spending its reconnect budget.
    pub async fn is_exhausted(&self) -> bool {
        self.shared.lock().await.exhausted
    }

    pub async fn status(&self) -> SessionStatus {
        let s = self.shared.lock().await;
        SessionStatus {
            slot: self.slot,
            username: s.username.clone(),
            connected: !s.closed && s.transport_connected && s.session_id.is_some(),
            voice_connected: s.voice.connected,
            channel_id: s.voice.channel_id.clone(),
            self_mute: s.voice.self_mute,
            self_deaf: s.voice.self_deaf,
            self_video: s.voice.self_video,
            streaming: s.voice.streaming || s.voice.stream_key.is_some(),
            staleness: s.last_keepalive.elapsed(),
        }
    }

    /// Request membership in a voice channel, then poll (bounded) until the
    /// server's push event confirms it. The request itself is fire-and-forget;
    /// confirmation only ever arrives as an unsolicited event.
    pub async fn join_voice(&self, guild_id: &str, channel_id: &str) -> VoxResult<()> {
        let (frame, outbound) = {
            let mut s = self.shared.lock().await;
            if s.exhausted {
                return Err(VoxError::ReconnectExhausted);
            }
            if s.closed || s.session_id.is_none() {
                return Err(VoxError::Transport("session is not connected".into()));
            }
            s.target.guild_id = Some(guild_id.to_string());
            s.target.channel_id = Some(channel_id.to_string());
            (target_frame(&s.target), s.outbound.clone())
        };

        let outbound = outbound.ok_or_else(|| VoxError::Transport("no outbound path".into()))?;
        outbound
            .send(frame)
            .await
            .map_err(|_| VoxError::Transport("outbound path closed".into()))?;

        let confirmed = self
            .poll_until(self.config.voice_join_timeout, |s| {
                s.voice.connected && s.voice.channel_id.as_deref() == Some(channel_id)
            })
            .await;

        if confirmed {
            self.shared.lock().await.last_keepalive = Instant::now();
            Ok(())
        } else {
            Err(VoxError::VoiceJoinTimeout)
        }
    }

    /// Leave the current voice channel, stopping any active stream first.
    ///
    /// Policy: leaving always reports success once the poll bound passes,
    /// even when the server never confirms. A dead session must not wedge
    /// the command flow on the way out.
    pub async fn leave_voice(&self) -> VoxResult<()> {
        let (stream_key, guild_id, outbound) = {
            let mut s = self.shared.lock().await;
            if !s.voice.connected && s.target.channel_id.is_none() {
                return Ok(());
            }
            let key = s.voice.stream_key.clone();
            let guild = s.voice.guild_id.clone().or_else(|| s.target.guild_id.clone());
            s.target.clear_channel();
            (key, guild, s.outbound.clone())
        };

        if let Some(key) = stream_key {
            if let Err(e) = self.rest.delete_stream(&key).await {
                tracing::warn!(slot = self.slot, "stream stop before leave failed: {}", e);
            }
            let mut s = self.shared.lock().await;
            s.voice.streaming = false;
            s.voice.stream_key = None;
        }

        if let Some(outbound) = outbound {
            let frame = {
                let s = self.shared.lock().await;
                GatewayFrame::voice_state_update(
                    guild_id.as_deref(),
                    None,
                    s.target.self_mute,
                    s.target.self_deaf,
                    s.target.self_video,
                )
            };
            if outbound.send(frame).await.is_ok() {
                let left = self
                    .poll_until(self.config.voice_leave_timeout, |s| !s.voice.connected)
                    .await;
                if !left {
                    tracing::warn!(slot = self.slot, "voice leave unconfirmed within bound");
                }
            }
        }

        Ok(())
    }

    pub async fn set_mute(&self, muted: bool) -> VoxResult<()> {
        self.update_voice_flags(|t| t.self_mute = muted).await
    }

    pub async fn set_deafen(&self, deafened: bool) -> VoxResult<()> {
        self.update_voice_flags(|t| t.self_deaf = deafened).await
    }

    pub async fn set_video(&self, video: bool) -> VoxResult<()> {
        self.update_voice_flags(|t| t.self_video = video).await
    }

    /// Flip the camera flag; returns the new desired value.
    pub async fn toggle_video(&self) -> VoxResult<bool> {
        let video = {
            let s = self.shared.lock().await;
            if !s.voice.connected {
                return Err(VoxError::NotInVoice);
            }
            !s.target.self_video
        };
        self.set_video(video).await?;
        Ok(video)
    }

    /// Start or stop a media stream. Returns whether a stream is now up.
    ///
    /// The start/stop itself is a one-shot REST request; STREAM_CREATE /
    /// STREAM_DELETE events keep the flags honest afterwards.
    pub async fn toggle_stream(&self) -> VoxResult<bool> {
        let (streaming, key, guild, channel) = {
            let s = self.shared.lock().await;
            if !s.voice.connected {
                return Err(VoxError::NotInVoice);
            }
            (
                s.voice.streaming || s.voice.stream_key.is_some(),
                s.voice.stream_key.clone(),
                s.voice.guild_id.clone().or_else(|| s.target.guild_id.clone()),
                s.voice.channel_id.clone(),
            )
        };

        if streaming {
            let key = key.ok_or_else(|| VoxError::RequestFailed("no active stream key".into()))?;
            self.rest.delete_stream(&key).await?;
            let mut s = self.shared.lock().await;
            s.voice.streaming = false;
            s.voice.stream_key = None;
            Ok(false)
        } else {
            let guild = guild.ok_or(VoxError::NotInVoice)?;
            let channel = channel.ok_or(VoxError::NotInVoice)?;
            let key = self.rest.create_stream(&guild, &channel).await?;
            let mut s = self.shared.lock().await;
            if s.voice.connected {
                s.voice.streaming = true;
                s.voice.stream_key = Some(key);
            }
            Ok(true)
        }
    }

    /// One-shot chat message; independent of voice state.
    pub async fn send_message(&self, channel_id: &str, text: &str) -> VoxResult<()> {
        self.rest.send_message(channel_id, text).await
    }

    /// Close both directions and stop every background task. Idempotent.
    pub async fn disconnect(&self) -> VoxResult<()> {
        let in_voice = {
            let s = self.shared.lock().await;
            if s.closed {
                return Ok(());
            }
            s.voice.connected
        };
        if in_voice {
            let _ = self.leave_voice().await;
        }
        self.teardown().await;
        tracing::info!(slot = self.slot, "session disconnected");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Open a transport, run the handshake, and swap in a fresh connection
    /// generation (writer + read loop + heartbeat).
    async fn establish(&self) -> VoxResult<()> {
        let (mut tx, mut rx) = self.connector.open(&self.rest).await?;

        let hello = match tokio::time::timeout(self.config.handshake_timeout, wait_hello(&mut rx))
            .await
        {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(VoxError::HandshakeTimeout),
        };
        let interval_ms = hello
            .hello_interval_ms()
            .ok_or_else(|| VoxError::Codec("hello without heartbeat_interval".into()))?;
        let interval = Duration::from_millis(interval_ms);

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        {
            let mut s = self.shared.lock().await;
            s.transport_connected = true;
            s.session_id = None;
            s.ack_received = true;
            s.outbound = Some(out_tx.clone());
            s.last_keepalive = Instant::now();
        }

        tx.send(&GatewayFrame::identify(&self.token)).await?;

        let writer = spawn_writer(
            tx,
            out_rx,
            self.reconnect_tx.clone(),
            self.shutdown.subscribe(),
        );
        let reader = spawn_read_loop(
            self.shared.clone(),
            rx,
            self.reconnect_tx.clone(),
            self.shutdown.subscribe(),
        );
        let beat = heartbeat::spawn_heartbeat(
            self.shared.clone(),
            out_tx.clone(),
            interval,
            self.reconnect_tx.clone(),
            self.shutdown.subscribe(),
        );
        {
            let mut tasks = self.generation_tasks.lock().await;
            for stale in tasks.drain(..) {
                stale.abort();
            }
            tasks.extend([writer, reader, beat]);
        }

        let ready = self
            .poll_until(self.config.handshake_timeout, |s| s.session_id.is_some())
            .await;
        if !ready {
            return Err(VoxError::HandshakeTimeout);
        }

        let _ = out_tx.send(GatewayFrame::presence_online()).await;
        tracing::debug!(slot = self.slot, "handshake complete");
        Ok(())
    }

    /// One reconnect attempt. Returns false when the supervisor should stop
    /// (session closed or budget exhausted).
    async fn attempt_reconnect(&self) -> bool {
        let decision = {
            let mut s = self.shared.lock().await;
            if s.closed {
                None
            } else if backoff::exhausted(s.reconnect_attempts, self.config.max_reconnect_attempts) {
                s.exhausted = true;
                Some(None)
            } else {
                s.reconnect_attempts += 1;
                Some(Some(s.reconnect_attempts))
            }
        };
        let attempt = match decision {
            None => return false,
            Some(None) => {
                tracing::warn!(
                    slot = self.slot,
                    "reconnect attempts exhausted, session permanently disconnected"
                );
                self.teardown().await;
                return false;
            }
            Some(Some(attempt)) => attempt,
        };

        let wait = backoff::delay(attempt, self.config.backoff_base);
        tracing::info!(
            slot = self.slot,
            attempt,
            wait_ms = wait.as_millis() as u64,
            "reconnecting"
        );

        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            _ = shutdown.changed() => return false,
            _ = tokio::time::sleep(wait) => {}
        }

        // Discard the stale connection's view of the world; confirmed voice
        // state died with the transport, the desired target survives.
        {
            let mut s = self.shared.lock().await;
            if s.closed {
                return false;
            }
            s.session_id = None;
            s.ack_received = true;
            s.transport_connected = false;
            s.outbound = None;
            s.voice.clear();
        }

        match self.establish().await {
            Ok(()) => {
                let target = {
                    let s = self.shared.lock().await;
                    (s.target.guild_id.clone(), s.target.channel_id.clone())
                };
                if let (Some(guild), Some(channel)) = target {
                    if let Err(e) = self.join_voice(&guild, &channel).await {
                        tracing::warn!(slot = self.slot, "voice rejoin failed: {}", e);
                    }
                }
                true
            }
            Err(e) => {
                tracing::warn!(slot = self.slot, attempt, "reconnect attempt failed: {}", e);
                let _ = self.reconnect_tx.send(()).await;
                true
            }
        }
    }

    /// Stop everything and mark the session closed.
    async fn teardown(&self) {
        {
            let mut s = self.shared.lock().await;
            s.closed = true;
            s.transport_connected = false;
            s.session_id = None;
            s.outbound = None;
        }
        let _ = self.shutdown.send(true);
        for task in self.generation_tasks.lock().await.drain(..) {
            task.abort();
        }
        for task in self.service_tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    /// Poll shared state in `poll_slice` steps until `pred` holds or the
    /// bound expires.
    async fn poll_until<F>(&self, bound: Duration, pred: F) -> bool
    where
        F: Fn(&SessionState) -> bool,
    {
        let deadline = Instant::now() + bound;
        loop {
            {
                let s = self.shared.lock().await;
                if pred(&s) {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_slice).await;
        }
    }

    async fn update_voice_flags<F>(&self, apply: F) -> VoxResult<()>
    where
        F: FnOnce(&mut VoiceTarget),
    {
        let (frame, outbound) = {
            let mut s = self.shared.lock().await;
            if !s.voice.connected {
                return Err(VoxError::NotInVoice);
            }
            apply(&mut s.target);
            let guild = s.voice.guild_id.clone().or_else(|| s.target.guild_id.clone());
            let channel = s.voice.channel_id.clone();
            (
                GatewayFrame::voice_state_update(
                    guild.as_deref(),
                    channel.as_deref(),
                    s.target.self_mute,
                    s.target.self_deaf,
                    s.target.self_video,
                ),
                s.outbound.clone(),
            )
        };

        let outbound = outbound.ok_or_else(|| VoxError::Transport("no outbound path".into()))?;
        outbound
            .send(frame)
            .await
            .map_err(|_| VoxError::Transport("outbound path closed".into()))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Belt over the explicit disconnect path: no task outlives the session.
        let _ = self.shutdown.send(true);
        if let Ok(mut tasks) = self.generation_tasks.try_lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        if let Ok(mut tasks) = self.service_tasks.try_lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

async fn wait_hello(rx: &mut GatewayRx) -> VoxResult<GatewayFrame> {
    loop {
        match rx.recv().await? {
            Some(frame) if frame.op == OP_HELLO => return Ok(frame),
            Some(_) => continue,
            None => return Err(VoxError::Transport("connection closed before hello".into())),
        }
    }
}

/// Single writer over the outbound send path: heartbeat, voice updates, and
/// identify all funnel through here, one frame at a time.
fn spawn_writer(
    mut tx: GatewayTx,
    mut out_rx: mpsc::Receiver<GatewayFrame>,
    reconnect: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = tx.close().await;
                    break;
                }
                frame = out_rx.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = tx.send(&frame).await {
                            tracing::warn!("gateway send failed: {}", e);
                            let _ = reconnect.send(()).await;
                            break;
                        }
                    }
                    None => {
                        let _ = tx.close().await;
                        break;
                    }
                }
            }
        }
        tracing::debug!("writer ended");
    })
}

/// Read loop: consumes inbound frames and updates handshake/voice state.
/// EOF or a transport error while still marked connected requests a
/// reconnect.
fn spawn_read_loop(
    shared: Arc<Mutex<SessionState>>,
    mut rx: GatewayRx,
    reconnect: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = shutdown.changed() => break,
                frame = rx.recv() => frame,
            };
            match frame {
                Ok(Some(frame)) => handle_frame(&shared, frame).await,
                Ok(None) | Err(_) => {
                    let lost = {
                        let mut s = shared.lock().await;
                        let lost = s.transport_connected && !s.closed;
                        s.transport_connected = false;
                        lost
                    };
                    if lost {
                        tracing::warn!("gateway connection lost");
                        let _ = reconnect.send(()).await;
                    }
                    break;
                }
            }
        }
        tracing::debug!("read loop ended");
    })
}

async fn handle_frame(shared: &Arc<Mutex<SessionState>>, frame: GatewayFrame) {
    match frame.op {
        OP_HEARTBEAT_ACK => {
            shared.lock().await.ack_received = true;
        }
        OP_DISPATCH => match frame.event() {
            Ok(Some(event)) => apply_event(shared, event).await,
            Ok(None) => {}
            Err(e) => tracing::warn!("undecodable dispatch event: {}", e),
        },
        OP_HELLO => {} // consumed during establish; a late one carries nothing new
        other => tracing::trace!(op = other, "ignoring gateway frame"),
    }
}

async fn apply_event(shared: &Arc<Mutex<SessionState>>, event: GatewayEvent) {
    let mut s = shared.lock().await;
    match event {
        GatewayEvent::Ready(ready) => {
            s.username = Some(ready.user.display_name());
            s.user_id = Some(ready.user.id);
            s.session_id = Some(ready.session_id);
            s.reconnect_attempts = 0;
            tracing::info!(user = s.username.as_deref().unwrap_or("?"), "session ready");
        }
        GatewayEvent::VoiceStateUpdate(ev) => {
            if s.user_id.as_deref() == Some(ev.user_id.as_str()) {
                s.voice.apply_membership(&ev);
            }
        }
        GatewayEvent::StreamCreate(ev) => {
            if ev.user_id.is_some() && ev.user_id.as_deref() == s.user_id.as_deref() {
                s.voice.apply_stream_create(&ev);
            }
        }
        GatewayEvent::StreamDelete(ev) => s.voice.apply_stream_delete(&ev),
        GatewayEvent::VoiceServerUpdate => {} // media transport concern, not ours
        GatewayEvent::Unknown(name) => tracing::trace!(event = %name, "ignoring event"),
    }
}

/// Session-lifetime supervisor: turns reconnect signals into attempts,
/// coalescing the duplicates one failure can produce (read-loop error plus
/// missed ack).
async fn reconnect_supervisor(
    session: Weak<Session>,
    mut signals: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            signal = signals.recv() => {
                if signal.is_none() {
                    break;
                }
            }
        }
        while signals.try_recv().is_ok() {}

        let Some(session) = session.upgrade() else {
            break;
        };
        if !session.attempt_reconnect().await {
            break;
        }
    }
    tracing::debug!("reconnect supervisor ended");
}
