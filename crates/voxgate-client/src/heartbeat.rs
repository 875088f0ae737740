//! Per-session liveness tasks.
//!
//! Two independently ticking loops share the session state:
//!
//! - the heartbeat loop sends op-1 frames on the interval announced by the
//!   server's hello and treats a missing ack as connection loss;
//! - the coarse keepalive loop re-asserts the last-known voice state while
//!   in voice, guarding against silent server-side desync.
//!
//! Both end on the session's shutdown signal and never outlive `Closed`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use voxgate_core::gateway::GatewayFrame;

use crate::session::{self, SessionState};

/// Spawn the heartbeat loop for one connection generation.
///
/// Each tick: a missed ack requests a reconnect and ends the loop; otherwise
/// the pending-ack flag is cleared and a heartbeat frame is queued. The read
/// loop flips the flag back when op 11 arrives.
pub(crate) fn spawn_heartbeat(
    shared: Arc<Mutex<SessionState>>,
    outbound: mpsc::Sender<GatewayFrame>,
    interval: Duration,
    reconnect: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.tick().await; // consume the immediate tick; first beat is one interval in

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let acked = {
                let mut s = shared.lock().await;
                if s.closed || !s.transport_connected {
                    break;
                }
                let acked = s.ack_received;
                if acked {
                    s.ack_received = false;
                }
                acked
            };

            if !acked {
                tracing::warn!("heartbeat ack missed, requesting reconnect");
                let _ = reconnect.send(()).await;
                break;
            }

            if outbound.send(GatewayFrame::heartbeat()).await.is_err() {
                break;
            }
        }

        tracing::debug!("heartbeat loop ended");
    })
}

/// Spawn the per-session keepalive loop.
///
/// While connected to voice, re-sends the current voice state once
/// `reassert_after` has passed since the last liveness action.
pub(crate) fn spawn_keepalive(
    shared: Arc<Mutex<SessionState>>,
    period: Duration,
    reassert_after: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let pending = {
                let mut s = shared.lock().await;
                if s.closed {
                    break;
                }
                if s.transport_connected
                    && s.voice.connected
                    && s.last_keepalive.elapsed() >= reassert_after
                {
                    s.last_keepalive = Instant::now();
                    session::reassert_frame(&s).map(|frame| (s.outbound.clone(), frame))
                } else {
                    None
                }
            };

            if let Some((Some(outbound), frame)) = pending {
                if outbound.send(frame).await.is_err() {
                    tracing::debug!("keepalive could not reach the writer");
                }
            }
        }

        tracing::debug!("keepalive loop ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxgate_core::gateway::{OP_HEARTBEAT, OP_VOICE_STATE_UPDATE};

    fn connected_state() -> SessionState {
        let mut state = SessionState::new();
        state.transport_connected = true;
        state.session_id = Some("sess".into());
        state
    }

    #[tokio::test]
    async fn beats_then_reconnects_on_missed_ack() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (reconnect_tx, mut reconnect_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Mutex::new(connected_state()));
        let handle = spawn_heartbeat(
            shared,
            out_tx,
            Duration::from_millis(20),
            reconnect_tx,
            shutdown_rx,
        );

        // First tick beats; nothing ever acks, so the second tick misses.
        let beat = out_rx.recv().await.expect("first heartbeat");
        assert_eq!(beat.op, OP_HEARTBEAT);
        tokio::time::timeout(Duration::from_secs(1), reconnect_rx.recv())
            .await
            .expect("reconnect signal")
            .expect("sender alive");

        // Exactly one signal, then the loop is done.
        assert!(reconnect_rx.try_recv().is_err());
        let _ = handle.await;
    }

    #[tokio::test]
    async fn heartbeat_stops_on_shutdown() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (reconnect_tx, _reconnect_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Mutex::new(connected_state()));
        let handle = spawn_heartbeat(
            shared,
            out_tx,
            Duration::from_millis(10),
            reconnect_tx,
            shutdown_rx,
        );

        let _ = out_rx.recv().await;
        shutdown_tx.send(true).expect("receiver alive");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("heartbeat ends on shutdown")
            .expect("task not panicked");
    }

    #[tokio::test]
    async fn keepalive_reasserts_voice_state() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut state = connected_state();
        state.voice.connected = true;
        state.voice.guild_id = Some("10".into());
        state.voice.channel_id = Some("20".into());
        state.outbound = Some(out_tx);
        let shared = Arc::new(Mutex::new(state));

        let _handle = spawn_keepalive(
            shared.clone(),
            Duration::from_millis(10),
            Duration::from_millis(40),
            shutdown_rx,
        );

        let frame = tokio::time::timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .expect("keepalive frame")
            .expect("sender alive");
        assert_eq!(frame.op, OP_VOICE_STATE_UPDATE);

        // The liveness timestamp moved, so nothing re-fires immediately.
        assert!(shared.lock().await.last_keepalive.elapsed() < Duration::from_millis(40));
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn keepalive_idle_outside_voice() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut state = connected_state();
        state.outbound = Some(out_tx);
        let shared = Arc::new(Mutex::new(state));

        let _handle = spawn_keepalive(
            shared,
            Duration::from_millis(10),
            Duration::ZERO,
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(out_rx.try_recv().is_err());
    }
}
