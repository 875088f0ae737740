//! Voice membership state and its reconciliation with server push events.
//!
//! Voice commands are fire-and-forget: the session writes what it *wants*
//! into a [`VoiceTarget`] and sends a voice-state-update, then waits for the
//! server to confirm through unsolicited dispatch events. Only the event
//! consumer writes the confirmed [`VoiceState`]; server state always wins.

use voxgate_core::gateway::{StreamCreateEvent, StreamDeleteEvent, VoiceStateEvent};

/// Server-confirmed voice membership for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceState {
    pub connected: bool,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub self_video: bool,
    pub streaming: bool,
    pub stream_key: Option<String>,
}

/// Desired voice membership, written immediately when a command is issued.
/// Drives what gets re-asserted by the keepalive and re-joined after a
/// reconnect.
#[derive(Debug, Clone, Default)]
pub struct VoiceTarget {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub self_video: bool,
}

impl VoiceTarget {
    pub fn clear_channel(&mut self) {
        self.guild_id = None;
        self.channel_id = None;
    }
}

impl VoiceState {
    /// Apply a membership event for this session's own identity.
    ///
    /// A null channel means the server sees us out of voice; membership,
    /// flags, and any stream all drop together so `streaming` can never
    /// outlive `connected`.
    pub fn apply_membership(&mut self, ev: &VoiceStateEvent) {
        match &ev.channel_id {
            Some(channel) => {
                self.connected = true;
                self.channel_id = Some(channel.clone());
                if ev.guild_id.is_some() {
                    self.guild_id = ev.guild_id.clone();
                }
                self.self_mute = ev.self_mute;
                self.self_deaf = ev.self_deaf;
                self.self_video = ev.self_video;
                if !ev.self_stream && self.stream_key.is_none() {
                    self.streaming = false;
                } else if ev.self_stream {
                    self.streaming = true;
                }
            }
            None => self.clear(),
        }
    }

    /// Apply a stream-created event already matched to this identity.
    pub fn apply_stream_create(&mut self, ev: &StreamCreateEvent) {
        if !self.connected {
            return;
        }
        self.streaming = true;
        self.stream_key = ev.stream_key.clone();
    }

    /// Apply a stream-deleted event; only honored when the key matches ours.
    pub fn apply_stream_delete(&mut self, ev: &StreamDeleteEvent) {
        if self.stream_key.is_some() && self.stream_key == ev.stream_key {
            self.streaming = false;
            self.stream_key = None;
        }
    }

    /// Drop all membership state.
    pub fn clear(&mut self) {
        *self = VoiceState::default();
    }
}
