//! Structured commands consumed by the session registry's dispatcher.
//!
//! Commands are immutable value objects produced by the CLI parser. The
//! registry re-validates slot bounds and required fields before acting on
//! them, so a malformed value can never reach a session.

use crate::error::{VoxError, VoxResult};

/// A validated, structured request against the session pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect the slot's session and join the given voice channel.
    Connect { slot: usize, channel_id: String },
    /// Disconnect the slot's session entirely.
    Disconnect { slot: usize },
    /// Start or stop a media stream in the current voice channel.
    ToggleStream { slot: usize },
    /// Toggle the camera flag.
    ToggleVideo { slot: usize },
    Mute { slot: usize },
    Unmute { slot: usize },
    Deafen { slot: usize },
    Undeafen { slot: usize },
    /// Send a chat message through the one-shot request gateway.
    SendMessage {
        slot: usize,
        channel_id: String,
        text: String,
    },
    /// Snapshot every occupied slot.
    ListSessions,
}

impl Command {
    /// The slot this command addresses, if any.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Command::Connect { slot, .. }
            | Command::Disconnect { slot }
            | Command::ToggleStream { slot }
            | Command::ToggleVideo { slot }
            | Command::Mute { slot }
            | Command::Unmute { slot }
            | Command::Deafen { slot }
            | Command::Undeafen { slot }
            | Command::SendMessage { slot, .. } => Some(*slot),
            Command::ListSessions => None,
        }
    }

    /// Check required-field presence. The parser upstream validates first;
    /// this is defense in depth before dispatch.
    pub fn validate(&self) -> VoxResult<()> {
        match self {
            Command::Connect { channel_id, .. } if channel_id.is_empty() => Err(
                VoxError::InvalidCommand("connect requires a channel id".into()),
            ),
            Command::SendMessage {
                channel_id, text, ..
            } => {
                if channel_id.is_empty() {
                    return Err(VoxError::InvalidCommand(
                        "message requires a channel id".into(),
                    ));
                }
                if text.is_empty() {
                    return Err(VoxError::InvalidCommand("message text is empty".into()));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
