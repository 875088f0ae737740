//! Colored status line rendering.
//!
//! Turns [`SessionStatus`] snapshots into one styled terminal line each.
//! Layout and wording live in plain-string helpers so tests can assert on
//! content without fighting ANSI escapes.

use crossterm::style::Stylize;

use voxgate_client::SessionStatus;

/// Plain-text flag summary, e.g. `voice=20 muted streaming`.
pub fn flag_summary(status: &SessionStatus) -> String {
    let mut parts = Vec::new();
    match &status.channel_id {
        Some(channel) if status.voice_connected => parts.push(format!("voice={channel}")),
        _ => parts.push("no-voice".to_string()),
    }
    if status.self_mute {
        parts.push("muted".to_string());
    }
    if status.self_deaf {
        parts.push("deafened".to_string());
    }
    if status.self_video {
        parts.push("video".to_string());
    }
    if status.streaming {
        parts.push("streaming".to_string());
    }
    parts.join(" ")
}

/// Seconds since the last liveness action, rendered compactly.
pub fn staleness_label(status: &SessionStatus) -> String {
    format!("{}s", status.staleness.as_secs())
}

/// One colored line for the REPL's `vc list` output.
pub fn status_line(status: &SessionStatus) -> String {
    let identity = status.username.as_deref().unwrap_or("(no identity)");
    let head = format!("[{}] {identity}", status.slot);
    let head = if status.connected {
        head.green()
    } else {
        head.red()
    };
    let flags = flag_summary(status);
    let stale = staleness_label(status).dark_grey();
    format!("{head}  {flags}  {stale}")
}

/// Print every status line, or a placeholder when the pool is empty.
pub fn print_statuses(statuses: &[SessionStatus]) {
    if statuses.is_empty() {
        println!("{}", "no active sessions".dark_grey());
        return;
    }
    for status in statuses {
        println!("{}", status_line(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn status() -> SessionStatus {
        SessionStatus {
            slot: 1,
            username: Some("alice#0001".into()),
            connected: true,
            voice_connected: true,
            channel_id: Some("20".into()),
            self_mute: true,
            self_deaf: false,
            self_video: false,
            streaming: true,
            staleness: Duration::from_secs(42),
        }
    }

    #[test]
    fn flags_reflect_voice_state() {
        assert_eq!(flag_summary(&status()), "voice=20 muted streaming");

        let mut out = status();
        out.voice_connected = false;
        out.channel_id = None;
        out.self_mute = false;
        out.streaming = false;
        assert_eq!(flag_summary(&out), "no-voice");
    }

    #[test]
    fn staleness_in_whole_seconds() {
        assert_eq!(staleness_label(&status()), "42s");
    }

    #[test]
    fn status_line_carries_identity_and_flags() {
        let line = status_line(&status());
        assert!(line.contains("alice#0001"));
        assert!(line.contains("voice=20"));
        assert!(line.contains("42s"));
    }
}
