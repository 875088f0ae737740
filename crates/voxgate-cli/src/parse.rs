//! REPL line parsing.
//!
//! Grammar (one line per command):
//!
//! ```text
//! vc connect tok <i> -cid <channel>
//! vc disconnect tok <i>
//! vc stream|video|mute|unmute|deafen|undeafen tok <i>
//! vc message tok <i> <text...> -cid <channel>
//! vc list
//! exit | quit
//! ```
//!
//! A malformed line yields an error carrying a usage hint; parsing never
//! panics on any input.

use anyhow::{anyhow, bail, Result};

use voxgate_core::Command;

pub const USAGE: &str = "\
commands:
  vc connect tok <i> -cid <channel>
  vc disconnect tok <i>
  vc stream|video|mute|unmute|deafen|undeafen tok <i>
  vc message tok <i> <text...> -cid <channel>
  vc list
  exit | quit";

/// What one REPL line asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplAction {
    Dispatch(Command),
    Quit,
    Nothing,
}

/// Parse one input line.
pub fn parse_line(line: &str) -> Result<ReplAction> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&first, rest)) = parts.split_first() else {
        return Ok(ReplAction::Nothing);
    };

    if rest.is_empty() && matches!(first, "exit" | "quit") {
        return Ok(ReplAction::Quit);
    }
    if first != "vc" {
        bail!("unknown command {first:?}\n{USAGE}");
    }

    let Some((&sub, args)) = rest.split_first() else {
        bail!("missing subcommand\n{USAGE}");
    };

    let command = match sub {
        "list" => Command::ListSessions,
        "connect" => {
            let slot = parse_slot(args)?;
            let channel_id = flag_value(args, "-cid")?
                .ok_or_else(|| anyhow!("connect requires -cid <channel>\n{USAGE}"))?;
            Command::Connect { slot, channel_id }
        }
        "disconnect" => Command::Disconnect {
            slot: parse_slot(args)?,
        },
        "stream" => Command::ToggleStream {
            slot: parse_slot(args)?,
        },
        "video" => Command::ToggleVideo {
            slot: parse_slot(args)?,
        },
        "mute" => Command::Mute {
            slot: parse_slot(args)?,
        },
        "unmute" => Command::Unmute {
            slot: parse_slot(args)?,
        },
        "deafen" => Command::Deafen {
            slot: parse_slot(args)?,
        },
        "undeafen" => Command::Undeafen {
            slot: parse_slot(args)?,
        },
        "message" => {
            let slot = parse_slot(args)?;
            let cid_at = args
                .iter()
                .position(|&a| a == "-cid")
                .ok_or_else(|| anyhow!("message requires -cid <channel>\n{USAGE}"))?;
            let channel_id = flag_value(args, "-cid")?
                .ok_or_else(|| anyhow!("message requires -cid <channel>\n{USAGE}"))?;
            // Text sits between the slot index and the -cid flag.
            let text = args[2..cid_at].join(" ");
            if text.is_empty() {
                bail!("message text is empty\n{USAGE}");
            }
            Command::SendMessage {
                slot,
                channel_id,
                text,
            }
        }
        other => bail!("unknown subcommand {other:?}\n{USAGE}"),
    };

    Ok(ReplAction::Dispatch(command))
}

/// Expect `tok <i>` at the front of the argument list.
fn parse_slot(args: &[&str]) -> Result<usize> {
    match args {
        ["tok", index, ..] => index
            .parse()
            .map_err(|_| anyhow!("token index {index:?} is not a number\n{USAGE}")),
        _ => bail!("expected tok <i>\n{USAGE}"),
    }
}

/// Value following `flag`, validated as a numeric id.
fn flag_value(args: &[&str], flag: &str) -> Result<Option<String>> {
    let Some(at) = args.iter().position(|&a| a == flag) else {
        return Ok(None);
    };
    let value = args
        .get(at + 1)
        .ok_or_else(|| anyhow!("{flag} requires a value\n{USAGE}"))?;
    if !value.chars().all(|c| c.is_ascii_digit()) || value.is_empty() {
        bail!("{flag} value {value:?} is not a numeric id\n{USAGE}");
    }
    Ok(Some((*value).to_string()))
}
