//! Credential loading from a token file.
//!
//! One token per line; blank lines are skipped. The slot index is the
//! position among the non-blank lines, so a token keeps its slot as long
//! as the file order is stable.

use anyhow::{bail, Context, Result};
use std::path::Path;

use voxgate_client::Credential;

/// Load credentials from `path`, assigning slot indices by line order.
pub fn load_credentials(path: &str) -> Result<Vec<Credential>> {
    let content = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("failed to read token file at {path}"))?;

    let credentials: Vec<Credential> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(slot, token)| Credential {
            slot,
            token: token.to_string(),
        })
        .collect();

    if credentials.is_empty() {
        bail!("no tokens found in {path}");
    }
    Ok(credentials)
}
