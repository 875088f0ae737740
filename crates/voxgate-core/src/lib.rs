//! voxgate-core: shared protocol library for voxgate.
//!
//! Defines the JSON gateway envelope (`{op, d, t}`), the typed dispatch
//! events the client consumes, the structured `Command` surface, and the
//! error taxonomy shared by the client library and the CLI.

pub mod command;
pub mod error;
pub mod gateway;

// Re-export primary public types.
pub use command::Command;
pub use error::{VoxError, VoxResult};
pub use gateway::{GatewayEvent, GatewayFrame};
