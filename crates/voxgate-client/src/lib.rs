//! voxgate-client: session manager for a pool of real-time gateway sessions.
//!
//! Each [`Session`] owns one primary gateway connection, runs the identify
//! handshake, keeps the connection alive with heartbeats, reconciles voice
//! membership from asynchronous server push events, and recovers from
//! transport failure with exponential backoff. The [`SessionRegistry`] maps
//! integer slots to live sessions and dispatches structured commands.
//!
//! # Quick Start
//!
//! ```no_run
//! use voxgate_client::{Connector, Credential, SessionConfig, SessionRegistry};
//! use voxgate_core::Command;
//!
//! # async fn example() -> voxgate_core::VoxResult<()> {
//! let credentials = vec![Credential { slot: 0, token: "token-0".into() }];
//! let registry = SessionRegistry::new(
//!     credentials,
//!     "guild-10".into(),
//!     SessionConfig::default(),
//!     Connector::WebSocket,
//! );
//!
//! let outcome = registry
//!     .dispatch(&Command::Connect { slot: 0, channel_id: "channel-20".into() })
//!     .await;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod heartbeat;
pub mod registry;
pub mod rest;
pub mod session;
pub mod transport;
pub mod voice;

// Re-export primary public types.
pub use registry::{Credential, DispatchOutcome, SessionRegistry};
pub use rest::RestClient;
pub use session::{Session, SessionConfig, SessionStatus};
pub use transport::{Connector, GatewayRx, GatewayTx, LocalEndpoint};
pub use voice::{VoiceState, VoiceTarget};

// Re-export voxgate-core error types for convenience.
pub use voxgate_core::{VoxError, VoxResult};
