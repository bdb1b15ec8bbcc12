//! readeval-ise: streaming speech-evaluation engine client.
//!
//! Implements the `SpeechEvaluator` trait against the remote engine's
//! WebSocket API: signed connection URLs, the parameter frame, paced audio
//! frames and the terminal result message. A network-free mock evaluator is
//! included for offline runs.

pub mod client;
pub mod config;
pub mod frame;
pub mod messages;
pub mod mock;
pub mod signer;
pub mod transport;
pub mod waiter;

pub use client::IseClient;
pub use config::{create_client, create_engine, load_config, load_config_from, ReadevalConfig};
pub use mock::MockEvaluator;
pub use signer::{Credentials, Endpoint, Signer};
