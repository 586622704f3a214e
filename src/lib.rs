//! berth - single-host container stack compiler and deployment tool
//!
//! berth turns one structured configuration (stack identity, hosts, ports,
//! SSL strategy, databases, worker profiles) into a consistent deployment:
//! a compose topology, edge routing rules and a secrets environment, with
//! snapshots of every prior configuration and a multi-strategy certificate
//! state machine in front of the runtime.

pub mod alloc;
pub mod cert;
pub mod cli;
pub mod commands;
pub mod compile;
pub mod config;
pub mod diagnose;
pub mod driver;
pub mod error;
pub mod fsutil;
pub mod paths;

// Re-exports for convenience
pub use compile::{compile, Artifacts};
pub use config::{ConfigStore, EngineKind, NetworkChoice, SslConfig, StackConfig};
pub use error::{BerthError, BerthResult};
pub use paths::StackPaths;
