//! Configuration data model, persistence and transport.

mod store;
mod transfer;
mod types;
mod validate;

pub use store::{ConfigStore, ConfigWarning, SnapshotInfo};
pub use transfer::{export, import};
pub use types::{
    DatabaseSpec, EngineKind, NetworkChoice, ProfileSpec, SslConfig, StackConfig,
};
pub use validate::validate;
