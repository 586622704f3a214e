//! Naming scheme for derived resources.
//!
//! All service, volume and environment names are derived from the stack
//! name and instance names through the functions here, so the compiler,
//! validator and certificate manager can never disagree about what a
//! resource is called.

use crate::config::StackConfig;

/// Role name of the metadata-store service.
pub const ROLE_STORE: &str = "store";
/// Role name of the application service.
pub const ROLE_APP: &str = "app";
/// Role name of the reverse-proxy edge service.
pub const ROLE_EDGE: &str = "edge";
/// Role name of the ACME client helper service.
pub const ROLE_ACME: &str = "acme";

/// Roles with fixed service names; instance names must not alias them.
pub const RESERVED_ROLES: [&str; 4] = [ROLE_STORE, ROLE_APP, ROLE_EDGE, ROLE_ACME];

/// Names whose environment-variable prefixes would alias the application
/// service's fixed keys (`ADMIN_PASSWORD`, `PUBLIC_*`, `WORKERS`).
pub const RESERVED_ENV_NAMES: [&str; 3] = ["admin", "public", "workers"];

/// Collapse case and separators so `Warehouse-1`, `warehouse_1` and
/// `warehouse.1` all map to the same key.
pub fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Environment-variable prefix for a database instance,
/// e.g. `warehouse-1` -> `WAREHOUSE_1_`.
pub fn env_prefix(instance: &str) -> String {
    let mut prefix: String = instance
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    prefix.push('_');
    prefix
}

/// Service name for a fixed role.
pub fn role_service(config: &StackConfig, role: &str) -> String {
    format!("{}-{}", config.stack_name, role)
}

/// Service name for a database or profile instance.
pub fn instance_service(config: &StackConfig, instance: &str) -> String {
    format!("{}-{}", config.stack_name, instance)
}

/// Persistent volume owned by a database or profile instance.
pub fn instance_volume(config: &StackConfig, instance: &str) -> String {
    format!("{}-{}-data", config.stack_name, instance)
}

/// The private network joining all services.
pub fn network_name(config: &StackConfig) -> String {
    format!("{}-net", config.stack_name)
}
