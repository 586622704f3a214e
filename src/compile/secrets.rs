//! Secrets artifact.
//!
//! Key/value pairs consumed as process environment by the runtime. The
//! topology artifact only ever carries `${KEY}` references; the values
//! live here and nowhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compile::naming;
use crate::config::StackConfig;

/// Environment key holding the administrator password.
pub const ADMIN_PASSWORD_KEY: &str = "ADMIN_PASSWORD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    pub values: BTreeMap<String, String>,
}

impl Secrets {
    /// Placeholder reference for a key, as embedded in the topology.
    pub fn reference(key: &str) -> String {
        format!("${{{key}}}")
    }

    /// Environment key holding a database instance's password.
    pub fn password_key(instance: &str) -> String {
        format!("{}PASSWORD", naming::env_prefix(instance))
    }

    /// Render the `.env` artifact.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.values {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}

pub fn collect(config: &StackConfig) -> Secrets {
    let mut values = BTreeMap::new();
    values.insert(
        ADMIN_PASSWORD_KEY.to_string(),
        config.admin_password.clone(),
    );
    for (name, db) in &config.databases {
        values.insert(Secrets::password_key(name), db.password.clone());
    }
    Secrets { values }
}
