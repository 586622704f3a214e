//! Configuration invariant checks.
//!
//! `validate` runs before every commit; a failure means the operation is
//! aborted with nothing mutated.

use std::collections::BTreeMap;

use crate::compile::naming;
use crate::config::{EngineKind, SslConfig, StackConfig};
use crate::error::{BerthError, BerthResult};

/// Check every structural invariant of a configuration.
pub fn validate(config: &StackConfig) -> BerthResult<()> {
    if config.stack_name.trim().is_empty() {
        return Err(BerthError::validation("stack name must not be empty"));
    }
    if !config
        .stack_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(BerthError::validation(format!(
            "stack name '{}' may only contain letters, digits and hyphens",
            config.stack_name
        )));
    }

    validate_hosts(config)?;
    validate_ports(config)?;
    validate_names(config)?;
    validate_ssl(config)?;
    validate_network(config)?;

    if config.admin_password.trim().is_empty() {
        return Err(BerthError::validation("admin password must not be empty"));
    }

    Ok(())
}

fn validate_hosts(config: &StackConfig) -> BerthResult<()> {
    if config.hosts.is_empty() {
        return Err(BerthError::validation("hosts must not be empty"));
    }
    let mut seen = BTreeMap::new();
    for host in &config.hosts {
        if host.trim().is_empty() {
            return Err(BerthError::validation("hosts must not contain empty entries"));
        }
        if seen.insert(host.clone(), ()).is_some() {
            return Err(BerthError::validation(format!(
                "host '{host}' is listed more than once"
            )));
        }
    }
    Ok(())
}

fn validate_ports(config: &StackConfig) -> BerthResult<()> {
    let mut claims: BTreeMap<u16, String> = BTreeMap::new();
    let mut claim = |port: u16, owner: String| -> BerthResult<()> {
        if port == 0 {
            return Err(BerthError::validation(format!("{owner} port must not be 0")));
        }
        if let Some(existing) = claims.insert(port, owner.clone()) {
            return Err(BerthError::validation(format!(
                "port {port} is claimed by both {existing} and {owner}"
            )));
        }
        Ok(())
    };

    claim(config.external_port, "external".to_string())?;
    claim(config.http_port, "http".to_string())?;
    for (name, db) in &config.databases {
        claim(db.port, format!("database '{name}'"))?;
    }
    Ok(())
}

fn validate_names(config: &StackConfig) -> BerthResult<()> {
    let primary = config.primary_database().map(|(name, _)| name.clone());

    let mongo_count = config
        .databases
        .values()
        .filter(|d| d.engine == EngineKind::Mongo)
        .count();
    if mongo_count == 0 {
        return Err(BerthError::validation(
            "exactly one mongo instance (the metadata store) is required; none found",
        ));
    }
    if mongo_count > 1 {
        return Err(BerthError::validation(format!(
            "exactly one mongo instance (the metadata store) is required; found {mongo_count}"
        )));
    }

    // Pairwise-distinct after normalization, across databases and profiles.
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    let instances = config
        .databases
        .keys()
        .map(|name| (name, "database"))
        .chain(config.profiles.keys().map(|name| (name, "profile")));

    for (name, kind) in instances {
        if name.trim().is_empty() {
            return Err(BerthError::validation(format!("{kind} names must not be empty")));
        }
        let normalized = naming::normalize(name);
        if let Some(existing) = seen.insert(normalized.clone(), format!("{kind} '{name}'")) {
            return Err(BerthError::validation(format!(
                "{kind} '{name}' collides with {existing} (names are compared case- and separator-insensitively)"
            )));
        }

        // The primary metadata instance owns the `store` role; everything
        // else must keep clear of the fixed role names.
        let is_primary = primary.as_deref() == Some(name.as_str());
        if !is_primary && naming::RESERVED_ROLES.contains(&normalized.as_str()) {
            return Err(BerthError::validation(format!(
                "{kind} name '{name}' is reserved for a built-in service"
            )));
        }
        if naming::RESERVED_ENV_NAMES.contains(&normalized.as_str()) {
            return Err(BerthError::validation(format!(
                "{kind} name '{name}' is reserved (its environment prefix would alias a built-in variable)"
            )));
        }
    }
    Ok(())
}

fn validate_ssl(config: &StackConfig) -> BerthResult<()> {
    match &config.ssl {
        SslConfig::SelfSigned | SslConfig::External => Ok(()),
        SslConfig::Acme { email } => {
            if email.trim().is_empty() || !email.contains('@') {
                return Err(BerthError::validation(
                    "acme strategy requires a contact email address",
                ));
            }
            Ok(())
        }
        SslConfig::Manual {
            cert_path,
            key_path,
        } => {
            if cert_path.as_os_str().is_empty() || key_path.as_os_str().is_empty() {
                return Err(BerthError::validation(
                    "manual strategy requires both a certificate and a key path",
                ));
            }
            Ok(())
        }
    }
}

fn validate_network(config: &StackConfig) -> BerthResult<()> {
    match &config.network {
        crate::config::NetworkChoice::RuntimeDefault => Ok(()),
        crate::config::NetworkChoice::Subnet(cidr) => {
            if crate::alloc::parse_cidr(cidr).is_none() {
                return Err(BerthError::validation(format!(
                    "'{cidr}' is not a valid IPv4 subnet in CIDR notation"
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseSpec, NetworkChoice, ProfileSpec};
    use std::path::PathBuf;

    fn base() -> StackConfig {
        StackConfig::default()
    }

    #[test]
    fn test_default_config_is_valid() {
        validate(&base()).unwrap();
    }

    #[test]
    fn test_empty_hosts_rejected() {
        let mut config = base();
        config.hosts.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_host_rejected() {
        let mut config = base();
        config.hosts.push("localhost".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_port_collision_rejected() {
        let mut config = base();
        config.http_port = config.external_port;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("claimed by both"));
    }

    #[test]
    fn test_case_normalized_name_collision_rejected() {
        let mut config = base();
        config.databases.insert(
            "Warehouse".to_string(),
            DatabaseSpec {
                engine: EngineKind::Postgres,
                port: 5432,
                user: "postgres".to_string(),
                password: "pw".to_string(),
            },
        );
        config.databases.insert(
            "warehouse".to_string(),
            DatabaseSpec {
                engine: EngineKind::Postgres,
                port: 5433,
                user: "postgres".to_string(),
                password: "pw".to_string(),
            },
        );
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn test_separator_normalized_collision_rejected() {
        let mut config = base();
        config.profiles.insert(
            "rock-beta".to_string(),
            ProfileSpec {
                repository: "acme".to_string(),
                image: "worker".to_string(),
                tag: "latest".to_string(),
            },
        );
        config.profiles.insert(
            "rock_beta".to_string(),
            ProfileSpec {
                repository: "acme".to_string(),
                image: "worker".to_string(),
                tag: "latest".to_string(),
            },
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_reserved_name_rejected_for_profile() {
        let mut config = base();
        config.profiles.insert(
            "edge".to_string(),
            ProfileSpec {
                repository: "acme".to_string(),
                image: "worker".to_string(),
                tag: "latest".to_string(),
            },
        );
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_env_aliasing_name_rejected() {
        let mut config = base();
        config.profiles.insert(
            "Admin".to_string(),
            ProfileSpec {
                repository: "acme".to_string(),
                image: "worker".to_string(),
                tag: "latest".to_string(),
            },
        );
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("alias"));
    }

    #[test]
    fn test_primary_store_may_keep_role_name() {
        // The default primary instance is literally named `store`.
        validate(&base()).unwrap();
    }

    #[test]
    fn test_second_mongo_rejected() {
        let mut config = base();
        config.databases.insert(
            "other".to_string(),
            DatabaseSpec {
                engine: EngineKind::Mongo,
                port: 27018,
                user: "root".to_string(),
                password: "pw".to_string(),
            },
        );
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("exactly one mongo"));
    }

    #[test]
    fn test_missing_mongo_rejected() {
        let mut config = base();
        config.databases.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_acme_requires_email() {
        let mut config = base();
        config.ssl = SslConfig::Acme {
            email: String::new(),
        };
        assert!(validate(&config).is_err());

        config.ssl = SslConfig::Acme {
            email: "ops@example.test".to_string(),
        };
        validate(&config).unwrap();
    }

    #[test]
    fn test_manual_requires_paths() {
        let mut config = base();
        config.ssl = SslConfig::Manual {
            cert_path: PathBuf::new(),
            key_path: PathBuf::from("/k.key"),
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_subnet_rejected() {
        let mut config = base();
        config.network = NetworkChoice::Subnet("not-a-subnet".to_string());
        assert!(validate(&config).is_err());

        config.network = NetworkChoice::Subnet("172.18.0.0/16".to_string());
        validate(&config).unwrap();
    }
}
