//! Stack configuration type definitions
//!
//! `StackConfig` is the root aggregate: a single value describing the whole
//! stack. It is passed through the pure compiler and allocators and only
//! persisted at defined commit points by the store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Database engine kind.
///
/// `mongo` is the primary metadata engine; exactly one instance of it must
/// exist in every configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Mongo,
    Postgres,
    Mysql,
    Mariadb,
}

impl EngineKind {
    /// Conventional host port used as the allocator's preferred default.
    pub fn default_port(&self) -> u16 {
        match self {
            EngineKind::Mongo => 27017,
            EngineKind::Postgres => 5432,
            EngineKind::Mysql => 3306,
            EngineKind::Mariadb => 3306,
        }
    }

    /// Port the engine listens on inside its container.
    pub fn container_port(&self) -> u16 {
        match self {
            EngineKind::Mongo => 27017,
            EngineKind::Postgres => 5432,
            EngineKind::Mysql => 3306,
            EngineKind::Mariadb => 3306,
        }
    }

    pub fn default_user(&self) -> &'static str {
        match self {
            EngineKind::Mongo => "root",
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "root",
            EngineKind::Mariadb => "root",
        }
    }

    pub fn image(&self) -> &'static str {
        match self {
            EngineKind::Mongo => "mongo:7.0",
            EngineKind::Postgres => "postgres:16",
            EngineKind::Mysql => "mysql:8.4",
            EngineKind::Mariadb => "mariadb:11",
        }
    }

    /// Data directory the engine persists into; mounted from the instance
    /// volume.
    pub fn data_path(&self) -> &'static str {
        match self {
            EngineKind::Mongo => "/data/db",
            EngineKind::Postgres => "/var/lib/postgresql/data",
            EngineKind::Mysql => "/var/lib/mysql",
            EngineKind::Mariadb => "/var/lib/mysql",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Mongo => "mongo",
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "mysql",
            EngineKind::Mariadb => "mariadb",
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" => Ok(EngineKind::Mongo),
            "postgres" => Ok(EngineKind::Postgres),
            "mysql" => Ok(EngineKind::Mysql),
            "mariadb" => Ok(EngineKind::Mariadb),
            other => Err(format!(
                "unknown engine '{other}' (expected mongo, postgres, mysql or mariadb)"
            )),
        }
    }
}

/// One attached database instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub engine: EngineKind,

    /// Host port the instance is published on. Unique across the
    /// configuration's externally visible port space.
    pub port: u16,

    pub user: String,

    /// Delivered to the runtime only through the secrets artifact.
    pub password: String,
}

/// One independently deployed worker service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSpec {
    /// Registry repository, e.g. an organization name.
    pub repository: String,

    pub image: String,

    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_tag() -> String {
    "latest".to_string()
}

impl ProfileSpec {
    /// Full image reference, `repository/image:tag`.
    pub fn image_ref(&self) -> String {
        if self.image.contains('/') {
            format!("{}:{}", self.image, self.tag)
        } else {
            format!("{}/{}:{}", self.repository, self.image, self.tag)
        }
    }
}

/// SSL strategy and its strategy-dependent payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum SslConfig {
    /// Locally-trusted certificate issued by a local CA tool.
    SelfSigned,

    /// Publicly-issued certificate obtained via automated domain
    /// validation.
    Acme { email: String },

    /// Operator-supplied certificate and key files.
    Manual {
        cert_path: PathBuf,
        key_path: PathBuf,
    },

    /// TLS terminates at an outer proxy; the edge speaks plaintext only.
    External,
}

impl SslConfig {
    pub fn strategy_name(&self) -> &'static str {
        match self {
            SslConfig::SelfSigned => "self-signed",
            SslConfig::Acme { .. } => "acme",
            SslConfig::Manual { .. } => "manual",
            SslConfig::External => "external",
        }
    }

    /// Whether the edge terminates TLS itself under this strategy.
    pub fn edge_terminates_tls(&self) -> bool {
        !matches!(self, SslConfig::External)
    }
}

/// The private network connecting all services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkChoice {
    /// A concrete subnet in CIDR notation, chosen once at setup.
    Subnet(String),

    /// Sentinel: let the container runtime pick; used only when every
    /// allocator candidate is exhausted.
    RuntimeDefault,
}

/// Root configuration aggregate, one instance per installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Namespaces all derived resource names. Immutable once containers
    /// exist without a full teardown.
    pub stack_name: String,

    /// DNS names / IP literals the edge answers to and the certificate
    /// covers. Ordered, non-empty, duplicate-free.
    pub hosts: Vec<String>,

    /// Secure traffic port; under the external strategy an opaque
    /// strategy parameter (the outer terminator's public port).
    pub external_port: u16,

    /// Plaintext traffic or challenge serving.
    pub http_port: u16,

    /// Never rendered into the topology artifact.
    pub admin_password: String,

    pub ssl: SslConfig,

    /// Attached database instances, keyed by unique instance name.
    pub databases: BTreeMap<String, DatabaseSpec>,

    /// Worker services, keyed by unique service name.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileSpec>,

    pub network: NetworkChoice,
}

impl Default for StackConfig {
    fn default() -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(
            "store".to_string(),
            DatabaseSpec {
                engine: EngineKind::Mongo,
                port: EngineKind::Mongo.default_port(),
                user: EngineKind::Mongo.default_user().to_string(),
                password: "mongo_password".to_string(),
            },
        );

        Self {
            stack_name: "berth".to_string(),
            hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            external_port: 443,
            http_port: 8080,
            admin_password: "password".to_string(),
            ssl: SslConfig::SelfSigned,
            databases,
            profiles: BTreeMap::new(),
            network: NetworkChoice::RuntimeDefault,
        }
    }
}

impl StackConfig {
    /// The primary metadata instance, if present.
    ///
    /// Validation guarantees exactly one; the `Option` exists so the
    /// compiler can surface a missing primary as a `CompileError` rather
    /// than panic.
    pub fn primary_database(&self) -> Option<(&String, &DatabaseSpec)> {
        self.databases
            .iter()
            .find(|(_, spec)| spec.engine == EngineKind::Mongo)
    }

    /// All host ports claimed by this configuration.
    pub fn claimed_ports(&self) -> Vec<u16> {
        let mut ports = vec![self.external_port, self.http_port];
        ports.extend(self.databases.values().map(|d| d.port));
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_primary_store() {
        let config = StackConfig::default();
        let (name, spec) = config.primary_database().unwrap();
        assert_eq!(name, "store");
        assert_eq!(spec.engine, EngineKind::Mongo);
        assert_eq!(spec.port, 27017);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = StackConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: StackConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_ssl_strategy_tagged_serde() {
        let json = r#"{"strategy":"acme","email":"ops@example.test"}"#;
        let ssl: SslConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            ssl,
            SslConfig::Acme {
                email: "ops@example.test".to_string()
            }
        );

        let json = r#"{"strategy":"external"}"#;
        let ssl: SslConfig = serde_json::from_str(json).unwrap();
        assert_eq!(ssl, SslConfig::External);

        let json = r#"{"strategy":"manual","cert_path":"/x/a.crt","key_path":"/x/a.key"}"#;
        let ssl: SslConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(ssl, SslConfig::Manual { .. }));
    }

    #[test]
    fn test_network_choice_serde() {
        let choice = NetworkChoice::Subnet("172.18.0.0/16".to_string());
        let json = serde_json::to_string(&choice).unwrap();
        assert_eq!(json, r#"{"subnet":"172.18.0.0/16"}"#);

        let choice = NetworkChoice::RuntimeDefault;
        let json = serde_json::to_string(&choice).unwrap();
        assert_eq!(json, r#""runtime-default""#);
        let back: NetworkChoice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NetworkChoice::RuntimeDefault);
    }

    #[test]
    fn test_engine_kind_from_str() {
        assert_eq!("postgres".parse::<EngineKind>().unwrap(), EngineKind::Postgres);
        assert_eq!("MariaDB".parse::<EngineKind>().unwrap(), EngineKind::Mariadb);
        assert!("oracle".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_profile_image_ref() {
        let profile = ProfileSpec {
            repository: "acme-lab".to_string(),
            image: "worker".to_string(),
            tag: "1.2".to_string(),
        };
        assert_eq!(profile.image_ref(), "acme-lab/worker:1.2");

        // A full path in `image` wins over the repository field.
        let profile = ProfileSpec {
            repository: "ignored".to_string(),
            image: "ghcr.io/acme/worker".to_string(),
            tag: "latest".to_string(),
        };
        assert_eq!(profile.image_ref(), "ghcr.io/acme/worker:latest");
    }

    #[test]
    fn test_claimed_ports() {
        let config = StackConfig::default();
        let ports = config.claimed_ports();
        assert!(ports.contains(&443));
        assert!(ports.contains(&8080));
        assert!(ports.contains(&27017));
    }
}
