//! The configuration-to-infrastructure compiler.
//!
//! `compile` is a pure, total mapping from a `StackConfig` to the three
//! generated artifacts: compose topology, edge routing rules, and the
//! secrets environment. It never touches the runtime, and the same
//! configuration always yields byte-identical artifacts.

pub mod naming;
pub mod routing;
pub mod secrets;
pub mod topology;

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{DatabaseSpec, EngineKind, NetworkChoice, SslConfig, StackConfig};
use crate::error::{BerthError, BerthResult};

pub use routing::RoutingRules;
pub use secrets::Secrets;
pub use topology::{Ipam, IpamPool, NamedVolume, Network, Service, Topology};

/// Application service image.
pub const APP_IMAGE: &str = "berthstack/app:latest";
/// Reverse-proxy edge image, consumed as a black box via its config file.
pub const EDGE_IMAGE: &str = "nginx:1.27-alpine";
/// ACME client image, run on demand during certificate bootstrap.
pub const ACME_IMAGE: &str = "certbot/certbot:latest";

/// Everything `compile` produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub topology: Topology,
    pub routing: RoutingRules,
    pub secrets: Secrets,
}

impl Artifacts {
    /// Render the topology artifact.
    pub fn compose_yaml(&self) -> BerthResult<String> {
        Ok(self.topology.to_yaml()?)
    }
}

/// Compile a configuration into deployable artifacts.
///
/// Fails with `CompileError` only on a referential-integrity defect; a
/// configuration that passed validation never produces one.
pub fn compile(config: &StackConfig) -> BerthResult<Artifacts> {
    let secrets = secrets::collect(config);
    let routing = routing::render(config);

    let network = naming::network_name(config);
    let mut services = BTreeMap::new();
    let mut volumes = BTreeMap::new();

    let (primary_name, primary_spec) = config
        .primary_database()
        .ok_or_else(|| BerthError::compile("no primary metadata instance in configuration"))?;

    // Metadata store: the primary database instance under its role name.
    let store_service = naming::role_service(config, naming::ROLE_STORE);
    services.insert(
        store_service.clone(),
        database_service(config, primary_name, primary_spec, &store_service, &network),
    );
    volumes.insert(
        naming::instance_volume(config, primary_name),
        NamedVolume::default(),
    );

    // One service per additional database instance.
    for (name, spec) in &config.databases {
        if name == primary_name {
            continue;
        }
        let service_name = naming::instance_service(config, name);
        services.insert(
            service_name.clone(),
            database_service(config, name, spec, &service_name, &network),
        );
        volumes.insert(
            naming::instance_volume(config, name),
            NamedVolume::default(),
        );
    }

    // One service per worker profile.
    for (name, profile) in &config.profiles {
        let service_name = naming::instance_service(config, name);
        let mut svc = Service::new(profile.image_ref(), service_name.clone());
        svc.environment.insert(
            "APP_URL".to_string(),
            format!(
                "http://{}:{}",
                naming::role_service(config, naming::ROLE_APP),
                routing::APP_HTTP_PORT
            ),
        );
        svc.environment
            .insert("CLUSTER".to_string(), name.clone());
        svc.environment
            .insert("WORKER_ID".to_string(), service_name.clone());
        svc.environment.insert(
            secrets::ADMIN_PASSWORD_KEY.to_string(),
            Secrets::reference(secrets::ADMIN_PASSWORD_KEY),
        );
        svc.volumes
            .push(format!("{}:/srv", naming::instance_volume(config, name)));
        svc.depends_on
            .push(naming::role_service(config, naming::ROLE_APP));
        svc.networks.push(network.clone());
        services.insert(service_name, svc);
        volumes.insert(
            naming::instance_volume(config, name),
            NamedVolume::default(),
        );
    }

    services.insert(
        naming::role_service(config, naming::ROLE_APP),
        app_service(config, &store_service, primary_name, &network),
    );
    services.insert(
        naming::role_service(config, naming::ROLE_EDGE),
        edge_service(config, &network),
    );

    if matches!(config.ssl, SslConfig::Acme { .. }) {
        services.insert(
            naming::role_service(config, naming::ROLE_ACME),
            acme_service(config, &network),
        );
    }

    let mut networks = BTreeMap::new();
    networks.insert(
        network,
        Network {
            driver: "bridge".to_string(),
            ipam: match &config.network {
                NetworkChoice::Subnet(subnet) => Some(Ipam {
                    config: vec![IpamPool {
                        subnet: subnet.clone(),
                    }],
                }),
                NetworkChoice::RuntimeDefault => None,
            },
        },
    );

    let topology = Topology {
        services,
        volumes,
        networks,
    };

    check_integrity(config, &topology)?;

    Ok(Artifacts {
        topology,
        routing,
        secrets,
    })
}

fn database_service(
    config: &StackConfig,
    instance: &str,
    spec: &DatabaseSpec,
    service_name: &str,
    network: &str,
) -> Service {
    let mut svc = Service::new(spec.engine.image(), service_name.to_string());
    let password_ref = Secrets::reference(&Secrets::password_key(instance));

    match spec.engine {
        EngineKind::Mongo => {
            svc.environment
                .insert("MONGO_INITDB_ROOT_USERNAME".to_string(), spec.user.clone());
            svc.environment
                .insert("MONGO_INITDB_ROOT_PASSWORD".to_string(), password_ref);
            svc.environment
                .insert("MONGO_INITDB_DATABASE".to_string(), instance.to_string());
        }
        EngineKind::Postgres => {
            svc.environment
                .insert("POSTGRES_USER".to_string(), spec.user.clone());
            svc.environment
                .insert("POSTGRES_PASSWORD".to_string(), password_ref);
            svc.environment
                .insert("POSTGRES_DB".to_string(), instance.to_string());
        }
        EngineKind::Mysql => {
            svc.environment
                .insert("MYSQL_ROOT_PASSWORD".to_string(), password_ref.clone());
            if spec.user != "root" {
                svc.environment
                    .insert("MYSQL_USER".to_string(), spec.user.clone());
                svc.environment
                    .insert("MYSQL_PASSWORD".to_string(), password_ref);
            }
            svc.environment
                .insert("MYSQL_DATABASE".to_string(), instance.to_string());
        }
        EngineKind::Mariadb => {
            svc.environment
                .insert("MARIADB_ROOT_PASSWORD".to_string(), password_ref.clone());
            if spec.user != "root" {
                svc.environment
                    .insert("MARIADB_USER".to_string(), spec.user.clone());
                svc.environment
                    .insert("MARIADB_PASSWORD".to_string(), password_ref);
            }
            svc.environment
                .insert("MARIADB_DATABASE".to_string(), instance.to_string());
        }
    }

    svc.ports
        .push(format!("{}:{}", spec.port, spec.engine.container_port()));
    svc.volumes.push(format!(
        "{}:{}",
        naming::instance_volume(config, instance),
        spec.engine.data_path()
    ));
    svc.networks.push(network.to_string());
    svc
}

fn app_service(
    config: &StackConfig,
    store_service: &str,
    primary_name: &str,
    network: &str,
) -> Service {
    let mut svc = Service::new(
        APP_IMAGE,
        naming::role_service(config, naming::ROLE_APP),
    );

    svc.environment.insert(
        secrets::ADMIN_PASSWORD_KEY.to_string(),
        Secrets::reference(secrets::ADMIN_PASSWORD_KEY),
    );

    // One variable group per database instance, prefixed by the
    // normalized instance name.
    for (name, spec) in &config.databases {
        let prefix = naming::env_prefix(name);
        let host = if name == primary_name {
            store_service.to_string()
        } else {
            naming::instance_service(config, name)
        };
        svc.environment.insert(format!("{prefix}HOST"), host.clone());
        svc.environment.insert(
            format!("{prefix}PORT"),
            spec.engine.container_port().to_string(),
        );
        svc.environment
            .insert(format!("{prefix}NAME"), name.clone());
        svc.environment
            .insert(format!("{prefix}USER"), spec.user.clone());
        svc.environment.insert(
            format!("{prefix}PASSWORD"),
            Secrets::reference(&Secrets::password_key(name)),
        );
        svc.depends_on.push(host);
    }

    if !config.profiles.is_empty() {
        let workers: Vec<String> = config
            .profiles
            .keys()
            .map(|name| {
                format!(
                    "http://{}:{}",
                    naming::instance_service(config, name),
                    routing::APP_HTTP_PORT
                )
            })
            .collect();
        svc.environment
            .insert("WORKERS".to_string(), workers.join(","));
    }

    svc.environment.insert(
        "PUBLIC_HOST".to_string(),
        config.hosts.first().cloned().unwrap_or_default(),
    );
    svc.environment
        .insert("PUBLIC_PORT".to_string(), config.external_port.to_string());
    svc.environment
        .insert("PUBLIC_SCHEME".to_string(), "https".to_string());

    svc.networks.push(network.to_string());
    svc
}

fn edge_service(config: &StackConfig, network: &str) -> Service {
    let mut svc = Service::new(
        EDGE_IMAGE,
        naming::role_service(config, naming::ROLE_EDGE),
    );

    svc.volumes
        .push("./data/edge/conf:/etc/nginx/conf.d:ro".to_string());

    if config.ssl.edge_terminates_tls() {
        svc.ports.push(format!(
            "{}:{}",
            config.external_port,
            routing::EDGE_TLS_PORT
        ));
        svc.volumes
            .push("./data/edge/certs:/etc/nginx/certs:ro".to_string());
    } else {
        // Pass-through: plaintext only, certificate material is never
        // mounted.
        svc.ports
            .push(format!("{}:{}", config.http_port, routing::EDGE_HTTP_PORT));
    }

    if matches!(config.ssl, SslConfig::Acme { .. }) {
        svc.volumes
            .push(format!("./data/edge/webroot:{}:ro", routing::CHALLENGE_ROOT));
    }

    svc.depends_on
        .push(naming::role_service(config, naming::ROLE_APP));
    svc.networks.push(network.to_string());
    svc
}

fn acme_service(config: &StackConfig, network: &str) -> Service {
    let mut svc = Service::new(
        ACME_IMAGE,
        naming::role_service(config, naming::ROLE_ACME),
    );
    svc.restart = Some("no".to_string());
    svc.volumes
        .push("./data/acme:/etc/letsencrypt".to_string());
    svc.volumes
        .push(format!("./data/edge/webroot:{}", routing::CHALLENGE_ROOT));
    svc.networks.push(network.to_string());
    // Not part of a plain `up`; the certificate manager runs it on demand.
    svc.profiles.push("bootstrap".to_string());
    svc
}

/// Referential-integrity pass over a compiled topology.
///
/// A failure here is a compiler defect, never an operator error: every
/// reference a service carries must resolve inside the artifact, and every
/// published port must be one the configuration claims.
fn check_integrity(config: &StackConfig, topology: &Topology) -> BerthResult<()> {
    let claimed: BTreeSet<u16> = config.claimed_ports().into_iter().collect();
    let mut published: BTreeSet<u16> = BTreeSet::new();

    for (name, svc) in &topology.services {
        for dep in &svc.depends_on {
            if !topology.services.contains_key(dep) {
                return Err(BerthError::compile(format!(
                    "service '{name}' depends on unknown service '{dep}'"
                )));
            }
        }
        for net in &svc.networks {
            if !topology.networks.contains_key(net) {
                return Err(BerthError::compile(format!(
                    "service '{name}' joins unknown network '{net}'"
                )));
            }
        }
        for volume in &svc.volumes {
            let source = volume.split(':').next().unwrap_or_default();
            let is_bind = source.starts_with('/') || source.starts_with('.');
            if !is_bind && !topology.volumes.contains_key(source) {
                return Err(BerthError::compile(format!(
                    "service '{name}' mounts undeclared volume '{source}'"
                )));
            }
        }
        for port in &svc.ports {
            let host_port: u16 = port
                .split(':')
                .next()
                .unwrap_or_default()
                .parse()
                .map_err(|_| {
                    BerthError::compile(format!(
                        "service '{name}' publishes malformed port mapping '{port}'"
                    ))
                })?;
            if !claimed.contains(&host_port) {
                return Err(BerthError::compile(format!(
                    "service '{name}' publishes port {host_port} the configuration does not claim"
                )));
            }
            if !published.insert(host_port) {
                return Err(BerthError::compile(format!(
                    "port {host_port} is published by more than one service"
                )));
            }
        }
        for (key, value) in &svc.environment {
            // PUBLIC_HOST names an external hostname, not a service.
            if key == "PUBLIC_HOST" {
                continue;
            }
            if key.ends_with("_HOST")
                && value.starts_with(&format!("{}-", config.stack_name))
                && !topology.services.contains_key(value)
            {
                return Err(BerthError::compile(format!(
                    "service '{name}' references unknown service '{value}' in {key}"
                )));
            }
        }
    }

    Ok(())
}
