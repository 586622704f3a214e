//! Property tests for the topology compiler.

use proptest::prelude::*;
use std::collections::BTreeSet;

use berth::compile::compile;
use berth::config::{validate, DatabaseSpec, EngineKind, ProfileSpec, StackConfig};

fn name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9-]{0,11}").unwrap()
}

/// A configuration that satisfies every structural invariant: unique
/// normalized names, unique ports, one primary metadata instance.
fn valid_config_strategy() -> impl Strategy<Value = StackConfig> {
    (
        proptest::string::string_regex("[a-z][a-z0-9-]{0,8}").unwrap(),
        proptest::collection::vec(name_strategy(), 1..3),
        proptest::collection::vec((name_strategy(), 0usize..3), 0..4),
        proptest::collection::vec(name_strategy(), 0..4),
    )
        .prop_map(|(stack_name, hosts, databases, profiles)| {
            let mut config = StackConfig::default();
            config.stack_name = stack_name;

            let mut seen_hosts = BTreeSet::new();
            config.hosts = hosts
                .into_iter()
                .filter(|h| seen_hosts.insert(h.clone()))
                .collect();
            if config.hosts.is_empty() {
                config.hosts.push("localhost".to_string());
            }

            config.external_port = 42000;
            config.http_port = 42001;
            if let Some(store) = config.databases.get_mut("store") {
                store.port = 42002;
            }

            // Reserve the normalized forms already in use so generated
            // names can never alias an existing instance or role.
            let normalize = |name: &str| -> String {
                name.chars()
                    .map(|c| {
                        if c.is_ascii_alphanumeric() {
                            c.to_ascii_lowercase()
                        } else {
                            '_'
                        }
                    })
                    .collect()
            };
            let mut taken: BTreeSet<String> = ["store", "app", "edge", "acme", "admin", "public", "workers"]
                .iter()
                .map(|s| s.to_string())
                .collect();

            let engines = [EngineKind::Postgres, EngineKind::Mysql, EngineKind::Mariadb];
            let mut next_port = 42003u16;
            for (name, engine_idx) in databases {
                if !taken.insert(normalize(&name)) {
                    continue;
                }
                let engine = engines[engine_idx % engines.len()];
                config.databases.insert(
                    name,
                    DatabaseSpec {
                        engine,
                        port: next_port,
                        user: engine.default_user().to_string(),
                        password: "db_password".to_string(),
                    },
                );
                next_port += 1;
            }

            for name in profiles {
                if !taken.insert(normalize(&name)) {
                    continue;
                }
                config.profiles.insert(
                    name,
                    ProfileSpec {
                        repository: "berthstack".to_string(),
                        image: "worker".to_string(),
                        tag: "latest".to_string(),
                    },
                );
            }

            config
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: a configuration that passes validation never yields a
    /// compile error.
    #[test]
    fn property_valid_configs_always_compile(config in valid_config_strategy()) {
        validate(&config).expect("generated configuration should be valid");
        compile(&config).expect("valid configurations must compile");
    }

    /// PROPERTY: compilation is deterministic - two runs over the same
    /// configuration yield byte-identical artifacts.
    #[test]
    fn property_compile_is_deterministic(config in valid_config_strategy()) {
        let a = compile(&config).unwrap();
        let b = compile(&config).unwrap();
        prop_assert_eq!(a.compose_yaml().unwrap(), b.compose_yaml().unwrap());
        prop_assert_eq!(a.routing.conf, b.routing.conf);
        prop_assert_eq!(a.secrets.render(), b.secrets.render());
    }

    /// PROPERTY: secret values never appear in the topology artifact.
    #[test]
    fn property_secrets_stay_out_of_the_topology(
        mut config in valid_config_strategy(),
        password in proptest::string::string_regex("[a-zA-Z0-9]{12,24}").unwrap(),
    ) {
        config.admin_password = password.clone();
        let artifacts = compile(&config).unwrap();
        let yaml = artifacts.compose_yaml().unwrap();
        prop_assert!(!yaml.contains(&password));
        prop_assert!(artifacts.secrets.render().contains(&password));
    }

    /// PROPERTY: every service the compiler emits is namespaced by the
    /// stack name.
    #[test]
    fn property_services_are_namespaced(config in valid_config_strategy()) {
        let artifacts = compile(&config).unwrap();
        let prefix = format!("{}-", config.stack_name);
        for name in artifacts.topology.services.keys() {
            prop_assert!(
                name.starts_with(&prefix),
                "service {} is not namespaced by {}",
                name,
                prefix
            );
        }
    }
}
