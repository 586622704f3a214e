//! Property tests for the export/import transform.

use proptest::prelude::*;
use std::collections::BTreeMap;

use berth::config::{
    export, import, DatabaseSpec, EngineKind, NetworkChoice, ProfileSpec, SslConfig, StackConfig,
};

fn name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9-]{0,11}").unwrap()
}

fn host_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9.-]{0,19}").unwrap()
}

fn ssl_strategy() -> impl Strategy<Value = SslConfig> {
    prop_oneof![
        Just(SslConfig::SelfSigned),
        Just(SslConfig::External),
        host_strategy().prop_map(|h| SslConfig::Acme {
            email: format!("ops@{h}.test")
        }),
        (host_strategy(), host_strategy()).prop_map(|(a, b)| SslConfig::Manual {
            cert_path: format!("/certs/{a}.crt").into(),
            key_path: format!("/certs/{b}.key").into(),
        }),
    ]
}

fn engine_strategy() -> impl Strategy<Value = EngineKind> {
    prop_oneof![
        Just(EngineKind::Postgres),
        Just(EngineKind::Mysql),
        Just(EngineKind::Mariadb),
    ]
}

/// An arbitrary configuration. Not necessarily *valid* (ports may clash);
/// the transform must round-trip either way.
fn config_strategy() -> impl Strategy<Value = StackConfig> {
    let databases = proptest::collection::btree_map(
        name_strategy(),
        (engine_strategy(), 1024u16..=65535, name_strategy()).prop_map(
            |(engine, port, password)| DatabaseSpec {
                engine,
                port,
                user: engine.default_user().to_string(),
                password,
            },
        ),
        0..4,
    );
    let profiles = proptest::collection::btree_map(
        name_strategy(),
        (name_strategy(), name_strategy(), name_strategy()).prop_map(
            |(repository, image, tag)| ProfileSpec {
                repository,
                image,
                tag,
            },
        ),
        0..4,
    );

    (
        name_strategy(),
        proptest::collection::vec(host_strategy(), 1..4),
        1024u16..=65535,
        1024u16..=65535,
        name_strategy(),
        ssl_strategy(),
        databases,
        profiles,
        prop_oneof![
            Just(NetworkChoice::RuntimeDefault),
            (0u8..=31).prop_map(|n| NetworkChoice::Subnet(format!("172.{n}.0.0/16"))),
        ],
    )
        .prop_map(
            |(stack_name, hosts, external_port, http_port, admin_password, ssl, extra, profiles, network)| {
                // Keep the invariant every real configuration carries: one
                // primary metadata instance.
                let mut databases: BTreeMap<String, DatabaseSpec> = extra;
                databases.insert(
                    "store".to_string(),
                    DatabaseSpec {
                        engine: EngineKind::Mongo,
                        port: 27017,
                        user: "root".to_string(),
                        password: "mongo_password".to_string(),
                    },
                );
                StackConfig {
                    stack_name,
                    hosts,
                    external_port,
                    http_port,
                    admin_password,
                    ssl,
                    databases,
                    profiles,
                    network,
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: `import(export(c)) == c` for every configuration.
    #[test]
    fn property_export_import_round_trips(config in config_strategy()) {
        let encoded = export(&config).expect("export should never fail");
        let decoded = import(&encoded).expect("import of a fresh export should never fail");
        prop_assert_eq!(decoded, config);
    }

    /// PROPERTY: the export string is paste-safe (single line, no spaces,
    /// no padding characters).
    #[test]
    fn property_export_is_paste_safe(config in config_strategy()) {
        let encoded = export(&config).expect("export should never fail");
        prop_assert!(!encoded.contains(' '));
        prop_assert!(!encoded.contains('\n'));
        prop_assert!(!encoded.contains('='));
        prop_assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    /// PROPERTY: `import` never panics on arbitrary input.
    #[test]
    fn property_import_never_panics(data in "(?s).{0,256}") {
        let _ = import(&data);
    }
}
