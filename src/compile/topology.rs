//! Compose-schema topology model.
//!
//! Plain serde types, ordered maps throughout so serialization is
//! byte-stable. The compiler fills these in; nothing here reads the
//! runtime.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The compiled description of all services, their images, env, volumes
/// and network membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub services: BTreeMap<String, Service>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, NamedVolume>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, Network>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub image: String,

    pub container_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    /// `host:container` publications.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    /// Named volumes and bind mounts, `source:target[:mode]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,

    /// Compose profiles; a profiled service is not started by a plain
    /// `up`, only when explicitly requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
}

impl Service {
    pub fn new(image: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            container_name: container_name.into(),
            restart: Some("always".to_string()),
            environment: BTreeMap::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            depends_on: Vec::new(),
            networks: Vec::new(),
            profiles: Vec::new(),
        }
    }
}

/// A named volume entry; compose only needs the key to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamedVolume {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub driver: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<Ipam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ipam {
    pub config: Vec<IpamPool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpamPool {
    pub subnet: String,
}

impl Topology {
    /// Render the topology artifact.
    pub fn to_yaml(&self) -> Result<String, serde_yaml_ng::Error> {
        serde_yaml_ng::to_string(self)
    }
}
