//! Edge routing rules.
//!
//! Rendered as an nginx-compatible server configuration consumed by the
//! edge container. Rendering is pure string assembly from configuration
//! values; the same input always yields the same bytes.

use serde::{Deserialize, Serialize};

use crate::compile::naming;
use crate::config::{SslConfig, StackConfig};

/// In-container TLS port the edge listens on; published as
/// `external_port:443`.
pub const EDGE_TLS_PORT: u16 = 443;
/// In-container plaintext port; published as `http_port:80`.
pub const EDGE_HTTP_PORT: u16 = 80;
/// Port the application service listens on inside the network.
pub const APP_HTTP_PORT: u16 = 8080;

/// In-container paths the edge expects its material at.
pub const EDGE_CERT_PATH: &str = "/etc/nginx/certs/edge.crt";
pub const EDGE_KEY_PATH: &str = "/etc/nginx/certs/edge.key";
/// Shared writable location challenges are served from.
pub const CHALLENGE_ROOT: &str = "/var/www/challenge";
/// Well-known path the validation authority fetches.
pub const CHALLENGE_PATH: &str = "/.well-known/acme-challenge/";

/// The compiled routing rules.
///
/// `conf` is the active edge configuration. `challenge_conf` exists only
/// under the acme strategy: a minimal plaintext rule set used during the
/// bootstrap sequence and retired once it completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRules {
    pub conf: String,

    pub challenge_conf: Option<String>,
}

pub fn render(config: &StackConfig) -> RoutingRules {
    let conf = match &config.ssl {
        SslConfig::External => plain_server(config),
        _ => tls_server(config),
    };
    let challenge_conf = match &config.ssl {
        SslConfig::Acme { .. } => Some(challenge_server(config)),
        _ => None,
    };
    RoutingRules {
        conf,
        challenge_conf,
    }
}

fn server_names(config: &StackConfig) -> String {
    config.hosts.join(" ")
}

fn proxy_pass(config: &StackConfig) -> String {
    format!(
        "http://{}:{}",
        naming::role_service(config, naming::ROLE_APP),
        APP_HTTP_PORT
    )
}

fn proxy_location(config: &StackConfig) -> String {
    format!(
        "    location / {{\n\
         \x20       proxy_pass {};\n\
         \x20       proxy_set_header Host $host;\n\
         \x20       proxy_set_header X-Real-IP $remote_addr;\n\
         \x20       proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n\
         \x20       proxy_set_header X-Forwarded-Proto $scheme;\n\
         \x20   }}\n",
        proxy_pass(config)
    )
}

/// Full rule set: TLS termination, all traffic to the application.
fn tls_server(config: &StackConfig) -> String {
    format!(
        "server {{\n\
         \x20   listen {EDGE_TLS_PORT} ssl;\n\
         \x20   server_name {names};\n\
         \n\
         \x20   ssl_certificate {EDGE_CERT_PATH};\n\
         \x20   ssl_certificate_key {EDGE_KEY_PATH};\n\
         \n\
         {location}\
         }}\n",
        names = server_names(config),
        location = proxy_location(config),
    )
}

/// Pass-through rule set: plaintext only, certificate material is never
/// referenced.
fn plain_server(config: &StackConfig) -> String {
    format!(
        "server {{\n\
         \x20   listen {EDGE_HTTP_PORT};\n\
         \x20   server_name {names};\n\
         \n\
         {location}\
         }}\n",
        names = server_names(config),
        location = proxy_location(config),
    )
}

/// Bootstrap-only rule set: serves the validation-challenge path over
/// plaintext and nothing else.
fn challenge_server(config: &StackConfig) -> String {
    format!(
        "server {{\n\
         \x20   listen {EDGE_HTTP_PORT};\n\
         \x20   server_name {names};\n\
         \n\
         \x20   location {CHALLENGE_PATH} {{\n\
         \x20       root {CHALLENGE_ROOT};\n\
         \x20   }}\n\
         \n\
         \x20   location / {{\n\
         \x20       return 503;\n\
         \x20   }}\n\
         }}\n",
        names = server_names(config),
    )
}
