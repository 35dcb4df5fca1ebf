//! Broker endpoint and TLS material handling.
//!
//! Accepted broker address formats:
//! - `host:port` (plain TCP unless TLS is forced)
//! - `mqtt://host:port` or `tcp://host:port` (plain TCP)
//! - `mqtts://host:port` or `ssl://host:port` (TLS)
//! - `[ipv6]:port`

use anyhow::{anyhow, Context, Result};
use rumqttc::Transport;
use std::path::Path;

use crate::config::MqttSettings;

/// Broker host, port and whether TLS is required.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl MqttEndpoint {
    pub fn is_loopback(&self) -> bool {
        let host = self.host.as_str();
        if host == "localhost" {
            return true;
        }
        host.parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
    }
}

impl std::fmt::Display for MqttEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = if self.use_tls { "mqtts" } else { "mqtt" };
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

/// Parse a broker address. `force_tls` upgrades schemeless addresses to TLS.
pub fn parse_mqtt_endpoint(addr: &str, force_tls: bool) -> Result<MqttEndpoint> {
    let mut use_tls = force_tls;
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => use_tls = true,
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    if host.is_empty() {
        return Err(anyhow!("missing MQTT host in {}", addr));
    }
    Ok(MqttEndpoint {
        host,
        port,
        use_tls,
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid MQTT port in {}", addr))?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid MQTT port in {}", addr))?;
    Ok((host.to_string(), port))
}

/// Refuse non-loopback brokers unless remote brokers are explicitly allowed.
pub fn check_broker_policy(endpoint: &MqttEndpoint, allow_remote: bool) -> Result<()> {
    if endpoint.is_loopback() {
        return Ok(());
    }
    if allow_remote {
        log::warn!(
            "remote MQTT broker {} enabled - ensure it is on a trusted network",
            endpoint
        );
        return Ok(());
    }
    Err(anyhow!(
        "MQTT broker must be loopback: {} (set mqtt.allow_remote to override)",
        endpoint
    ))
}

/// PEM-encoded certificate material for TLS connections.
#[derive(Clone, Debug, Default)]
pub struct TlsMaterials {
    /// CA certificate. `None` uses the default root store.
    pub ca: Option<Vec<u8>>,
    /// Client certificate and key for mutual TLS.
    pub client_auth: Option<(Vec<u8>, Vec<u8>)>,
}

impl TlsMaterials {
    /// Read materials from disk. Client certificate and key go together.
    pub fn load(
        ca_path: Option<&Path>,
        client_cert_path: Option<&Path>,
        client_key_path: Option<&Path>,
    ) -> Result<Self> {
        let ca = match ca_path {
            Some(path) => Some(
                std::fs::read(path)
                    .with_context(|| format!("failed to read MQTT TLS CA '{}'", path.display()))?,
            ),
            None => None,
        };

        let client_auth = match (client_cert_path, client_key_path) {
            (Some(cert_path), Some(key_path)) => {
                let cert = std::fs::read(cert_path).with_context(|| {
                    format!(
                        "failed to read MQTT TLS client cert '{}'",
                        cert_path.display()
                    )
                })?;
                let key = std::fs::read(key_path).with_context(|| {
                    format!(
                        "failed to read MQTT TLS client key '{}'",
                        key_path.display()
                    )
                })?;
                Some((cert, key))
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(anyhow!("MQTT TLS client certificate provided without key"))
            }
            (None, Some(_)) => {
                return Err(anyhow!("MQTT TLS client key provided without certificate"))
            }
        };

        Ok(Self { ca, client_auth })
    }

    pub fn from_settings(settings: &MqttSettings) -> Result<Self> {
        Self::load(
            settings.tls_ca_path.as_deref(),
            settings.tls_client_cert_path.as_deref(),
            settings.tls_client_key_path.as_deref(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.ca.is_some() || self.client_auth.is_some()
    }
}

/// Build the rumqttc transport for `endpoint`.
pub fn build_transport(endpoint: &MqttEndpoint, tls: &TlsMaterials) -> Result<Transport> {
    if !endpoint.use_tls {
        if tls.is_configured() {
            return Err(anyhow!(
                "MQTT TLS materials provided but TLS is disabled (set mqtt.use_tls or use mqtts://)"
            ));
        }
        return Ok(Transport::tcp());
    }

    if !tls.is_configured() {
        return Ok(Transport::tls_with_default_config());
    }

    let ca = tls.ca.clone().ok_or_else(|| {
        anyhow!("MQTT TLS CA certificate is required when providing client certificates")
    })?;
    Ok(Transport::tls(ca, tls.client_auth.clone(), None))
}
