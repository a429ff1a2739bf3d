//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Asset resolution settings.
    pub assets: AssetConfig,

    /// Archive (GRF) settings.
    pub archive: ArchiveConfig,

    /// Plain static file fallback.
    #[serde(rename = "static")]
    pub static_files: StaticConfig,

    /// WebSocket to TCP relay settings.
    pub proxy: ProxyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:80").
    pub bind_address: String,

    /// Optional TLS configuration. When set, `bind_address` only redirects to HTTPS.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:80".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// HTTPS bind address (e.g., "127.0.0.1:443").
    pub bind_address: String,

    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Layered asset resolution.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory tiers probed in order before any archive.
    pub directory_roots: Vec<String>,

    /// First path segments (case-insensitive) routed to the resolver.
    pub route_prefixes: Vec<String>,

    /// `Cache-Control` value for resolved assets. Unset or empty emits no header.
    pub cache_control: Option<String>,

    /// Extensions (without dot) passed through the script rewrite.
    pub script_extensions: Vec<String>,

    /// Directories under `data/` whose entry names are percent-decoded again for archives.
    pub decode_categories: Vec<String>,

    /// File names that are always served with `no-cache`.
    pub bootstrap_scripts: Vec<String>,

    /// Content type for extensions missing from the table.
    pub default_content_type: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            directory_roots: vec!["resources".to_string()],
            route_prefixes: ["AI", "BGM", "data", "resources", "System", "SystemEN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cache_control: Some("no-cache".to_string()),
            script_extensions: vec!["lua".to_string(), "lub".to_string()],
            decode_categories: [
                "imf",
                "lua files",
                "luafiles514",
                "model",
                "palette",
                "sprite",
                "texture",
                "wav",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            bootstrap_scripts: vec![
                "Online.js".to_string(),
                "ThreadEventHandler.js".to_string(),
            ],
            default_content_type: "application/octet-stream".to_string(),
        }
    }
}

/// Archive container settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory holding the manifest and the containers it names.
    pub resources_dir: String,

    /// Manifest file name, relative to `resources_dir`.
    pub manifest: String,

    /// Keep parsed entry tables in memory between lookups.
    pub cache_tables: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            resources_dir: "resources".to_string(),
            manifest: "DATA.INI".to_string(),
            cache_tables: false,
        }
    }
}

/// Plain static serving for paths outside the asset routes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StaticConfig {
    /// Roots probed in order.
    pub roots: Vec<String>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            roots: vec!["public".to_string(), "../roBrowserLegacy/dist/Web".to_string()],
        }
    }
}

/// WebSocket to TCP relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Backend host used when the upgrade path names none.
    pub default_host: String,

    /// Backend port used when the upgrade path names none or an invalid one.
    pub default_port: u16,

    /// Log every relayed packet.
    pub debug: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            default_host: "127.0.0.1".to_string(),
            default_port: 5999,
            debug: false,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Asset request timeout in seconds.
    pub request_secs: u64,

    /// Grace period for draining connections on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log every served asset at info level.
    pub log_http: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_http: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.proxy.default_port, 5999);
        assert_eq!(config.assets.script_extensions, vec!["lua", "lub"]);
        assert_eq!(config.archive.manifest, "DATA.INI");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [proxy]
            default_port = 6900

            [static]
            roots = ["web"]

            [assets]
            directory_roots = ["resources", "extra"]
            "#,
        )
        .unwrap();
        assert_eq!(config.proxy.default_port, 6900);
        assert_eq!(config.proxy.default_host, "127.0.0.1");
        assert_eq!(config.static_files.roots, vec!["web"]);
        assert_eq!(config.assets.directory_roots, vec!["resources", "extra"]);
        assert_eq!(config.assets.default_content_type, "application/octet-stream");
    }
}
