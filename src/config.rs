//! INI-file configuration. Every field has a built-in default, and a
//! missing file or a missing key simply falls back to it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use crate::error::ConfigError;

const SECTION: &str = "aredn_ldap_bridge";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub listen_address: String,
    pub listen_port: u16,
    pub base_dn: String,
    pub upstream_nodes: Vec<String>,
    pub upstream_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub max_results: usize,
    pub protocol_filter: String,
    pub allow_anonymous_bind: bool,
    pub allow_simple_bind_any_creds: bool,
    pub log_level: String,
    /// Path the config was loaded from, if any — needed to re-read on SIGHUP.
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 389,
            base_dn: "dc=local,dc=mesh".to_string(),
            upstream_nodes: vec!["localnode.local.mesh".to_string()],
            upstream_timeout_seconds: 3,
            cache_ttl_seconds: 60,
            max_results: 20,
            protocol_filter: "phone".to_string(),
            allow_anonymous_bind: true,
            allow_simple_bind_any_creds: true,
            log_level: "INFO".to_string(),
            source_path: None,
        }
    }
}

impl Config {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }
}

/// Load config from `path`, falling back to defaults for any key that's
/// absent — or for every key, if the file itself can't be read.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };
    if !path.exists() {
        config.source_path = Some(path.to_path_buf());
        return Ok(config);
    }

    let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    let section = ini
        .section(Some(SECTION))
        .or_else(|| ini.section(None::<String>));

    if let Some(section) = section {
        if let Some(v) = section.get("listen_address") {
            config.listen_address = v.to_string();
        }
        if let Some(v) = section.get("listen_port") {
            if let Ok(p) = v.parse() {
                config.listen_port = p;
            }
        }
        if let Some(v) = section.get("base_dn") {
            config.base_dn = v.to_string();
        }
        if let Some(v) = section.get("upstream_nodes") {
            let nodes = split_node_list(v);
            if !nodes.is_empty() {
                config.upstream_nodes = nodes;
            }
        }
        if let Some(v) = section.get("upstream_timeout_seconds") {
            if let Ok(t) = v.parse() {
                config.upstream_timeout_seconds = t;
            }
        }
        if let Some(v) = section.get("cache_ttl_seconds") {
            if let Ok(t) = v.parse::<u64>() {
                config.cache_ttl_seconds = t.max(1);
            }
        }
        if let Some(v) = section.get("max_results") {
            if let Ok(m) = v.parse::<usize>() {
                config.max_results = m.max(1);
            }
        }
        if let Some(v) = section.get("protocol_filter") {
            config.protocol_filter = v.to_string();
        }
        if let Some(v) = section.get("allow_anonymous_bind") {
            config.allow_anonymous_bind = parse_bool(v, config.allow_anonymous_bind);
        }
        if let Some(v) = section.get("allow_simple_bind_any_creds") {
            config.allow_simple_bind_any_creds = parse_bool(v, config.allow_simple_bind_any_creds);
        }
        if let Some(v) = section.get("log_level") {
            config.log_level = v.to_string();
        }
    }

    config.source_path = Some(path.to_path_buf());
    Ok(config)
}

fn split_node_list(v: &str) -> Vec<String> {
    v.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(v: &str, default: bool) -> bool {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}
