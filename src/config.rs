// ABOUTME: YAML configuration file format: which buses to listen on and which ports to serve
// ABOUTME: loading is async via tokio::fs, matching the rest of the crate's I/O story

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

fn default_metrics_port() -> u16 {
    8000
}

/// Top-level configuration file format, e.g.:
///
/// ```yaml
/// port: 8000
/// listeners:
///   system1: /dev/ttyUSB0
///   system2: telnet://192.0.2.10:23
/// sniffserver: 8080
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the metrics exposition server listens on.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    /// Monitor name -> bus URI/path, handed to [`crate::stream::open`].
    #[serde(default)]
    pub listeners: HashMap<String, String>,
    /// Port for the read/write debug server; omitted or zero disables it.
    #[serde(default)]
    pub sniffserver: Option<u16>,
    /// Whether newly spawned monitors should listen before writing. Disable
    /// only on a bus with no thermostat present to ACK our requests.
    #[serde(default = "default_listen_before_talk")]
    pub listen_before_talk: bool,
}

fn default_listen_before_talk() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: default_metrics_port(),
            listeners: HashMap::new(),
            sniffserver: None,
            listen_before_talk: default_listen_before_talk(),
        }
    }
}

impl Config {
    /// Load and parse a YAML config file. A missing or empty file is treated
    /// as an all-defaults configuration, matching the original tool's
    /// "config file is optional" behavior.
    pub async fn load(path: &Path) -> Result<Config> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::FinitudeError::SchemaError(format!("invalid config: {e}")))?;
        Ok(config)
    }
}
