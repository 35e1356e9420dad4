//! Client tuning loaded from `client_config.json`.
//!
//! Resolution order: explicit path, then `REALM_CLIENT_CONFIG_PATH`, then the
//! copy compiled into the crate.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use realm_proto::JoinPolicy;
use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_CLIENT_CONFIG: &str = include_str!("data/client_config.json");
pub const CONFIG_PATH_ENV: &str = "REALM_CLIENT_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub resize_quiescence_ms: u64,
    pub inbound_capacity: usize,
    pub coalesce_snapshots: bool,
    pub provisional_ttl_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_log_lines: usize,
    pub world: WorldBounds,
    pub provisional_team: ProvisionalTeamDefaults,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080".to_string(),
            resize_quiescence_ms: 250,
            inbound_capacity: 64,
            coalesce_snapshots: true,
            provisional_ttl_ms: 15_000,
            reconnect_delay_ms: 2_000,
            max_log_lines: 8,
            world: WorldBounds::default(),
            provisional_team: ProvisionalTeamDefaults::default(),
        }
    }
}

impl ClientConfig {
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_CLIENT_CONFIG).unwrap_or_else(|err| {
            tracing::warn!(
                target: "realm::config",
                error = %err,
                "client_config.builtin_invalid"
            );
            Self::default()
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_json_str(&contents)?)
    }

    pub fn resize_quiescence(&self) -> Duration {
        Duration::from_millis(self.resize_quiescence_ms)
    }

    pub fn provisional_ttl(&self) -> Duration {
        Duration::from_millis(self.provisional_ttl_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Inclusive grid bounds for directional movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min_x: 0,
            max_x: 19,
            min_y: 0,
            max_y: 19,
        }
    }
}

impl WorldBounds {
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        (x.clamp(self.min_x, self.max_x), y.clamp(self.min_y, self.max_y))
    }
}

/// Values given to a locally created team before the authority confirms it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProvisionalTeamDefaults {
    pub join_policy: JoinPolicy,
    pub color: String,
}

impl Default for ProvisionalTeamDefaults {
    fn default() -> Self {
        Self {
            join_policy: JoinPolicy::Request,
            color: "bg-gray-500".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse client config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read client config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Builtin,
}

/// Load configuration, preferring `explicit`, then the env override.
///
/// A file that fails to load is logged and the builtin copy is used instead.
pub fn load_client_config(explicit: Option<&Path>) -> (ClientConfig, ConfigSource) {
    let candidate = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

    if let Some(path) = candidate {
        match ClientConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "realm::config",
                    path = %path.display(),
                    "client_config.loaded=file"
                );
                return (config, ConfigSource::File(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "realm::config",
                    path = %path.display(),
                    error = %err,
                    "client_config.load_failed"
                );
            }
        }
    }

    tracing::info!(target: "realm::config", "client_config.loaded=builtin");
    (ClientConfig::builtin(), ConfigSource::Builtin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_defaults() {
        assert_eq!(ClientConfig::builtin(), ClientConfig::default());
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config =
            ClientConfig::from_json_str(r#"{"resize_quiescence_ms": 500, "world": {"max_x": 9}}"#)
                .unwrap();
        assert_eq!(config.resize_quiescence(), Duration::from_millis(500));
        assert_eq!(config.world.max_x, 9);
        assert_eq!(config.world.max_y, 19);
        assert!(config.coalesce_snapshots);
    }

    #[test]
    fn world_bounds_clamp_both_axes() {
        let bounds = WorldBounds::default();
        assert_eq!(bounds.clamp(-1, 20), (0, 19));
        assert_eq!(bounds.clamp(5, 7), (5, 7));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let (config, source) =
            load_client_config(Some(Path::new("/nonexistent/realm/client_config.json")));
        assert_eq!(source, ConfigSource::Builtin);
        assert_eq!(config, ClientConfig::default());
    }
}
