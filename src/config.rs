//! Configuration management for Collate Server

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::artifacts::{
    DEFAULT_STRAY_MAX_AGE_SECS, DEFAULT_STRAY_SWEEP_SECS, DEFAULT_SWEEP_SECS, DEFAULT_TTL_SECS,
};
use crate::assembly::DEFAULT_MAX_TOTAL_PAGES;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub artifacts: ArtifactConfig,
    pub limits: LimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Directory holding artifact blobs
    pub dir: PathBuf,
    /// Artifact time-to-live in seconds
    pub ttl_secs: u64,
    /// Expiry sweep interval in seconds; must stay below the TTL
    pub sweep_secs: u64,
    /// Stray-file backstop interval in seconds
    pub stray_sweep_secs: u64,
    /// Age before an unindexed file is purged, in seconds
    pub stray_max_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitConfig {
    /// Maximum total output pages per assembly plan
    pub max_total_pages: usize,
    /// Maximum multipart upload size in bytes
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            artifacts: ArtifactConfig::default(),
            limits: LimitConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 3000 }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        ArtifactConfig {
            dir: PathBuf::from("./collate-artifacts"),
            ttl_secs: DEFAULT_TTL_SECS,
            sweep_secs: DEFAULT_SWEEP_SECS,
            stray_sweep_secs: DEFAULT_STRAY_SWEEP_SECS,
            stray_max_age_secs: DEFAULT_STRAY_MAX_AGE_SECS,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        LimitConfig {
            max_total_pages: DEFAULT_MAX_TOTAL_PAGES,
            max_upload_bytes: 200 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            server: ServerConfig {
                port: env_parsed("SERVER_PORT", ServerConfig::default().port),
            },
            artifacts: ArtifactConfig {
                dir: env::var("ARTIFACT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| ArtifactConfig::default().dir),
                ttl_secs: env_parsed("ARTIFACT_TTL_SECS", DEFAULT_TTL_SECS),
                sweep_secs: env_parsed("ARTIFACT_SWEEP_SECS", DEFAULT_SWEEP_SECS),
                stray_sweep_secs: env_parsed("STRAY_SWEEP_SECS", DEFAULT_STRAY_SWEEP_SECS),
                stray_max_age_secs: env_parsed("STRAY_MAX_AGE_SECS", DEFAULT_STRAY_MAX_AGE_SECS),
            },
            limits: LimitConfig {
                max_total_pages: env_parsed("MAX_TOTAL_PAGES", DEFAULT_MAX_TOTAL_PAGES),
                max_upload_bytes: env_parsed(
                    "MAX_UPLOAD_BYTES",
                    LimitConfig::default().max_upload_bytes,
                ),
            },
        }
    }

    /// Enforce cross-field invariants, warning and clamping where needed.
    ///
    /// The sweep interval must stay strictly below the TTL or an artifact
    /// could outlive its TTL by more than one sweep.
    pub fn validated(mut self) -> Self {
        if self.artifacts.sweep_secs >= self.artifacts.ttl_secs {
            let clamped = (self.artifacts.ttl_secs / 2).max(1);
            tracing::warn!(
                sweep_secs = self.artifacts.sweep_secs,
                ttl_secs = self.artifacts.ttl_secs,
                clamped_to = clamped,
                "Sweep interval must be below the artifact TTL; clamping"
            );
            self.artifacts.sweep_secs = clamped;
        }
        self
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_sweep_below_ttl() {
        let config = Config::default();
        assert!(config.artifacts.sweep_secs < config.artifacts.ttl_secs);
    }

    #[test]
    fn validation_clamps_oversized_sweep_interval() {
        let mut config = Config::default();
        config.artifacts.ttl_secs = 60;
        config.artifacts.sweep_secs = 600;

        let validated = config.validated();
        assert_eq!(validated.artifacts.sweep_secs, 30);
    }
}
