//! Startup configuration, read once from the environment.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, bail};

use crate::core::Result;
use crate::provider::NamespacePolicy;

pub const ENV_READ_ONLY: &str = "REGFS_READ_ONLY";
pub const ENV_BLOCK_MODIFY: &str = "REGFS_BLOCK_MODIFY";
pub const ENV_HIVE: &str = "REGFS_HIVE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Deny rename and delete inside the projection.
    pub read_only: bool,
    /// Additionally deny in-place modification of hydrated files while read-only.
    pub block_content_modification: bool,
    /// Directory tree to serve as the backing store; an empty in-memory store otherwise.
    pub hive: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            read_only: true,
            block_content_modification: false,
            hive: None,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Unset or empty
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = var(ENV_READ_ONLY) {
            config.read_only = parse_bool(&raw).with_context(|| format!("invalid {ENV_READ_ONLY}"))?;
        }
        if let Some(raw) = var(ENV_BLOCK_MODIFY) {
            config.block_content_modification =
                parse_bool(&raw).with_context(|| format!("invalid {ENV_BLOCK_MODIFY}"))?;
        }
        config.hive = var(ENV_HIVE).map(PathBuf::from);
        Ok(config)
    }

    pub fn policy(&self) -> NamespacePolicy {
        NamespacePolicy::new(self.read_only).with_content_modification_blocked(self.block_content_modification)
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}
