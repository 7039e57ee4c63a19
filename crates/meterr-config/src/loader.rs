// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./meterr.toml` > `~/.config/meterr/meterr.toml` >
//! `/etc/meterr/meterr.toml`, with `METERR_*` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MeterrConfig;

/// Sections addressable from the environment, e.g. `METERR_DELIVERY_BATCH_SIZE`.
const ENV_SECTIONS: &[&str] = &["collector", "queue", "delivery", "tracking", "logging"];

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/meterr/meterr.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "meterr.toml";

/// Per-user config file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("meterr").join("meterr.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/meterr/meterr.toml`
/// 3. `~/.config/meterr/meterr.toml`
/// 4. `./meterr.toml`
/// 5. `METERR_*` environment variables
pub fn load_config() -> Result<MeterrConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<MeterrConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MeterrConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MeterrConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MeterrConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(MeterrConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider mapping `METERR_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the leading section name is split off, so keys that themselves
/// contain underscores (`METERR_DELIVERY_BACKOFF_CAP_MS`) stay intact.
/// `METERR_API_KEY` is accepted as shorthand for `collector.api_key`.
pub fn env_provider() -> Env {
    Env::prefixed("METERR_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    if key == "api_key" {
        return "collector.api_key".to_string();
    }
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_only_the_section() {
        assert_eq!(map_env_key("delivery_backoff_cap_ms"), "delivery.backoff_cap_ms");
        assert_eq!(map_env_key("collector_endpoint"), "collector.endpoint");
        assert_eq!(map_env_key("queue_database_path"), "queue.database_path");
        assert_eq!(map_env_key("api_key"), "collector.api_key");
    }

    #[test]
    fn unknown_env_keys_pass_through() {
        assert_eq!(map_env_key("frobnicate"), "frobnicate");
    }
}
