//! Optional on-disk defaults for flags that rarely change between runs
//! (poll interval, shell interpreter, listen address, worker count). CLI
//! flags always win; this file is purely a convenience and its absence is
//! never an error. Shape and load/save conventions follow this project's
//! existing `SubmitterConfig` (an XDG-config-dir JSON file, normalized on
//! load and save).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub poll_interval_micros: Option<u64>,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default)]
    pub workers: Option<u32>,
}

fn xdg_config_home() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
        let dir = PathBuf::from(dir);
        if dir.as_os_str().is_empty() {
            anyhow::bail!("XDG_CONFIG_HOME is set but empty");
        }
        return Ok(dir);
    }

    let home = std::env::var_os("HOME").ok_or_else(|| anyhow::anyhow!("HOME is not set"))?;
    let home = PathBuf::from(home);
    if home.as_os_str().is_empty() {
        anyhow::bail!("HOME is set but empty");
    }
    Ok(home.join(".config"))
}

pub fn defaults_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_home()?.join("worker").join("config.json"))
}

/// Loads the defaults file if present. `Ok(None)` (not an error) when the
/// file is missing, matching spec.md's soft-error posture for optional
/// configuration.
pub fn load_defaults() -> anyhow::Result<Option<Defaults>> {
    let path = defaults_config_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)?;
    let cfg: Defaults = serde_json::from_str(&raw)?;
    Ok(Some(cfg))
}

pub fn save_defaults(cfg: &Defaults) -> anyhow::Result<()> {
    let path = defaults_config_path()?;
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid config path: {}", path.display()))?;
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(cfg)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}
