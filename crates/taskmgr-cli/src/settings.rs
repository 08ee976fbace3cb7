use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use taskmgr_core::Config;

pub const APP_DIR: &str = "taskmgr";
pub const CONFIG_FILE: &str = "config.toml";

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Loads `explicit` if given (it must exist), else the per-user config file
/// if present, else defaults.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Config::default()),
        },
    };
    let content = fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = parse(&content).with_context(|| format!("in config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn parse(content: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> anyhow::Result<()> {
    if config.history.capacity == 0 {
        bail!("history.capacity must be at least 1");
    }
    if config.history.draft_capacity == 0 {
        bail!("history.draft_capacity must be at least 1");
    }
    if config.autosave.enabled && config.autosave.interval_secs == 0 {
        bail!("autosave.interval_secs must be at least 1");
    }
    if config.storage.key_prefix.contains(['/', '\\']) {
        bail!("storage.key_prefix must not contain path separators");
    }
    Ok(())
}

/// `--data-dir` wins over `storage.data_dir`, which wins over the platform
/// data directory.
pub fn data_dir(flag: Option<&Path>, config: &Config) -> anyhow::Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &config.storage.data_dir {
        return Ok(dir.clone());
    }
    match dirs::data_dir() {
        Some(dir) => Ok(dir.join(APP_DIR)),
        None => bail!("no data directory available; pass --data-dir"),
    }
}
