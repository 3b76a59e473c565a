use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{DpiError, Result};

/// Reads, parses, and validates a TOML config file at `p`.
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p).map_err(|e| DpiError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt).map_err(|e| DpiError::Config(format!("failed to parse config: {e}")))?;
    validate_config(&cfg)?;
    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.orchestrator.cache_capacity == 0 {
        return Err(DpiError::Config("orchestrator.cache_capacity must be greater than zero".to_string()));
    }
    if cfg.timeouts.idle_secs == 0 {
        return Err(DpiError::Config("timeouts.idle_secs must be greater than zero".to_string()));
    }
    Ok(())
}
