use serde::Deserialize;

/// Flow-table timeout configuration (§4.4).
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutsConfig {
    /// Idle timeout in seconds before a flow-table entry expires.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_secs: u64,
    /// Flow-table expiry sweep interval in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self { idle_secs: default_idle_timeout_secs(), sweep_interval_secs: default_sweep_interval_secs() }
    }
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    1
}
