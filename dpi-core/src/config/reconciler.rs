use serde::Deserialize;

/// Reconciler pairing and queue-sizing configuration (§4.1-§4.4).
#[derive(Debug, Deserialize, Clone)]
pub struct ReconcilerConfig {
    /// Interface to capture data packets and reports on.
    #[serde(default)]
    pub in_iface: Option<String>,
    /// Interface to forward reconciled packets out of.
    #[serde(default)]
    pub out_iface: Option<String>,
    /// Pairing timeout in seconds before an unmatched packet or report is
    /// dropped from its queue.
    #[serde(default = "default_pair_timeout_secs")]
    pub pair_timeout_secs: u64,
    /// Janitor sweep interval in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Whether this reconciler sits at the terminal hop and must scrub the
    /// TOS evidence bits before forwarding (§5).
    #[serde(default)]
    pub terminal_hop: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            in_iface: None,
            out_iface: None,
            pair_timeout_secs: default_pair_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            terminal_hop: false,
        }
    }
}

fn default_pair_timeout_secs() -> u64 {
    10
}

fn default_sweep_interval_secs() -> u64 {
    3
}
