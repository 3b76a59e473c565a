use serde::Deserialize;

/// HTTP protocol-aware-flushing configuration (§4.3).
#[derive(Debug, Deserialize, Clone)]
pub struct PafConfig {
    /// Global byte-budget cap; a session that scans more bytes than this
    /// without flushing aborts to generic inspection. `0` means unbounded.
    #[serde(default)]
    pub byte_budget: u64,
    /// Pipeline depth at which the alert fires (§3, §4.3 "Pipelining").
    #[serde(default = "default_max_pipeline")]
    pub max_pipeline: u8,
}

impl Default for PafConfig {
    fn default() -> Self {
        Self { byte_budget: 0, max_pipeline: default_max_pipeline() }
    }
}

fn default_max_pipeline() -> u8 {
    24
}
