use serde::Deserialize;

/// Service-detection orchestrator configuration (§4.6-§4.7).
#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorConfig {
    /// Detection level: 0 disables the TLS-tunnel port remap, 1 enables it
    /// (465->25, 563->119, 993->143, 990->21, 992->23, 994->6667, 995->110).
    #[serde(default = "default_detection_level")]
    pub detection_level: u8,
    /// Service-ID cache capacity before LRU eviction kicks in.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { detection_level: default_detection_level(), cache_capacity: default_cache_capacity() }
    }
}

fn default_detection_level() -> u8 {
    1
}

fn default_cache_capacity() -> usize {
    4096
}
