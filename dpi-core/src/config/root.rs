use serde::Deserialize;

use super::orchestrator::OrchestratorConfig;
use super::paf::PafConfig;
use super::reconciler::ReconcilerConfig;
use super::timeouts::TimeoutsConfig;

/// Top-level configuration structure for the reconciler binary and the
/// library components it wires together.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub paf: PafConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}
