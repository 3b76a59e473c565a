//! TOML-backed configuration, laid out one file per concern and loaded via
//! [`load_from_path`] with a read-then-parse-then-validate shape.

mod loader;
mod orchestrator;
mod paf;
mod reconciler;
mod root;
mod timeouts;

pub use loader::load_from_path;
pub use orchestrator::OrchestratorConfig;
pub use paf::PafConfig;
pub use reconciler::ReconcilerConfig;
pub use root::Config;
pub use timeouts::TimeoutsConfig;
