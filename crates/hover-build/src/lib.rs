pub mod orchestrator;
pub mod plan;

pub use orchestrator::{BuildError, BuildOrchestrator};
pub use plan::{BuildOutcome, BuildPlan};
