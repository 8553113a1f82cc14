/*
[INPUT]:  Public API exports for the volume runner crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod engine;
pub mod pricing;
pub mod reconcile;
pub mod stats;
pub mod stop;
pub mod store;
pub mod supervisor;
pub mod worker;

// Re-export main types for convenience
pub use config::{EngineTuning, RunnerConfig};
pub use engine::{EngineError, EngineSettings, PairEngine, RoundOutcome};
pub use reconcile::Reconciler;
pub use stats::RunStats;
pub use stop::StopController;
pub use store::{TaskRecord, TaskStatus, TaskStore};
pub use supervisor::Supervisor;
