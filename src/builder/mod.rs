//! Package builds.
//!
//! Sources are staged with rewritten imports, handed to the external build
//! engine once per output format, and wrapped in a generated `package.json`.

pub mod engine;
pub mod externals;
pub mod orchestrator;
pub mod staging;

pub use engine::{BuildEngine, CommandEngine, EngineJob, ModuleFormat};
pub use externals::{compute_globals, ExternalRules};
pub use orchestrator::{BuildOrchestrator, BuildOutcome};
pub use staging::{stage_sources, StagedSources};
