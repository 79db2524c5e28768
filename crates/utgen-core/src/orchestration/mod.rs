//! Orchestration of the generate-run-fix loop.
//!
//! - [`config`]: `LoopConfig`, `ExhaustionPolicy`, `FatalPolicy`
//! - [`state`]: `UnitState`, `RetryState`, `UnitOutcome`
//! - [`engine`]: `Orchestrator`

pub mod config;
pub mod engine;
pub mod state;

pub use config::{ExhaustionPolicy, FatalPolicy, LoopConfig};
pub use engine::Orchestrator;
pub use state::{RetryState, UnitOutcome, UnitState};
