//! Deterministic scenario replay.
//!
//! Scenarios drive an [`OfflineEngine`](crate::engine::OfflineEngine) through
//! a scripted sequence of mutations, connectivity changes, cache operations
//! and conflict resolutions on a manual clock, producing a [`Transcript`].

mod applier;
mod model;
mod runner;

pub use applier::ScriptedApplier;
pub use model::{
    CacheWrite, Invalidation, Outcome, ResolveStep, Scenario, ScheduleStep, Step,
};
pub use runner::{ScenarioRunner, StepResult, Transcript};
