//! Scenario replay.
//!
//! Builds an [`OfflineEngine`] on a manual clock and a scripted transport,
//! runs every step in order and records what each one did. Failing steps
//! (bad patterns, unknown strategies) are recorded and do not stop the run.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::applier::ScriptedApplier;
use super::model::{CacheWrite, Invalidation, ResolveStep, Scenario, ScheduleStep, Step};
use crate::cache::CacheSize;
use crate::config::Config;
use crate::conflict::ConflictStrategy;
use crate::core::ManualClock;
use crate::engine::OfflineEngine;
use crate::network::NetworkStatus;
use crate::scheduler::BackgroundSyncTask;
use crate::sync::{DeadLetterSink, DrainReport, SyncQueueItem};

/// What one step did.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Position in the scenario, starting at 1
    pub index: usize,
    /// Step kind
    pub action: &'static str,
    /// Whether the step was accepted
    pub success: bool,
    /// One-line description
    pub summary: String,
    /// Drain triggered by the step, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain: Option<DrainReport>,
    /// Step-specific data (read values, resolutions, task descriptors)
    #[serde(skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

impl StepResult {
    fn ok(action: &'static str, summary: impl Into<String>) -> Self {
        Self {
            index: 0,
            action,
            success: true,
            summary: summary.into(),
            drain: None,
            detail: Value::Null,
        }
    }

    fn failed(action: &'static str, summary: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(action, summary)
        }
    }

    fn with_drain(mut self, drain: Option<DrainReport>) -> Self {
        self.drain = drain.filter(|d| !d.is_empty());
        self
    }

    fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Full record of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    /// Scenario name
    pub name: Option<String>,
    /// Per-step results
    pub steps: Vec<StepResult>,
    /// Mutations still queued at the end
    pub pending: Vec<SyncQueueItem>,
    /// Connectivity at the end
    pub network: NetworkStatus,
    /// Cache size at the end
    pub cache: CacheSize,
    /// Cache keys at the end
    pub cache_keys: Vec<String>,
    /// Registered background tasks
    pub tasks: Vec<BackgroundSyncTask>,
    /// Total apply calls made
    pub apply_calls: usize,
}

impl Transcript {
    /// Number of steps that failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.success).count()
    }
}

/// Replays scenarios against a fresh engine.
pub struct ScenarioRunner {
    config: Config,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
}

impl ScenarioRunner {
    /// Create a runner using `config` for engine defaults.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            dead_letters: None,
        }
    }

    /// Hand mutations dropped during the run to `sink`.
    #[must_use]
    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    /// Replay `scenario` from a clean engine starting at the Unix epoch.
    pub async fn run(&self, scenario: &Scenario) -> Transcript {
        let clock = Arc::new(ManualClock::at_epoch());
        let applier = Arc::new(ScriptedApplier::new(scenario.outcomes.iter().copied()));

        let mut builder = OfflineEngine::builder(applier.clone())
            .config(&self.config)
            .clock(clock.clone());
        if scenario.start_offline {
            builder = builder.network(NetworkStatus::offline());
        }
        if let Some(max_attempts) = scenario.max_attempts {
            builder = builder.max_attempts(max_attempts);
        }
        if let Some(ttl_ms) = scenario.default_ttl_ms {
            builder = builder.default_ttl(Duration::from_millis(ttl_ms));
        }
        if let Some(sink) = &self.dead_letters {
            builder = builder.dead_letters(Arc::clone(sink));
        }
        let engine = builder.build();

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (i, step) in scenario.steps.iter().enumerate() {
            let mut result = run_step(&engine, &clock, step).await;
            result.index = i + 1;
            debug!(index = result.index, action = result.action, success = result.success, "scenario step");
            steps.push(result);
        }

        Transcript {
            name: scenario.name.clone(),
            steps,
            pending: engine.get_queue(),
            network: engine.get_network_status(),
            cache: engine.get_cache_size(),
            cache_keys: engine.cache().keys(),
            tasks: engine.scheduler().tasks(),
            apply_calls: applier.calls().len(),
        }
    }
}

async fn run_step(engine: &OfflineEngine, clock: &ManualClock, step: &Step) -> StepResult {
    match step {
        Step::Enqueue(mutation) => {
            let (id, drain) = engine.enqueue(mutation.clone()).await;
            StepResult::ok(
                "enqueue",
                format!("queued {} {} as {id}", mutation.mutation_type, mutation.resource),
            )
            .with_drain(Some(drain))
        },
        Step::Process => {
            let drain = engine.process_queue().await;
            StepResult::ok("process", format!("{} pending", engine.get_queue().len()))
                .with_drain(Some(drain))
        },
        Step::ClearQueue => {
            let discarded = engine.get_queue().len();
            engine.clear_queue();
            StepResult::ok("clear_queue", format!("discarded {discarded}"))
        },
        Step::Network(update) => {
            let drain = engine.update_network_status(*update).await;
            let status = engine.get_network_status();
            let state = if status.online { "online" } else { "offline" };
            StepResult::ok("network", state)
                .with_drain(drain)
                .with_detail(json!(status))
        },
        Step::Cache(write) => cache_write(engine, write),
        Step::Read(key) => match engine.get_cached_data(key) {
            Some(data) => StepResult::ok("read", format!("hit {key}")).with_detail(data),
            None => StepResult::ok("read", format!("miss {key}")),
        },
        Step::Invalidate(scope) => invalidate(engine, scope),
        Step::Sweep => {
            let removed = engine.optimize_cache();
            StepResult::ok("sweep", format!("removed {removed} expired"))
        },
        Step::AdvanceMs(ms) => {
            clock.advance(Duration::from_millis(*ms));
            StepResult::ok("advance", format!("+{ms}ms"))
        },
        Step::Resolve(resolve) => resolve_step(engine, resolve),
        Step::Schedule(schedule) => schedule_step(engine, schedule),
    }
}

fn cache_write(engine: &OfflineEngine, write: &CacheWrite) -> StepResult {
    let cache = engine.cache();
    let ttl = write
        .ttl_ms
        .map_or_else(|| cache.default_ttl(), Duration::from_millis);
    cache.cache_data_tagged(&write.key, write.data.clone(), ttl, write.tags.iter().cloned());
    StepResult::ok("cache", format!("cached {} for {}ms", write.key, ttl.as_millis()))
}

fn invalidate(engine: &OfflineEngine, scope: &Invalidation) -> StepResult {
    let removed = match scope {
        Invalidation::All => engine.invalidate_cache(None),
        Invalidation::Pattern(pattern) => engine.invalidate_cache(Some(pattern.as_str())),
        Invalidation::Tag(tag) => Ok(engine.cache().invalidate_tag(tag)),
    };
    match removed {
        Ok(n) => StepResult::ok("invalidate", format!("removed {n}")),
        Err(e) => StepResult::failed("invalidate", e.to_string()),
    }
}

fn resolve_step(engine: &OfflineEngine, resolve: &ResolveStep) -> StepResult {
    let strategy = match resolve.strategy.as_deref().map(str::parse::<ConflictStrategy>) {
        None => None,
        Some(Ok(strategy)) => Some(strategy),
        Some(Err(e)) => return StepResult::failed("resolve", e.to_string()),
    };
    let resolution = engine.resolve_conflict(resolve.client.clone(), resolve.server.clone(), strategy);
    StepResult::ok("resolve", format!("resolved with {}", resolution.strategy))
        .with_detail(resolution.resolved_data)
}

fn schedule_step(engine: &OfflineEngine, schedule: &ScheduleStep) -> StepResult {
    let task =
        engine.schedule_background_sync(&schedule.kind, Duration::from_millis(schedule.interval_ms));
    StepResult::ok("schedule", format!("{} next at {}", task.id, task.next_run.to_rfc3339()))
        .with_detail(json!(task))
}
