//! Auto-mode scheduling loop
//!
//! Draws a sample and classifies it once per interval until stopped. A failed
//! tick is logged, counted and broadcast; the loop keeps running.

use super::orchestrator::PredictionOrchestrator;
use crate::analytics::ActivityLevel;
use crate::error::{PredictionError, SchedulerError};
use crate::health::{components, HealthRegistry};
use crate::models::PredictionRecord;
use crate::observability::{DetectorMetrics, StructuredLogger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default interval between auto-mode predictions
pub const DEFAULT_AUTO_INTERVAL: Duration = Duration::from_secs(2);

const OUTCOME_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoModeState {
    Idle,
    Running,
}

/// Snapshot of the scheduler, counters cover the current or most recent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoModeStatus {
    pub state: AutoModeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub ticks: u64,
    pub failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl AutoModeStatus {
    pub fn is_running(&self) -> bool {
        self.state == AutoModeState::Running
    }
}

/// Result of one tick, broadcast to subscribers
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Recorded {
        tick: u64,
        record: PredictionRecord,
    },
    Failed {
        tick: u64,
        kind: &'static str,
        error: String,
    },
}

#[derive(Debug, Default)]
struct TickCounters {
    ticks: AtomicU64,
    failures: AtomicU64,
    last_error: std::sync::Mutex<Option<String>>,
}

impl TickCounters {
    fn reset(&self) {
        self.ticks.store(0, Ordering::SeqCst);
        self.failures.store(0, Ordering::SeqCst);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_last_error(&self, error: String) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

struct RunningTask {
    model_id: String,
    interval: Duration,
    started_at: DateTime<Utc>,
    stop: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Idle/Running state machine around the tick loop
pub struct AutoModeScheduler {
    orchestrator: Arc<PredictionOrchestrator>,
    running: Mutex<Option<RunningTask>>,
    counters: Arc<TickCounters>,
    outcomes: broadcast::Sender<TickOutcome>,
    health: Option<HealthRegistry>,
    metrics: DetectorMetrics,
    logger: StructuredLogger,
}

impl AutoModeScheduler {
    pub fn new(orchestrator: Arc<PredictionOrchestrator>) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            orchestrator,
            running: Mutex::new(None),
            counters: Arc::new(TickCounters::default()),
            outcomes,
            health: None,
            metrics: DetectorMetrics::new(),
            logger: StructuredLogger::new("auto-mode"),
        }
    }

    /// Report tick failures on the scheduler health component
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Stream of tick outcomes; slow receivers may observe lag
    pub fn subscribe(&self) -> broadcast::Receiver<TickOutcome> {
        self.outcomes.subscribe()
    }

    /// Transition Idle to Running
    pub async fn start(
        &self,
        interval: Duration,
        model_id: &str,
    ) -> Result<AutoModeStatus, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }

        let mut running = self.running.lock().await;
        if let Some(task) = running.as_ref() {
            if !task.handle.is_finished() {
                return Err(SchedulerError::AlreadyRunning {
                    model_id: task.model_id.clone(),
                    interval: task.interval,
                });
            }
        }

        // Ids that can never resolve fail now. Models still loading surface per tick.
        match self.orchestrator.registry().resolve(model_id) {
            Ok(_) | Err(PredictionError::ModelsNotLoaded) => {}
            Err(e) => return Err(e.into()),
        }

        self.counters.reset();
        let stop = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tick_loop = TickLoop {
            orchestrator: self.orchestrator.clone(),
            model_id: model_id.to_string(),
            interval,
            stop: stop.clone(),
            counters: self.counters.clone(),
            outcomes: self.outcomes.clone(),
            health: self.health.clone(),
            metrics: self.metrics.clone(),
            logger: self.logger.clone(),
            degraded: false,
        };
        let handle = tokio::spawn(tick_loop.run(shutdown_rx));

        *running = Some(RunningTask {
            model_id: model_id.to_string(),
            interval,
            started_at: Utc::now(),
            stop,
            shutdown_tx,
            handle,
        });

        self.metrics.set_auto_mode_running(true);
        self.logger.log_auto_started(model_id, interval);
        self.orchestrator.activity().push(
            ActivityLevel::Info,
            format!(
                "Auto mode started with {} every {:.1}s",
                model_id,
                interval.as_secs_f64()
            ),
        );
        if let Some(health) = &self.health {
            health.set_healthy(components::SCHEDULER).await;
        }

        Ok(self.snapshot(&running))
    }

    /// Transition to Idle. No tick begins after this returns.
    pub async fn stop(&self) -> AutoModeStatus {
        let mut running = self.running.lock().await;
        if let Some(task) = running.take() {
            task.stop.store(true, Ordering::SeqCst);
            let _ = task.shutdown_tx.send(true);
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Auto mode task ended abnormally");
            }

            self.metrics.set_auto_mode_running(false);
            self.logger.log_auto_stopped(
                self.counters.ticks.load(Ordering::SeqCst),
                self.counters.failures.load(Ordering::SeqCst),
            );
            self.orchestrator
                .activity()
                .push(ActivityLevel::Info, "Auto mode stopped");
            if let Some(health) = &self.health {
                health.set_healthy(components::SCHEDULER).await;
            }
        }
        self.snapshot(&running)
    }

    pub async fn status(&self) -> AutoModeStatus {
        let running = self.running.lock().await;
        self.snapshot(&running)
    }

    pub async fn is_running(&self) -> bool {
        self.status().await.is_running()
    }

    fn snapshot(&self, running: &Option<RunningTask>) -> AutoModeStatus {
        let active = running.as_ref().filter(|t| !t.handle.is_finished());
        AutoModeStatus {
            state: if active.is_some() {
                AutoModeState::Running
            } else {
                AutoModeState::Idle
            },
            model_id: active.map(|t| t.model_id.clone()),
            interval_ms: active.map(|t| t.interval.as_millis() as u64),
            started_at: active.map(|t| t.started_at),
            ticks: self.counters.ticks.load(Ordering::SeqCst),
            failures: self.counters.failures.load(Ordering::SeqCst),
            last_error: self.counters.last_error(),
        }
    }
}

struct TickLoop {
    orchestrator: Arc<PredictionOrchestrator>,
    model_id: String,
    interval: Duration,
    stop: Arc<AtomicBool>,
    counters: Arc<TickCounters>,
    outcomes: broadcast::Sender<TickOutcome>,
    health: Option<HealthRegistry>,
    metrics: DetectorMetrics,
    logger: StructuredLogger,
    degraded: bool,
}

impl TickLoop {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!(model = %self.model_id, interval_ms = self.interval.as_millis() as u64, "Auto mode loop running");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if self.stop.load(Ordering::SeqCst) {
                        break;
                    }
                    self.tick().await;
                }
            }
        }

        debug!(model = %self.model_id, "Auto mode loop exited");
    }

    async fn tick(&mut self) {
        let tick = self.counters.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.inc_auto_ticks();

        let outcome = match self.orchestrator.predict_sample(&self.model_id).await {
            Ok(record) => {
                if self.degraded {
                    self.degraded = false;
                    if let Some(health) = &self.health {
                        health.set_healthy(components::SCHEDULER).await;
                    }
                }
                TickOutcome::Recorded { tick, record }
            }
            Err(e) => {
                let error = e.to_string();
                self.counters.failures.fetch_add(1, Ordering::SeqCst);
                self.counters.set_last_error(error.clone());
                self.metrics.inc_auto_tick_failures();
                self.logger
                    .log_tick_failure(tick, &self.model_id, e.kind(), &error);
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::SCHEDULER, format!("Tick {} failed: {}", tick, error))
                        .await;
                }
                self.degraded = true;
                TickOutcome::Failed {
                    tick,
                    kind: e.kind(),
                    error,
                }
            }
        };

        // No subscribers is fine
        let _ = self.outcomes.send(outcome);
    }
}
