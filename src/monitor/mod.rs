// src/monitor/mod.rs - Lifecycle handling and the periodic threshold check
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::CooldownSettings;
use crate::events::{ChartAnnotation, CooldownTriggered, LifecycleEvent, PluginEvent};
use crate::gcode;
use crate::host::{Host, HostError};
use crate::progress::ProgressSnapshot;
use crate::timer::RecurringTimer;


/// How often an armed monitor re-evaluates the trigger condition.
pub const CHECK_PERIOD: Duration = Duration::from_secs(30);

/// Outcome of one periodic check, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Disabled in settings; nothing evaluated. The timer keeps running so a
    /// mid-print enable takes effect.
    Disabled,
    /// Host says no print is running; the end event will disarm us.
    NotPrinting,
    /// Progress fields missing, retry next tick.
    ProgressPending,
    /// Evaluated, thresholds not all met yet.
    BelowThreshold,
    /// Cooldown command sent.
    Triggered,
}

struct ArmedTimer {
    job: Uuid,
    timer: RecurringTimer,
}

struct Inner<H: Host> {
    host: Arc<H>,
    timer: Mutex<Option<ArmedTimer>>,
    check_period: Duration,
}

/// Watches one print at a time and sends a single bed-cooldown command once
/// the configured elapsed/left/completion thresholds are all met.
///
/// Per print job the monitor goes `Idle -> Armed -> Idle`: armed on
/// print-started, back to idle either through a host end event or through its
/// own trigger. Cloning shares the same monitor.
pub struct CooldownMonitor<H: Host> {
    inner: Arc<Inner<H>>,
}

impl<H: Host> Clone for CooldownMonitor<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: Host> CooldownMonitor<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self::with_check_period(host, CHECK_PERIOD)
    }

    /// Overrides the check period, for tests and accelerated simulation.
    pub fn with_check_period(host: Arc<H>, check_period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                timer: Mutex::new(None),
                check_period,
            }),
        }
    }

    pub async fn is_armed(&self) -> bool {
        self.inner.timer.lock().await.is_some()
    }

    /// Entry point for host lifecycle events. Everything but the four print
    /// events is ignored.
    pub async fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::PrintStarted(job) => self.arm(job.id, &job.file).await,
            LifecycleEvent::PrintDone
            | LifecycleEvent::PrintFailed
            | LifecycleEvent::PrintCancelled => self.disarm(event).await,
            LifecycleEvent::Other => {}
        }
    }

    /// Runs one check immediately, outside the timer. Mostly useful for
    /// diagnostics and tests; the armed timer calls the same path.
    pub async fn run_check(&self) -> Result<CheckOutcome, HostError> {
        self.inner.run_check().await
    }

    async fn arm(&self, job: Uuid, file: &str) {
        let settings = CooldownSettings::load(self.inner.host.as_ref()).await;
        tracing::info!(
            "bed cooldown to {}C configured for time elapsed >= {}s, time left <= {}s, completion >= {}%",
            settings.temperature,
            settings.time_elapsed,
            settings.time_left,
            settings.completion,
        );
        if !settings.enabled {
            tracing::info!("bed cooldown is currently disabled; settings are rechecked every tick");
        }

        let mut slot = self.inner.timer.lock().await;
        if let Some(stale) = slot.take() {
            tracing::warn!(
                "print started while a cooldown timer for job {} was still armed, replacing it",
                stale.job,
            );
            stale.timer.cancel();
        }

        tracing::debug!(
            "arming cooldown check every {:?} for job {job} ({file})",
            self.inner.check_period,
        );
        let inner = Arc::clone(&self.inner);
        let timer = RecurringTimer::spawn(self.inner.check_period, move || {
            let inner = Arc::clone(&inner);
            async move { inner.scheduled_check(job).await }
        });
        *slot = Some(ArmedTimer { job, timer });
    }

    async fn disarm(&self, event: &LifecycleEvent) {
        let mut slot = self.inner.timer.lock().await;
        match slot.take() {
            Some(armed) => {
                tracing::debug!(
                    "print ended via {event:?}, cancelling cooldown timer for job {}",
                    armed.job,
                );
                armed.timer.cancel();
            }
            None => tracing::debug!("print ended via {event:?}, no cooldown timer armed"),
        }
    }
}

impl<H: Host> Inner<H> {
    /// Timer-tick wrapper around `run_check`: a failed check is logged and
    /// retried next tick, never allowed to take the timer down; a trigger
    /// clears the timer slot and ends the loop.
    async fn scheduled_check(&self, job: Uuid) -> ControlFlow<()> {
        match self.run_check().await {
            Ok(CheckOutcome::Triggered) => {
                self.disarm_after_trigger(job).await;
                ControlFlow::Break(())
            }
            Ok(outcome) => {
                tracing::trace!("cooldown check outcome: {outcome:?}");
                ControlFlow::Continue(())
            }
            Err(err) => {
                tracing::error!("cooldown check failed, retrying next tick: {err}");
                ControlFlow::Continue(())
            }
        }
    }

    /// Clears the timer slot, but only while it still belongs to this job; a
    /// fresh print may have re-armed while the trigger path was running.
    async fn disarm_after_trigger(&self, job: Uuid) {
        let mut slot = self.timer.lock().await;
        match slot.take() {
            Some(armed) if armed.job == job => armed.timer.cancel(),
            other => *slot = other,
        }
    }

    async fn run_check(&self) -> Result<CheckOutcome, HostError> {
        let settings = CooldownSettings::load(self.host.as_ref()).await;
        if !settings.enabled {
            tracing::debug!("bed cooldown disabled, skipping check");
            return Ok(CheckOutcome::Disabled);
        }

        if !self.host.is_printing().await {
            tracing::warn!("cooldown check ran while the host reports no active print");
            return Ok(CheckOutcome::NotPrinting);
        }

        let raw = self.host.current_progress().await;
        let Some(snapshot) = ProgressSnapshot::from_raw(raw) else {
            tracing::debug!("progress not fully reported yet, retrying next tick");
            return Ok(CheckOutcome::ProgressPending);
        };

        let completion = snapshot.completion_for(&settings);
        tracing::debug!(
            "time: {:.0}s elapsed, {:.0}s left (via {}); completion: {:.2}% time, {:.2}% gcode (using {}); thresholds: >= {}s elapsed, <= {}s left, >= {}%",
            snapshot.time_elapsed.as_secs_f64(),
            snapshot.time_left.as_secs_f64(),
            snapshot.time_left_origin.as_deref().unwrap_or("unknown"),
            snapshot.completion_time() * 100.0,
            snapshot.completion_gcode * 100.0,
            if settings.completion_use_gcode { "gcode" } else { "time" },
            settings.time_elapsed,
            settings.time_left,
            settings.completion,
        );

        if !should_trigger(&settings, &snapshot) {
            return Ok(CheckOutcome::BelowThreshold);
        }

        tracing::info!(
            "bed cooldown triggered (>= {}s elapsed, <= {}s left, >= {}%), setting bed to {}C",
            settings.time_elapsed,
            settings.time_left,
            settings.completion,
            settings.temperature,
        );
        self.host
            .send_command(&gcode::set_bed_temperature(settings.temperature))
            .await?;
        self.publish_trigger_events(settings, &snapshot, completion)
            .await;
        Ok(CheckOutcome::Triggered)
    }

    /// Publication failures are logged only: the command is already out, so a
    /// flaky event bus must not cause a retry and a second command.
    async fn publish_trigger_events(
        &self,
        settings: CooldownSettings,
        snapshot: &ProgressSnapshot,
        completion: f64,
    ) {
        let event = PluginEvent::CooldownTriggered(CooldownTriggered {
            completion,
            time_elapsed_secs: snapshot.time_elapsed.as_secs(),
            time_left_secs: snapshot.time_left.as_secs(),
            triggered_at: Utc::now(),
            settings,
        });
        if let Err(err) = self.host.publish(event).await {
            tracing::warn!("failed to publish cooldown-triggered event: {err}");
        }

        if self.host.capabilities().chart_annotations {
            let annotation = PluginEvent::ChartAnnotation(ChartAnnotation::cooldown());
            if let Err(err) = self.host.publish(annotation).await {
                tracing::warn!("failed to publish chart annotation: {err}");
            }
        }
    }
}

/// All three threshold comparisons must hold at once.
fn should_trigger(settings: &CooldownSettings, snapshot: &ProgressSnapshot) -> bool {
    snapshot.time_elapsed >= settings.time_elapsed_threshold()
        && snapshot.time_left <= settings.time_left_threshold()
        && snapshot.completion_for(settings) >= settings.completion_threshold()
}
