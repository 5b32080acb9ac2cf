// src/simulator/mod.rs - In-process fake host for the harness and tests
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{Mutex, broadcast};

use crate::config::{CooldownSettings, keys};
use crate::events::{LifecycleEvent, PluginEvent, PrintJobInfo};
use crate::host::{
    CommandChannel, EventSink, Host, HostCapabilities, HostError, PrinterState, SettingsStore,
};
use crate::progress::RawProgress;

/// Fraction the remaining-time estimate wobbles by, like a real host
/// re-estimating as layers finish.
const ESTIMATE_JITTER: f64 = 0.02;

struct SimPrint {
    job: PrintJobInfo,
    elapsed: Duration,
    total: Duration,
}

/// A scripted printer host: one print at a time, its clock advanced
/// explicitly by the driver. Commands and published events are recorded for
/// inspection.
pub struct SimulatedHost {
    settings: CooldownSettings,
    capabilities: HostCapabilities,
    jitter: bool,
    print: Mutex<Option<SimPrint>>,
    commands: Mutex<Vec<String>>,
    published: Mutex<Vec<PluginEvent>>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
}

impl SimulatedHost {
    pub fn new(settings: CooldownSettings) -> Self {
        let (lifecycle_tx, _) = broadcast::channel(16);
        Self {
            settings,
            capabilities: HostCapabilities {
                chart_annotations: true,
            },
            jitter: true,
            print: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            lifecycle_tx,
        }
    }

    /// Deterministic variant for tests: the remaining-time estimate is exact.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Lifecycle bus receiver; the driver forwards these to the monitor.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_tx.subscribe()
    }

    /// Begins a simulated print and announces it on the lifecycle bus.
    pub async fn start_print(&self, file: &str, total: Duration) -> PrintJobInfo {
        let job = PrintJobInfo::new(file);
        tracing::info!(
            "simulated print '{}' started, {}s long",
            job.file,
            total.as_secs(),
        );
        *self.print.lock().await = Some(SimPrint {
            job: job.clone(),
            elapsed: Duration::ZERO,
            total,
        });
        let _ = self
            .lifecycle_tx
            .send(LifecycleEvent::PrintStarted(job.clone()));
        job
    }

    /// Advances the scripted print clock.
    pub async fn advance(&self, by: Duration) {
        let mut print = self.print.lock().await;
        if let Some(print) = print.as_mut() {
            print.elapsed = (print.elapsed + by).min(print.total);
        }
    }

    pub async fn is_done(&self) -> bool {
        let print = self.print.lock().await;
        print.as_ref().is_some_and(|p| p.elapsed >= p.total)
    }

    /// Ends the print successfully and announces it.
    pub async fn finish(&self) {
        self.end(LifecycleEvent::PrintDone).await;
    }

    pub async fn cancel(&self) {
        self.end(LifecycleEvent::PrintCancelled).await;
    }

    pub async fn fail(&self) {
        self.end(LifecycleEvent::PrintFailed).await;
    }

    async fn end(&self, event: LifecycleEvent) {
        if let Some(print) = self.print.lock().await.take() {
            tracing::info!("simulated print '{}' ended via {event:?}", print.job.file);
            let _ = self.lifecycle_tx.send(event);
        }
    }

    /// Commands the monitor sent so far.
    pub async fn commands(&self) -> Vec<String> {
        self.commands.lock().await.clone()
    }

    /// Plugin events the monitor published so far.
    pub async fn published(&self) -> Vec<PluginEvent> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl SettingsStore for SimulatedHost {
    async fn get_bool(&self, key: &str) -> Option<bool> {
        match key {
            keys::ENABLED => Some(self.settings.enabled),
            keys::COMPLETION_USE_GCODE => Some(self.settings.completion_use_gcode),
            _ => None,
        }
    }

    async fn get_int(&self, key: &str) -> Option<i64> {
        match key {
            keys::TIME_ELAPSED => Some(self.settings.time_elapsed as i64),
            keys::TIME_LEFT => Some(self.settings.time_left as i64),
            keys::COMPLETION => Some(i64::from(self.settings.completion)),
            keys::TEMPERATURE => Some(i64::from(self.settings.temperature)),
            _ => None,
        }
    }
}

#[async_trait]
impl PrinterState for SimulatedHost {
    async fn is_printing(&self) -> bool {
        let print = self.print.lock().await;
        print.as_ref().is_some_and(|p| p.elapsed < p.total)
    }

    async fn current_progress(&self) -> RawProgress {
        let print = self.print.lock().await;
        let Some(print) = print.as_ref() else {
            return RawProgress::default();
        };

        let elapsed = print.elapsed.as_secs_f64();
        let mut left = (print.total - print.elapsed).as_secs_f64();
        if self.jitter && left > 0.0 {
            let wobble = rand::rng().random_range(-ESTIMATE_JITTER..=ESTIMATE_JITTER);
            left = (left * (1.0 + wobble)).max(0.0);
        }
        let completion = if print.total.is_zero() {
            100.0
        } else {
            elapsed / print.total.as_secs_f64() * 100.0
        };

        RawProgress {
            print_time: Some(elapsed),
            print_time_left: Some(left),
            print_time_left_origin: Some("simulation".to_string()),
            completion: Some(completion),
        }
    }
}

#[async_trait]
impl CommandChannel for SimulatedHost {
    async fn send_command(&self, command: &str) -> Result<(), HostError> {
        tracing::info!("printer <- {command}");
        self.commands.lock().await.push(command.to_string());
        Ok(())
    }
}

#[async_trait]
impl EventSink for SimulatedHost {
    async fn publish(&self, event: PluginEvent) -> Result<(), HostError> {
        let json = serde_json::to_string(&event).map_err(|e| HostError::EventBus(e.to_string()))?;
        tracing::info!("event bus <- {json}");
        self.published.lock().await.push(event);
        Ok(())
    }
}

impl Host for SimulatedHost {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }
}
