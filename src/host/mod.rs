// src/host/mod.rs - What the monitor needs from its host application
use async_trait::async_trait;
use thiserror::Error;

use crate::events::PluginEvent;
use crate::progress::RawProgress;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("command channel error: {0}")]
    CommandChannel(String),
    #[error("event bus error: {0}")]
    EventBus(String),
}

/// What the host declared it can do when the plugin was wired up. Optional
/// surfaces are negotiated once here instead of probed at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Host renders chart annotations on its progress graph.
    pub chart_annotations: bool,
}

/// Key/value settings store exposed by the host. Absent keys fall back to the
/// defaults declared in [`crate::config::CooldownSettings`].
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_bool(&self, key: &str) -> Option<bool>;
    async fn get_int(&self, key: &str) -> Option<i64>;
}

/// Live printer state queries.
#[async_trait]
pub trait PrinterState: Send + Sync {
    async fn is_printing(&self) -> bool;
    async fn current_progress(&self) -> RawProgress;
}

/// Fire-and-forget command channel to the printer firmware. No
/// acknowledgement is modeled; a send either reaches the queue or errors.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn send_command(&self, command: &str) -> Result<(), HostError>;
}

/// Outbound side of the host event bus.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: PluginEvent) -> Result<(), HostError>;
}

/// The full host contract the monitor runs against.
pub trait Host: SettingsStore + PrinterState + CommandChannel + EventSink + 'static {
    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::default()
    }
}
