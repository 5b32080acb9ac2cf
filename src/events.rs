// src/events.rs - Lifecycle events in, plugin events out
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::CooldownSettings;

/// Identity of the job a lifecycle event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJobInfo {
    pub id: Uuid,
    pub file: String,
}

impl PrintJobInfo {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file: file.into(),
        }
    }
}

/// Print lifecycle events delivered by the host. Anything the monitor does
/// not care about arrives as `Other` and is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    PrintStarted(PrintJobInfo),
    PrintDone,
    PrintFailed,
    PrintCancelled,
    Other,
}

/// Events the monitor publishes back onto the host bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum PluginEvent {
    CooldownTriggered(CooldownTriggered),
    ChartAnnotation(ChartAnnotation),
}

/// Settings and measured values at the moment the cooldown fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CooldownTriggered {
    pub settings: CooldownSettings,
    /// The completion metric that was compared, as a fraction.
    pub completion: f64,
    pub time_elapsed_secs: u64,
    pub time_left_secs: u64,
    pub triggered_at: DateTime<Utc>,
}

/// Marker the host can render on its progress graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartAnnotation {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
}

impl ChartAnnotation {
    pub fn cooldown() -> Self {
        Self {
            kind: "bedcooldown_cooldown".to_string(),
            label: "Cooldown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_annotation_payload_shape() {
        let event = PluginEvent::ChartAnnotation(ChartAnnotation::cooldown());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chart_annotation");
        assert_eq!(json["payload"]["type"], "bedcooldown_cooldown");
        assert_eq!(json["payload"]["label"], "Cooldown");
    }

    #[test]
    fn triggered_payload_carries_settings_and_measurements() {
        let event = PluginEvent::CooldownTriggered(CooldownTriggered {
            settings: CooldownSettings::default(),
            completion: 0.95,
            time_elapsed_secs: 600,
            time_left_secs: 200,
            triggered_at: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "cooldown_triggered");
        assert_eq!(json["payload"]["settings"]["time_left"], 300);
        assert_eq!(json["payload"]["time_elapsed_secs"], 600);
        assert_eq!(json["payload"]["completion"], 0.95);
    }

    #[test]
    fn job_ids_are_unique() {
        let a = PrintJobInfo::new("a.gcode");
        let b = PrintJobInfo::new("a.gcode");
        assert_ne!(a.id, b.id);
    }
}
