// End-to-end runs of the cooldown monitor against the simulated host.

use std::sync::Arc;
use std::time::Duration;

use bedcooldown::config::CooldownSettings;
use bedcooldown::events::PluginEvent;
use bedcooldown::monitor::CooldownMonitor;
use bedcooldown::simulator::SimulatedHost;

/// Wires a monitor to a simulated host the way the harness does: lifecycle
/// events forwarded from the host bus, checks every 30 (paused) seconds.
fn wire(settings: CooldownSettings) -> (Arc<SimulatedHost>, CooldownMonitor<SimulatedHost>) {
    let host = Arc::new(SimulatedHost::new(settings).without_jitter());
    let monitor = CooldownMonitor::with_check_period(Arc::clone(&host), Duration::from_secs(30));

    let mut lifecycle_rx = host.subscribe();
    let bus_monitor = monitor.clone();
    tokio::spawn(async move {
        while let Ok(event) = lifecycle_rx.recv().await {
            bus_monitor.on_event(&event).await;
        }
    });

    (host, monitor)
}

async fn run_to_completion(host: &SimulatedHost) {
    let step = Duration::from_secs(30);
    while !host.is_done().await {
        host.advance(step).await;
        tokio::time::sleep(step).await;
    }
    host.finish().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn simulated_print_triggers_exactly_once() {
    let (host, monitor) = wire(CooldownSettings::default());

    host.start_print("calibration-cube.gcode", Duration::from_secs(3600))
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(monitor.is_armed().await);

    run_to_completion(&host).await;

    assert_eq!(host.commands().await, vec!["M140 S0".to_string()]);
    assert!(!monitor.is_armed().await);

    let published = host.published().await;
    assert!(
        published
            .iter()
            .any(|e| matches!(e, PluginEvent::CooldownTriggered(_)))
    );
    // The simulated host negotiates chart annotations.
    assert!(
        published
            .iter()
            .any(|e| matches!(e, PluginEvent::ChartAnnotation(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn disabled_monitor_never_sends_commands() {
    let settings = CooldownSettings {
        enabled: false,
        ..CooldownSettings::default()
    };
    let (host, monitor) = wire(settings);

    host.start_print("calibration-cube.gcode", Duration::from_secs(1200))
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    run_to_completion(&host).await;

    assert!(host.commands().await.is_empty());
    assert!(host.published().await.is_empty());
    assert!(!monitor.is_armed().await);
}

#[tokio::test(start_paused = true)]
async fn cancelled_print_disarms_before_any_trigger() {
    let (host, monitor) = wire(CooldownSettings::default());

    host.start_print("calibration-cube.gcode", Duration::from_secs(3600))
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(monitor.is_armed().await);

    // A few uneventful early checks, then the user cancels.
    for _ in 0..4 {
        host.advance(Duration::from_secs(30)).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    host.cancel().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!monitor.is_armed().await);
    assert!(host.commands().await.is_empty());

    // Nothing fires afterwards either.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(host.commands().await.is_empty());
}
