// src/main.rs - Simulation harness for the bed cooldown monitor
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use bedcooldown::config::{self, CooldownSettings};
use bedcooldown::monitor::{CHECK_PERIOD, CooldownMonitor};
use bedcooldown::simulator::SimulatedHost;

#[derive(Debug, Parser)]
#[command(
    name = "cooldown-sim",
    about = "Run the bed cooldown monitor against a simulated print"
)]
struct Args {
    /// Cooldown settings TOML file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Full-speed length of the simulated print, seconds.
    #[arg(long, default_value_t = 1800)]
    print_secs: u64,

    /// How many simulated seconds pass per wall-clock second.
    #[arg(long, default_value_t = 60.0)]
    speedup: f64,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    if !(args.speedup > 0.0 && args.speedup.is_finite()) {
        return Err("--speedup must be a positive number".into());
    }

    let settings = match &args.config {
        Some(path) => config::load_settings_file(path).map_err(|e| {
            tracing::error!("failed to load settings from '{}': {e}", path.display());
            e
        })?,
        None => CooldownSettings::default(),
    };

    tracing::info!(
        "simulating a {}s print at {}x speed",
        args.print_secs,
        args.speedup,
    );

    let host = Arc::new(SimulatedHost::new(settings));
    let mut lifecycle_rx = host.subscribe();

    // The check period shrinks with the speedup so the monitor still checks
    // every 30 simulated seconds.
    let period = Duration::from_secs_f64(CHECK_PERIOD.as_secs_f64() / args.speedup);
    let monitor = CooldownMonitor::with_check_period(Arc::clone(&host), period);

    // Deliver lifecycle events to the monitor the way a host plugin bus would.
    let bus_monitor = monitor.clone();
    let forwarder = tokio::spawn(async move {
        while let Ok(event) = lifecycle_rx.recv().await {
            bus_monitor.on_event(&event).await;
        }
    });

    host.start_print("benchy.gcode", Duration::from_secs(args.print_secs))
        .await;

    // Step the simulated clock one second at a time until the print runs out.
    let step = Duration::from_secs(1);
    let wall_step = Duration::from_secs_f64(1.0 / args.speedup);
    while !host.is_done().await {
        tokio::time::sleep(wall_step).await;
        host.advance(step).await;
    }
    host.finish().await;

    // Let the end event drain through the forwarder before reporting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    forwarder.abort();

    let commands = host.commands().await;
    let events = host.published().await;
    tracing::info!(
        "simulation complete: {} command(s) sent, {} event(s) published",
        commands.len(),
        events.len(),
    );
    for command in &commands {
        tracing::info!("  {command}");
    }
    if commands.is_empty() {
        tracing::warn!("cooldown never triggered; check the thresholds against the print length");
    }

    Ok(())
}
