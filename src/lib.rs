// Module declarations for the application's core components
pub mod channels;    // Inter-component communication channels
pub mod command;     // Command processing and handling
pub mod config;      // Configuration management
pub mod coordinator; // Main application coordinator
pub mod ltc2946;     // LTC2946 chip support and bus access
pub mod mqtt;        // MQTT client and messaging
pub mod options;     // Command line options parsing
pub mod prelude;     // Common imports and types
pub mod scheduler;   // Periodic measurement polling

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::coordinator::Coordinator;
use crate::ltc2946::monitor::Monitor;
use crate::mqtt::Mqtt;
use crate::scheduler::Scheduler;
use std::error::Error;
use std::sync::Arc;

/// Holds the major components so shutdown happens in a controlled
/// order: coordinator first (stops command processing and releases the
/// monitor tasks), then the MQTT client.
#[derive(Clone)]
pub struct Components {
    pub coordinator: Arc<Coordinator>,
    pub scheduler: Arc<Scheduler>,
    pub mqtt: Option<Arc<Mqtt>>,
    pub channels: Channels,
}

impl Components {
    pub async fn stop(&mut self) {
        info!("Stopping all components...");

        self.coordinator.stop();

        if let Some(mqtt) = &self.mqtt {
            let _ = mqtt.stop().await;
        }

        info!("Shutdown complete");
    }
}

/// Main application entry point: initializes and starts all components
/// in dependency order, then waits for the shutdown signal.
pub async fn app(
    mut shutdown_rx: broadcast::Receiver<()>,
    config: Arc<ConfigWrapper>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.loglevel()),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "[{} {} {}] {}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            record.level(),
            record.module_path().unwrap_or(""),
            record.args()
        )
    })
    .write_style(env_logger::WriteStyle::Never)
    .init();

    info!("ltc2946-bridge {} starting", CARGO_PKG_VERSION);

    info!("Initializing channels...");
    let channels = Channels::new();

    info!("Initializing components...");

    info!("  Creating Coordinator...");
    let coordinator = Coordinator::new((*config).clone(), channels.clone());
    let coordinator_clone = coordinator.clone();
    let coordinator_handle = tokio::spawn(async move {
        if let Err(e) = coordinator_clone.start().await {
            error!("Coordinator task failed: {}", e);
        }
    });

    info!("  Creating Scheduler...");
    let scheduler = Scheduler::new((*config).clone(), channels.clone());
    let scheduler_clone = scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler_clone.start().await {
            error!("Scheduler task failed: {}", e);
        }
    });

    info!("  Creating MQTT client...");
    let mqtt = Mqtt::new(
        (*config).clone(),
        channels.clone(),
        coordinator.shared_stats.clone(),
    );
    let mqtt_clone = mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt_clone.start().await {
            error!("MQTT task failed: {}", e);
        }
    });

    info!("  Creating Monitor instances...");
    let mut monitor_handles = Vec::new();
    for monitor in config
        .monitors()
        .iter()
        .filter(|monitor| monitor.enabled())
        .map(|monitor| Monitor::new((*config).clone(), monitor, channels.clone()))
    {
        let monitor_clone = monitor.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = monitor_clone.start().await {
                error!("Monitor task failed: {}", e);
            }
        });
        monitor_handles.push(handle);
    }
    info!("Monitors started");

    // Wait for shutdown signal
    info!("Waiting for shutdown signal...");
    let _ = shutdown_rx.recv().await;

    info!("Shutdown signal received, stopping components...");
    let mut components = Components {
        coordinator: Arc::new(coordinator),
        scheduler: Arc::new(scheduler),
        mqtt: Some(Arc::new(mqtt)),
        channels: channels.clone(),
    };
    components.stop().await;

    // Then wait for the task handles to complete
    if let Err(e) = coordinator_handle.await {
        error!("Error waiting for coordinator task: {}", e);
    }
    scheduler_handle.abort();
    for handle in monitor_handles {
        if let Err(e) = handle.await {
            error!("Error waiting for monitor task: {}", e);
        }
    }
    mqtt_handle.abort();

    info!("Application shutdown complete");
    Ok(())
}

/// Library entry point used by the binary: wires up signal handling and
/// runs the application until it exits.
pub async fn run(config: Config) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let config = Arc::new(ConfigWrapper::from_config(config));

    // Set up signal handlers for graceful shutdown
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    app(shutdown_rx, config).await.map_err(|e| anyhow!("{}", e))?;

    Ok(())
}
