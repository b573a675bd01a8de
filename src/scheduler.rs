use crate::prelude::*;

use crate::coordinator::commands::read_measurement::ReadMeasurement;
use crate::ltc2946::registers::Attribute;

/// Periodic poll of the instantaneous inputs, on a cron schedule from
/// the config (default: every minute).
#[derive(Clone)]
pub struct Scheduler {
    config: ConfigWrapper,
    channels: Channels,
}

impl Scheduler {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let scheduler_config = match self.config.scheduler() {
            Some(s) if s.enabled() => s,
            _ => {
                info!("scheduler disabled, skipping");
                return Ok(());
            }
        };

        let cron = scheduler_config.poll_cron();

        loop {
            let now = chrono::Local::now();
            let next = cron_parser::parse(&cron, &now)
                .map_err(|err| anyhow!("scheduler.rs:bad poll_cron {}: {}", cron, err))?;
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            for monitor in self.config.enabled_monitors() {
                for attribute in Attribute::inputs() {
                    let read = ReadMeasurement::new(
                        self.channels.clone(),
                        monitor.clone(),
                        attribute,
                    );
                    if let Err(e) = read.run().await {
                        warn!(
                            "scheduled poll of {}/{} failed: {}",
                            monitor.label(),
                            attribute.name,
                            e
                        );
                    }
                }
            }
        }
    }
}
