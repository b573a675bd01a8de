use crate::prelude::*;

use crate::coordinator::commands::read_measurement::ReadMeasurement;
use crate::ltc2946::registers::ATTRIBUTES;

/// Read every attribute and publish one combined JSON snapshot, on top
/// of the per-attribute messages each read already produces.
pub struct ReadAll {
    channels: Channels,
    monitor: config::Monitor,
}

impl ReadAll {
    pub fn new(channels: Channels, monitor: config::Monitor) -> Self {
        Self { channels, monitor }
    }

    pub async fn run(&self) -> Result<()> {
        let mut snapshot = serde_json::Map::new();

        for attribute in &ATTRIBUTES {
            let value =
                ReadMeasurement::new(self.channels.clone(), self.monitor.clone(), attribute)
                    .run()
                    .await?;
            snapshot.insert(attribute.name.to_string(), serde_json::Value::from(value));
        }

        let message = mqtt::Message {
            topic: format!("{}/attributes", self.monitor.label()),
            retain: false,
            payload: serde_json::to_string(&snapshot)?,
        };
        if self
            .channels
            .to_mqtt
            .send(mqtt::ChannelData::Message(message))
            .is_err()
        {
            bail!("send(to_mqtt) failed - channel closed?");
        }

        Ok(())
    }
}
