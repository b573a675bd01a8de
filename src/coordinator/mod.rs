use crate::prelude::*;

pub mod commands;

use std::sync::{Arc, Mutex};

use crate::ltc2946::convert;
use crate::ltc2946::monitor::{Op, Status, Transaction};
use crate::ltc2946::registers::{Attribute, ATTRIBUTES};

#[derive(Default)]
pub struct BridgeStats {
    pub transactions_sent: u64,
    pub transactions_received: u64,
    pub bus_errors: u64,
    pub commands_processed: u64,
    pub commands_failed: u64,
    pub mqtt_messages_sent: u64,
    pub mqtt_errors: u64,
    pub monitor_disconnections: std::collections::HashMap<String, u64>,
}

impl BridgeStats {
    pub fn print_summary(&self) {
        info!("Bridge Statistics:");
        info!("  Transactions sent: {}", self.transactions_sent);
        info!("  Transactions received: {}", self.transactions_received);
        info!("  Bus errors: {}", self.bus_errors);
        info!("  Commands:");
        info!("    Processed: {}", self.commands_processed);
        info!("    Failed: {}", self.commands_failed);
        info!("  MQTT:");
        info!("    Messages sent: {}", self.mqtt_messages_sent);
        info!("    Errors: {}", self.mqtt_errors);
        info!("  Monitor disconnections by label:");
        for (label, count) in &self.monitor_disconnections {
            info!("    {}: {}", label, count);
        }
    }
}

#[derive(Clone)]
pub struct Coordinator {
    config: ConfigWrapper,
    channels: Channels,
    pub shared_stats: Arc<Mutex<BridgeStats>>,
}

impl Coordinator {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Self {
        Self {
            config,
            channels,
            shared_stats: Arc::new(Mutex::new(BridgeStats::default())),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if self.config.mqtt().enabled() {
            futures::try_join!(self.monitor_receiver(), self.mqtt_receiver())?;
        } else {
            self.monitor_receiver().await?;
        }

        Ok(())
    }

    pub fn stop(&self) {
        use crate::ltc2946::monitor;

        let _ = self.channels.from_monitor.send(monitor::ChannelData::Shutdown);
        let _ = self.channels.to_monitor.send(monitor::ChannelData::Shutdown);

        if self.config.mqtt().enabled() {
            let _ = self.channels.from_mqtt.send(mqtt::ChannelData::Shutdown);
        }
    }

    async fn mqtt_receiver(&self) -> Result<()> {
        let mut receiver = self.channels.from_mqtt.subscribe();

        while let mqtt::ChannelData::Message(message) = receiver.recv().await? {
            let _ = self.process_message(message).await;
        }

        Ok(())
    }

    async fn process_message(&self, message: mqtt::Message) -> Result<()> {
        for monitor in self.config.monitors_for_message(&message)? {
            match message.to_command(monitor) {
                Ok(command) => {
                    info!("parsed command {:?}", command);
                    let topic_reply = command.to_result_topic();
                    let payload = match self.process_command(command).await {
                        Ok(()) => "OK",
                        Err(err) => {
                            error!("{:?}", err);
                            if let Ok(mut stats) = self.shared_stats.lock() {
                                stats.commands_failed += 1;
                            }
                            "FAIL"
                        }
                    };
                    self.publish_message(topic_reply, payload.to_string(), false)?;
                }
                Err(err) => {
                    // bad attribute name or unparseable payload: nothing
                    // was written, tell the requester
                    error!("{:?}", err);
                    self.publish_message(message.result_topic(), "FAIL".to_string(), false)?;
                }
            }
        }

        Ok(())
    }

    async fn process_command(&self, command: Command) -> Result<()> {
        if let Ok(mut stats) = self.shared_stats.lock() {
            stats.commands_processed += 1;
        }

        match command {
            Command::ReadAttribute(monitor, attribute) => {
                self.read_attribute(monitor, attribute).await
            }
            Command::SetAttribute(monitor, attribute, value) => {
                if self.config.read_only() {
                    bail!("bridge is in read-only mode");
                }
                self.set_attribute(monitor, attribute, value).await
            }
            Command::ReadAll(monitor) => self.read_all(monitor).await,
        }
    }

    async fn read_attribute(
        &self,
        monitor: config::Monitor,
        attribute: &'static Attribute,
    ) -> Result<()> {
        if let Ok(mut stats) = self.shared_stats.lock() {
            stats.transactions_sent += 1;
        }

        commands::read_measurement::ReadMeasurement::new(
            self.channels.clone(),
            monitor,
            attribute,
        )
        .run()
        .await?;

        Ok(())
    }

    async fn set_attribute(
        &self,
        monitor: config::Monitor,
        attribute: &'static Attribute,
        value: i64,
    ) -> Result<()> {
        if let Ok(mut stats) = self.shared_stats.lock() {
            stats.transactions_sent += 2; // write plus readback
        }

        commands::set_threshold::SetThreshold::new(
            self.channels.clone(),
            monitor,
            attribute,
            value,
        )
        .run()
        .await?;

        Ok(())
    }

    async fn read_all(&self, monitor: config::Monitor) -> Result<()> {
        if let Ok(mut stats) = self.shared_stats.lock() {
            stats.transactions_sent += ATTRIBUTES.len() as u64;
        }

        commands::read_all::ReadAll::new(self.channels.clone(), monitor)
            .run()
            .await?;

        Ok(())
    }

    async fn monitor_receiver(&self) -> Result<()> {
        use crate::ltc2946::monitor::ChannelData::*;

        let mut receiver = self.channels.from_monitor.subscribe();

        loop {
            match receiver.recv().await? {
                Transaction(transaction) => {
                    if let Err(e) = self.process_transaction(transaction) {
                        warn!("Failed to process transaction: {}", e);
                    }
                }
                Connected(label) => {
                    if let Err(e) = self.monitor_connected(label).await {
                        error!("{}", e);
                    }
                }
                Disconnect(label) => {
                    info!("Monitor {} disconnected, printing statistics:", label);
                    if let Ok(mut stats) = self.shared_stats.lock() {
                        *stats.monitor_disconnections.entry(label).or_insert(0) += 1;
                        stats.print_summary();
                    }
                }
                Shutdown => {
                    info!("Received shutdown signal, printing final statistics:");
                    if let Ok(stats) = self.shared_stats.lock() {
                        stats.print_summary();
                    }
                    break;
                }
            }
        }

        Ok(())
    }

    /// Every successful raw read that comes back over the broadcast
    /// channel is converted and published, whichever command caused it.
    fn process_transaction(&self, transaction: Transaction) -> Result<()> {
        debug!("RX: {:?}", transaction);

        if let Ok(mut stats) = self.shared_stats.lock() {
            stats.transactions_received += 1;
        }

        match transaction.status {
            Status::Ok if transaction.op == Op::Read => {
                let monitor = match self.config.enabled_monitor_with_label(&transaction.label) {
                    Some(monitor) => monitor,
                    None => {
                        warn!("reply from unknown monitor {}, ignoring", transaction.label);
                        return Ok(());
                    }
                };

                if let Some(attribute) = Attribute::for_register(transaction.register) {
                    let value = convert::display_value(
                        attribute,
                        transaction.value,
                        &monitor.line_params(),
                    );

                    if self.config.mqtt().enabled() {
                        let m = mqtt::Message::for_attribute(&transaction.label, attribute, value);
                        self.publish_message(m.topic, m.payload, m.retain)?;
                    }
                }

                Ok(())
            }
            Status::Failed(reason) => {
                if let Ok(mut stats) = self.shared_stats.lock() {
                    stats.bus_errors += 1;
                }
                warn!(
                    "monitor {}: register {:#04x} {:?} failed: {}",
                    transaction.label, transaction.register, transaction.op, reason
                );
                Ok(())
            }
            _ => Ok(()), // write acks need no publishing
        }
    }

    async fn monitor_connected(&self, label: String) -> Result<()> {
        let monitor = match self.config.enabled_monitor_with_label(&label) {
            Some(monitor) => monitor,
            None => {
                warn!("Unknown monitor label connected: {}", label);
                return Ok(());
            }
        };

        if !monitor.publish_attributes_on_connect() {
            return Ok(());
        }

        info!("Reading all attributes for monitor {}", label);

        for attribute in &ATTRIBUTES {
            if let Ok(mut stats) = self.shared_stats.lock() {
                stats.transactions_sent += 1;
            }
            commands::read_measurement::ReadMeasurement::new(
                self.channels.clone(),
                monitor.clone(),
                attribute,
            )
            .run()
            .await?;
        }

        Ok(())
    }

    fn publish_message(&self, topic: String, payload: String, retain: bool) -> Result<()> {
        let m = mqtt::Message {
            topic,
            payload,
            retain,
        };
        let channel_data = mqtt::ChannelData::Message(m);
        if self.channels.to_mqtt.send(channel_data).is_err() {
            if let Ok(mut stats) = self.shared_stats.lock() {
                stats.mqtt_errors += 1;
            }
            bail!("send(to_mqtt) failed - channel closed?");
        }

        Ok(())
    }
}
