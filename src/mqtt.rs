use crate::prelude::*;
use crate::coordinator::BridgeStats;
use crate::ltc2946::registers::Attribute;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Publish, QoS};
use std::sync::{Arc, Mutex};

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

pub enum TargetMonitor {
    Label(String),
    All,
}

impl Message {
    /// Value message for one attribute. Thresholds are retained so a
    /// subscriber sees the last written limit; instantaneous inputs are
    /// not.
    pub fn for_attribute(label: &str, attribute: &Attribute, value: i64) -> Message {
        Message {
            topic: format!("{}/{}", label, attribute.name),
            retain: attribute.writable(),
            payload: value.to_string(),
        }
    }

    pub fn to_command(&self, monitor: config::Monitor) -> Result<Command> {
        use Command::*;

        let (_label, parts) = self.split_cmd_topic()?;

        let r = match parts[..] {
            ["read", "all"] => ReadAll(monitor),
            ["read", name] => {
                let attribute = Attribute::by_name(name)
                    .ok_or_else(|| anyhow!("unknown attribute: {}", name))?;
                ReadAttribute(monitor, attribute)
            }
            ["set", name] => {
                let attribute = Attribute::by_name(name)
                    .ok_or_else(|| anyhow!("unknown attribute: {}", name))?;
                if !attribute.writable() {
                    bail!("{} is read-only", name);
                }
                SetAttribute(monitor, attribute, self.payload_int()?)
            }
            [..] => bail!("unhandled: {:?}", self),
        };

        Ok(r)
    }

    // given a cmd Message, return the monitor label it is intended for.
    //
    // eg cmd/psu0/set/power1_max => (psu0, ['set', 'power1_max'])
    pub fn split_cmd_topic(&self) -> Result<(TargetMonitor, Vec<&str>)> {
        let parts: Vec<&str> = self.topic.split('/').collect();

        // bail if the topic is too short to handle.
        // this *shouldn't* happen as our subscribe is for {ns}/cmd/{label}/#
        if parts.len() < 2 {
            bail!("ignoring badly formed MQTT topic: {}", self.topic);
        }

        // parts[0] should be cmd
        let label = parts[1];
        let rest = parts[2..].to_vec();

        if label == "all" {
            Ok((TargetMonitor::All, rest))
        } else {
            Ok((TargetMonitor::Label(label.to_string()), rest))
        }
    }

    /// Result topic for this command message, usable before the command
    /// parses: cmd/psu0/set/power1_max -> result/psu0/set/power1_max
    pub fn result_topic(&self) -> String {
        match self.topic.strip_prefix("cmd/") {
            Some(rest) => format!("result/{}", rest),
            None => format!("result/{}", self.topic),
        }
    }

    // decimal ASCII, optionally signed; surrounding whitespace (and a
    // trailing newline in particular) is tolerated
    fn payload_int(&self) -> Result<i64> {
        self.payload
            .trim()
            .parse()
            .map_err(|err| anyhow!("payload_int: {}", err))
    }
} // }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Message(Message),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

#[derive(Clone)]
pub struct Mqtt {
    config: ConfigWrapper,
    channels: Channels,
    shared_stats: Arc<Mutex<BridgeStats>>,
}

impl Mqtt {
    pub fn new(
        config: ConfigWrapper,
        channels: Channels,
        shared_stats: Arc<Mutex<BridgeStats>>,
    ) -> Self {
        Self {
            config,
            channels,
            shared_stats,
        }
    }

    pub async fn start(&self) -> Result<()> {
        let c = &self.config;

        if !c.mqtt().enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new("ltc2946-bridge", c.mqtt().host(), c.mqtt().port());

        let will = LastWill {
            topic: self.lwt_topic(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(std::time::Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.mqtt().username(), c.mqtt().password()) {
            options.set_credentials(u, p);
        }

        info!(
            "initializing mqtt at {}:{}",
            c.mqtt().host(),
            c.mqtt().port()
        );

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop),
            self.sender(client)
        )?;

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping MQTT client...");
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
        Ok(())
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        client
            .subscribe(
                format!("{}/cmd/all/#", self.config.mqtt().namespace()),
                QoS::AtMostOnce,
            )
            .await?;

        for monitor in self.config.enabled_monitors() {
            client
                .subscribe(
                    format!(
                        "{}/cmd/{}/#",
                        self.config.mqtt().namespace(),
                        monitor.label()
                    ),
                    QoS::AtMostOnce,
                )
                .await?;
        }

        Ok(())
    }

    // mqtt -> coordinator
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        loop {
            if let Ok(event) =
                tokio::time::timeout(std::time::Duration::from_secs(1), eventloop.poll()).await
            {
                match event {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        self.handle_message(publish)?;
                    }
                    Err(e) => {
                        error!("{}", e);
                        info!("reconnecting in 5s");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                    _ => {} // keepalives etc
                }
            }
        }
    }

    fn handle_message(&self, publish: Publish) -> Result<()> {
        // remove the namespace, including the first /
        // doing it this way means we don't break if namespace happens to contain a /
        let topic = publish.topic[self.config.mqtt().namespace().len() + 1..].to_owned();

        let message = Message {
            topic,
            retain: publish.retain,
            payload: String::from_utf8(publish.payload.to_vec())?,
        };
        debug!("RX: {:?}", message);
        if self
            .channels
            .from_mqtt
            .send(ChannelData::Message(message))
            .is_err()
        {
            bail!("send(from_mqtt) failed - channel closed?");
        }

        Ok(())
    }

    // coordinator -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        use ChannelData::*;

        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            match receiver.recv().await? {
                Shutdown => {
                    info!("MQTT sender received shutdown signal");
                    let _ = client.disconnect().await;
                    break;
                }
                Message(message) => {
                    let topic = format!("{}/{}", self.config.mqtt().namespace(), message.topic);
                    info!("publishing: {} = {}", topic, message.payload);
                    let payload = message.payload.as_bytes().to_vec();
                    let mut attempt = 1;
                    loop {
                        match client
                            .publish(&topic, QoS::AtLeastOnce, message.retain, payload.as_slice())
                            .await
                        {
                            Ok(_) => {
                                if let Ok(mut stats) = self.shared_stats.lock() {
                                    stats.mqtt_messages_sent += 1;
                                }
                                break;
                            }
                            Err(err) => {
                                error!(
                                    "MQTT publish failed: {:?} - retrying in 10s (attempt {})",
                                    err, attempt
                                );
                                if let Ok(mut stats) = self.shared_stats.lock() {
                                    stats.mqtt_errors += 1;
                                }
                                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                                attempt += 1;
                            }
                        }
                    }
                }
            }
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }

    fn lwt_topic(&self) -> String {
        format!("{}/LWT", self.config.mqtt().namespace())
    }
}
