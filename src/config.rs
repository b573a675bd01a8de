use crate::prelude::*;
use crate::ltc2946::convert::LineParams;

use serde::Deserialize;
use serde_with::serde_as;
use serde_yaml;
use std::sync::{Arc, Mutex};

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub monitors: Vec<Monitor>,
    pub mqtt: Mqtt,

    pub scheduler: Option<Scheduler>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    #[serde(default = "Config::default_read_only")]
    pub read_only: bool,
}

// Monitor {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Monitor {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    /// i2c-dev node the chip hangs off, eg /dev/i2c-1
    pub bus: String,
    #[serde(default = "Config::default_monitor_address")]
    pub address: u8,
    /// Topic fragment identifying this chip.
    pub label: String,

    pub shunt_microohms: Option<u32>,
    pub adin_r1: Option<u32>,
    pub adin_r2: Option<u32>,

    pub publish_attributes_on_connect: Option<bool>,
    pub read_only: Option<bool>,
}
impl Monitor {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn bus(&self) -> &str {
        &self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn label(&self) -> String {
        self.label.clone()
    }

    pub fn shunt_microohms(&self) -> u32 {
        self.shunt_microohms.unwrap_or(1000) // 1 milliohm shunt
    }

    pub fn adin_r1(&self) -> u32 {
        self.adin_r1.unwrap_or(1)
    }

    pub fn adin_r2(&self) -> u32 {
        self.adin_r2.unwrap_or(1000)
    }

    pub fn line_params(&self) -> LineParams {
        LineParams {
            shunt_uohm: self.shunt_microohms(),
            adin_r1: self.adin_r1(),
            adin_r2: self.adin_r2(),
        }
    }

    pub fn publish_attributes_on_connect(&self) -> bool {
        self.publish_attributes_on_connect == Some(true)
    }

    pub fn read_only(&self) -> bool {
        self.read_only == Some(true) // Default to false if not specified
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,
}
impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
} // }}}

// Scheduler {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Scheduler {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub poll_cron: Option<String>,
}
impl Scheduler {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn poll_cron(&self) -> String {
        self.poll_cron
            .clone()
            .unwrap_or_else(Config::default_poll_cron)
    }
} // }}}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(file)?;
        Ok(Self {
            config: Arc::new(Mutex::new(config)),
        })
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    pub fn monitors(&self) -> Vec<Monitor> {
        self.config.lock().unwrap().monitors.clone()
    }

    pub fn enabled_monitors(&self) -> Vec<Monitor> {
        self.monitors().into_iter().filter(|m| m.enabled()).collect()
    }

    pub fn monitor_with_label(&self, label: &str) -> Option<Monitor> {
        self.monitors().into_iter().find(|m| m.label == label)
    }

    pub fn enabled_monitor_with_label(&self, label: &str) -> Option<Monitor> {
        self.enabled_monitors().into_iter().find(|m| m.label == label)
    }

    pub fn monitors_for_message(&self, message: &mqtt::Message) -> Result<Vec<Monitor>> {
        let (target_monitor, _) = message.split_cmd_topic()?;
        let monitors = self.enabled_monitors();

        match target_monitor {
            mqtt::TargetMonitor::All => Ok(monitors),
            mqtt::TargetMonitor::Label(label) => Ok(monitors
                .into_iter()
                .filter(|m| m.label == label)
                .collect()),
        }
    }

    pub fn mqtt(&self) -> Mqtt {
        self.config.lock().unwrap().mqtt.clone()
    }

    pub fn scheduler(&self) -> Option<Scheduler> {
        self.config.lock().unwrap().scheduler.clone()
    }

    pub fn loglevel(&self) -> String {
        self.config.lock().unwrap().loglevel.clone()
    }

    pub fn read_only(&self) -> bool {
        self.config.lock().unwrap().read_only
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        let config: Self = serde_yaml::from_str(&content)?;

        info!("Configuration loaded successfully:");
        info!(
            "  Monitors: {} configured, {} enabled",
            config.monitors.len(),
            config.monitors.iter().filter(|m| m.enabled).count()
        );
        for (i, m) in config.monitors.iter().enumerate() {
            info!("    Monitor[{}]:", i);
            info!("      Enabled: {}", m.enabled);
            info!("      Bus: {}", m.bus);
            info!("      Address: {:#04x}", m.address);
            info!("      Label: {}", m.label);
            info!("      Shunt: {}uR", m.shunt_microohms());
            info!("      ADIN divider: r1={} r2={}", m.adin_r1(), m.adin_r2());
            info!("      Read Only: {}", m.read_only());
        }

        info!("  MQTT: {}", if config.mqtt.enabled { "enabled" } else { "disabled" });
        if config.mqtt.enabled {
            info!("    Host: {}", config.mqtt.host);
            info!("    Port: {}", config.mqtt.port);
            info!("    Namespace: {}", config.mqtt.namespace);
        }

        info!("  Scheduler: {}", if config.scheduler.is_some() { "configured" } else { "disabled" });
        if let Some(scheduler) = &config.scheduler {
            info!("    Enabled: {}", scheduler.enabled);
            info!("    Poll Cron: {}", scheduler.poll_cron());
        }

        info!("  Global Read Only: {}", config.read_only);
        info!("  Log Level: {}", config.loglevel);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        // Validate MQTT configuration
        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                bail!("mqtt.port must be between 1 and 65535");
            }
            if self.mqtt.host.is_empty() {
                return Err(anyhow!("config.rs:MQTT host cannot be empty"));
            }
        }

        // Validate monitor configurations
        for (i, m) in self.monitors.iter().enumerate() {
            if m.enabled {
                if m.bus.is_empty() {
                    return Err(anyhow!("config.rs:Monitor bus cannot be empty"));
                }
                // 7-bit address outside the reserved ranges
                if !(0x08..=0x77).contains(&m.address) {
                    bail!("monitor[{}].address {:#04x} is not a valid 7-bit address", i, m.address);
                }
                if m.label.is_empty() || m.label == "all" || m.label.contains('/') {
                    bail!("monitor[{}].label {:?} is not usable as a topic fragment", i, m.label);
                }
                if m.adin_r2() == 0 {
                    bail!("monitor[{}].adin_r2 must be non-zero", i);
                }
                if m.shunt_microohms() == 0 {
                    bail!("monitor[{}].shunt_microohms must be non-zero", i);
                }
            }
        }

        // Validate scheduler configuration
        if let Some(scheduler) = &self.scheduler {
            if scheduler.enabled {
                if let Err(e) = cron_parser::parse(&scheduler.poll_cron(), &chrono::Local::now()) {
                    return Err(anyhow!("config.rs:Invalid scheduler poll_cron: {}", e));
                }
            }
        }

        Ok(())
    }

    fn default_mqtt_port() -> u16 {
        1883
    }
    fn default_mqtt_namespace() -> String {
        "ltc2946".to_string()
    }

    fn default_monitor_address() -> u8 {
        0x6e
    }

    fn default_poll_cron() -> String {
        "* * * * *".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_read_only() -> bool {
        false
    }
}
