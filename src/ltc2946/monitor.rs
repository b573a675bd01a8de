use crate::prelude::*;
use crate::ltc2946::bus::{BlockBus, LinuxBus};
use crate::ltc2946::codec;
use crate::ltc2946::registers::{self, Width};

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelData {
    Connected(String),  // strictly speaking, these two only ever go
    Disconnect(String), // monitor->coordinator, but eh.
    Transaction(Transaction), // this one goes both ways through the channel.
    Shutdown,
}
pub type Sender = broadcast::Sender<ChannelData>;
pub type Receiver = broadcast::Receiver<ChannelData>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Request,
    Ok,
    Failed(String),
}

/// One raw register exchange with a monitor. A request goes out with
/// `Status::Request`; the monitor task broadcasts the same transaction
/// back with the outcome filled in (`value` carries the register counts
/// on a successful read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub label: String,
    pub register: u8,
    pub op: Op,
    pub value: u32,
    pub status: Status,
}

impl Transaction {
    pub fn read(label: String, register: u8) -> Self {
        Self {
            label,
            register,
            op: Op::Read,
            value: 0,
            status: Status::Request,
        }
    }

    pub fn write(label: String, register: u8, value: u32) -> Self {
        Self {
            label,
            register,
            op: Op::Write,
            value,
            status: Status::Request,
        }
    }

    fn reply(&self, result: Result<u32>) -> Self {
        match result {
            Ok(value) => Self {
                value,
                status: Status::Ok,
                ..self.clone()
            },
            Err(err) => Self {
                status: Status::Failed(err.to_string()),
                ..self.clone()
            },
        }
    }
}

// WaitForReply {{{
#[async_trait]
pub trait WaitForReply {
    #[cfg(not(feature = "mocks"))]
    const TIMEOUT: u64 = 30;

    #[cfg(feature = "mocks")]
    const TIMEOUT: u64 = 1; // keep tests fast

    async fn wait_for_reply(&mut self, request: &Transaction) -> Result<Transaction>;
}
#[async_trait]
impl WaitForReply for Receiver {
    async fn wait_for_reply(&mut self, request: &Transaction) -> Result<Transaction> {
        let start = std::time::Instant::now();
        let timeout_duration = std::time::Duration::from_secs(Self::TIMEOUT);

        loop {
            if start.elapsed() >= timeout_duration {
                bail!(
                    "Timeout waiting for reply to {:?} after {} seconds",
                    request,
                    Self::TIMEOUT
                );
            }

            match self.try_recv() {
                Ok(ChannelData::Transaction(reply)) => {
                    if reply.status != Status::Request
                        && reply.label == request.label
                        && reply.register == request.register
                        && reply.op == request.op
                    {
                        return Ok(reply);
                    }
                }
                Ok(ChannelData::Connected(_)) => {} // connection status update, keep waiting
                Ok(ChannelData::Disconnect(label)) => {
                    if label == request.label {
                        bail!("Monitor {} disconnected while waiting for reply", label);
                    }
                }
                Ok(ChannelData::Shutdown) => {
                    bail!("Channel shutdown received while waiting for reply")
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                }
                Err(err) => bail!("Channel error while waiting for reply: {:?}", err),
            }
        }
    }
} // }}}

const RECONNECT_DELAY_SECS: u64 = 5;

/// Task owning the I2C handle for one attached chip. Serializes all
/// transactions against the device by construction: one task, one bus
/// handle.
#[derive(Clone)]
pub struct Monitor {
    config: ConfigWrapper,
    label: String,
    channels: Channels,
}

impl Monitor {
    pub fn new(config: ConfigWrapper, monitor: &config::Monitor, channels: Channels) -> Self {
        Self {
            config,
            label: monitor.label(),
            channels,
        }
    }

    pub fn config(&self) -> config::Monitor {
        self.config
            .monitor_with_label(&self.label)
            .expect("can't find my monitor")
    }

    pub async fn start(&self) -> Result<()> {
        while let Err(e) = self.connect().await {
            error!("monitor {}: {}", self.label, e);
            info!("monitor {}: retrying in {}s", self.label, RECONNECT_DELAY_SECS);
            tokio::time::sleep(std::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping monitor {}...", self.label);
        let _ = self.channels.to_monitor.send(ChannelData::Shutdown);
    }

    pub async fn connect(&self) -> Result<()> {
        let monitor_config = self.config();
        info!(
            "monitor {}: attaching at {} address {:#04x}",
            self.label,
            monitor_config.bus(),
            monitor_config.address()
        );

        let mut bus = LinuxBus::open(monitor_config.bus(), monitor_config.address())?;

        // One-shot chip setup: route the voltage measurement to ADIN.
        // A failed write here aborts the attach.
        bus.write_block(registers::CTRLA, &[registers::CTRLA_INIT])?;

        info!("monitor {}: attached", self.label);
        if self
            .channels
            .from_monitor
            .send(ChannelData::Connected(self.label.clone()))
            .is_err()
        {
            bail!("send(from_monitor) failed - channel closed?");
        }

        self.serve(&mut bus).await
    }

    async fn serve(&self, bus: &mut dyn BlockBus) -> Result<()> {
        let mut receiver = self.channels.to_monitor.subscribe();

        loop {
            match receiver.recv().await? {
                ChannelData::Shutdown => {
                    info!("monitor {} received shutdown signal", self.label);
                    break;
                }
                ChannelData::Transaction(request)
                    if request.status == Status::Request && request.label == self.label =>
                {
                    let reply = execute(bus, &request);
                    if let Status::Failed(reason) = &reply.status {
                        warn!("monitor {}: {:?} failed: {}", self.label, request.op, reason);
                    }
                    if self
                        .channels
                        .from_monitor
                        .send(ChannelData::Transaction(reply))
                        .is_err()
                    {
                        bail!("send(from_monitor) failed - channel closed?");
                    }
                }
                _ => {} // requests for other monitors, replies, events
            }
        }

        Ok(())
    }
}

fn execute(bus: &mut dyn BlockBus, request: &Transaction) -> Transaction {
    let result = match request.op {
        Op::Read => read_raw(bus, request.register),
        Op::Write => write_raw(bus, request.register, request.value).map(|_| request.value),
    };

    request.reply(result)
}

fn read_raw(bus: &mut dyn BlockBus, register: u8) -> Result<u32> {
    match registers::width_of(register) {
        Some(Width::Wide) => {
            let mut buf = [0u8; 3];
            bus.read_block(register, &mut buf)?;
            Ok(codec::unpack_wide(buf))
        }
        Some(Width::Narrow) => {
            let mut buf = [0u8; 2];
            bus.read_block(register, &mut buf)?;
            Ok(codec::unpack_narrow(buf) as u32)
        }
        None => bail!("register {:#04x} is not mapped", register),
    }
}

fn write_raw(bus: &mut dyn BlockBus, register: u8, value: u32) -> Result<()> {
    match registers::width_of(register) {
        Some(Width::Wide) => bus.write_block(register, &codec::pack_wide(value)),
        Some(Width::Narrow) => bus.write_block(
            register,
            &codec::pack_narrow(value.min(codec::NARROW_MAX as u32) as u16),
        ),
        None => bail!("register {:#04x} is not mapped", register),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeBus {
        registers: HashMap<u8, Vec<u8>>,
    }

    impl BlockBus for FakeBus {
        fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<()> {
            match self.registers.get(&register) {
                Some(data) if data.len() == buf.len() => {
                    buf.copy_from_slice(data);
                    Ok(())
                }
                _ => bail!("no such register"),
            }
        }

        fn write_block(&mut self, register: u8, data: &[u8]) -> Result<()> {
            self.registers.insert(register, data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn write_then_read_wide() {
        let mut bus = FakeBus::default();

        let request = Transaction::write("main".to_string(), registers::MAX_POWER, 0x123456);
        assert_eq!(execute(&mut bus, &request).status, Status::Ok);

        let request = Transaction::read("main".to_string(), registers::MAX_POWER);
        let reply = execute(&mut bus, &request);
        assert_eq!(reply.status, Status::Ok);
        assert_eq!(reply.value, 0x123456);
    }

    #[test]
    fn write_then_read_narrow() {
        let mut bus = FakeBus::default();

        let request = Transaction::write("main".to_string(), registers::MAX_ADIN, 0xABC);
        assert_eq!(execute(&mut bus, &request).status, Status::Ok);
        assert_eq!(bus.registers[&registers::MAX_ADIN], vec![0xAB, 0xC0]);

        let request = Transaction::read("main".to_string(), registers::MAX_ADIN);
        assert_eq!(execute(&mut bus, &request).value, 0xABC);
    }

    #[test]
    fn read_failure_is_reported() {
        let mut bus = FakeBus::default();

        let request = Transaction::read("main".to_string(), registers::POWER);
        let reply = execute(&mut bus, &request);
        assert!(matches!(reply.status, Status::Failed(_)));
    }

    #[test]
    fn unmapped_register_is_refused() {
        let mut bus = FakeBus::default();

        let request = Transaction::read("main".to_string(), 0x7F);
        assert!(matches!(execute(&mut bus, &request).status, Status::Failed(_)));
    }
}
