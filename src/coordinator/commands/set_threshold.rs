use crate::prelude::*;

use crate::ltc2946::convert;
use crate::ltc2946::monitor::{ChannelData, Status, Transaction, WaitForReply};
use crate::ltc2946::registers::Attribute;

/// The set path: convert the requested value to register counts
/// (saturating at the register's range), write it, and read it back.
/// The comparison happens in raw counts so conversion truncation cannot
/// produce a false mismatch.
pub struct SetThreshold {
    channels: Channels,
    monitor: config::Monitor,
    attribute: &'static Attribute,
    value: i64,
}

impl SetThreshold {
    pub fn new(
        channels: Channels,
        monitor: config::Monitor,
        attribute: &'static Attribute,
        value: i64,
    ) -> Self {
        Self {
            channels,
            monitor,
            attribute,
            value,
        }
    }

    pub async fn run(&self) -> Result<()> {
        // Skip write if the monitor is in read-only mode
        if self.monitor.read_only() {
            bail!(
                "Cannot set {} to {} - monitor {} is in read-only mode",
                self.attribute.name,
                self.value,
                self.monitor.label()
            );
        }

        if !self.attribute.writable() {
            bail!("{} is read-only", self.attribute.name);
        }

        let raw = convert::raw_value(self.attribute, self.value, &self.monitor.line_params());
        let request = Transaction::write(self.monitor.label(), self.attribute.register, raw);

        let mut receiver = self.channels.from_monitor.subscribe();

        info!(
            "[set_threshold] monitor {} {} = {} (raw {:#x})",
            self.monitor.label(),
            self.attribute.name,
            self.value,
            raw
        );

        if self
            .channels
            .to_monitor
            .send(ChannelData::Transaction(request.clone()))
            .is_err()
        {
            bail!("send(to_monitor) failed - channel closed?");
        }

        let reply = receiver.wait_for_reply(&request).await?;
        if let Status::Failed(reason) = reply.status {
            bail!("write of {} failed: {}", self.attribute.name, reason);
        }

        // Read the register back; a mismatch means the write silently
        // didn't stick.
        let request = Transaction::read(self.monitor.label(), self.attribute.register);
        if self
            .channels
            .to_monitor
            .send(ChannelData::Transaction(request.clone()))
            .is_err()
        {
            bail!("send(to_monitor) failed - channel closed?");
        }

        let reply = receiver.wait_for_reply(&request).await?;
        match reply.status {
            Status::Ok => {
                if reply.value != raw {
                    bail!(
                        "failed to set {}, got back raw value {:#x} (wanted {:#x})",
                        self.attribute.name,
                        reply.value,
                        raw
                    );
                }
                Ok(())
            }
            Status::Failed(reason) => {
                bail!("readback of {} failed: {}", self.attribute.name, reason)
            }
            Status::Request => bail!("unexpected request echo for {}", self.attribute.name),
        }
    }
}
