use crate::prelude::*;

use crate::ltc2946::convert;
use crate::ltc2946::monitor::{ChannelData, Status, Transaction, WaitForReply};
use crate::ltc2946::registers::Attribute;

/// The show path: one raw register read, converted to the attribute's
/// display unit.
pub struct ReadMeasurement {
    channels: Channels,
    monitor: config::Monitor,
    attribute: &'static Attribute,
}

impl ReadMeasurement {
    pub fn new(
        channels: Channels,
        monitor: config::Monitor,
        attribute: &'static Attribute,
    ) -> Self {
        Self {
            channels,
            monitor,
            attribute,
        }
    }

    pub async fn run(&self) -> Result<i64> {
        let request = Transaction::read(self.monitor.label(), self.attribute.register);

        let mut receiver = self.channels.from_monitor.subscribe();

        debug!(
            "[read_measurement] monitor {} register {:#04x} ({})",
            self.monitor.label(),
            self.attribute.register,
            self.attribute.name
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

        match reply.status {
            Status::Ok => Ok(convert::display_value(
                self.attribute,
                reply.value,
                &self.monitor.line_params(),
            )),
            Status::Failed(reason) => {
                bail!("read of {} failed: {}", self.attribute.name, reason)
            }
            Status::Request => bail!("unexpected request echo for {}", self.attribute.name),
        }
    }
}
