use crate::prelude::*;
use crate::ltc2946::monitor::ChannelData;

#[derive(Debug, Clone)]
pub struct Channels {
    pub from_monitor: broadcast::Sender<ChannelData>,
    pub to_monitor: broadcast::Sender<ChannelData>,
    pub from_mqtt: broadcast::Sender<crate::mqtt::ChannelData>,
    pub to_mqtt: broadcast::Sender<crate::mqtt::ChannelData>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            from_monitor: Self::channel(),
            to_monitor: Self::channel(),
            from_mqtt: Self::channel(),
            to_mqtt: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
