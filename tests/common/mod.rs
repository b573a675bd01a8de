use ltc2946_bridge::prelude::*;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory();

impl Factory {
    pub fn monitor() -> config::Monitor {
        config::Monitor {
            enabled: true,
            bus: "/dev/i2c-1".to_string(),
            address: 0x6e,
            label: "main".to_string(),
            shunt_microohms: None,
            adin_r1: None,
            adin_r2: None,
            publish_attributes_on_connect: None,
            read_only: None,
        }
    }

    pub fn read_only_monitor() -> config::Monitor {
        config::Monitor {
            read_only: Some(true),
            ..Self::monitor()
        }
    }
}
