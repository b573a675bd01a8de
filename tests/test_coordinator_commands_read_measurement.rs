mod common;
use common::*;

use ltc2946_bridge::coordinator::commands::read_measurement::ReadMeasurement;
use ltc2946_bridge::ltc2946::monitor::{ChannelData, Status, Transaction};
use ltc2946_bridge::ltc2946::registers::{self, Attribute};
use ltc2946_bridge::prelude::*;

#[tokio::test]
async fn happy_path() {
    common_setup();

    let monitor = Factory::monitor();
    let channels = Channels::new();
    let attribute = Attribute::by_name("curr1_input").unwrap();

    let subject = ReadMeasurement::new(channels.clone(), monitor.clone(), attribute);

    let mut to_monitor_rx = channels.to_monitor.subscribe();

    let sf = async {
        let value = subject.run().await?;
        // full-scale sense reading over the default 1000uR shunt
        assert_eq!(value, 102_375);
        Ok(())
    };

    let tf = async {
        // emulate the monitor end of the channel
        if let ChannelData::Transaction(request) = to_monitor_rx.recv().await? {
            assert_eq!(request.register, registers::DELTA_SENSE);
            let reply = Transaction {
                value: 0xFFF,
                status: Status::Ok,
                ..request
            };
            channels
                .from_monitor
                .send(ChannelData::Transaction(reply))?;
        }
        Ok::<(), anyhow::Error>(())
    };

    futures::try_join!(tf, sf).unwrap();
}

#[tokio::test]
async fn bus_read_failure_is_surfaced() {
    common_setup();

    let monitor = Factory::monitor();
    let channels = Channels::new();
    let attribute = Attribute::by_name("power1_input").unwrap();

    let subject = ReadMeasurement::new(channels.clone(), monitor.clone(), attribute);

    let mut to_monitor_rx = channels.to_monitor.subscribe();

    let sf = async {
        let result = subject.run().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("power1_input"));
        Ok(())
    };

    let tf = async {
        if let ChannelData::Transaction(request) = to_monitor_rx.recv().await? {
            let reply = Transaction {
                status: Status::Failed("read of register 0x05 failed".to_string()),
                ..request
            };
            channels
                .from_monitor
                .send(ChannelData::Transaction(reply))?;
        }
        Ok::<(), anyhow::Error>(())
    };

    futures::try_join!(tf, sf).unwrap();
}
