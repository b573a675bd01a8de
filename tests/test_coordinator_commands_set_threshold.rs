mod common;
use common::*;

use ltc2946_bridge::coordinator::commands::set_threshold::SetThreshold;
use ltc2946_bridge::ltc2946::monitor::{ChannelData, Op, Status, Transaction};
use ltc2946_bridge::ltc2946::registers::{self, Attribute};
use ltc2946_bridge::prelude::*;

#[tokio::test]
async fn happy_path() {
    common_setup();

    let monitor = Factory::monitor();
    let channels = Channels::new();
    let attribute = Attribute::by_name("power1_max").unwrap();

    // 15000 mW -> 15000 * 1000 / 31250 = 480000 counts
    let subject = SetThreshold::new(channels.clone(), monitor.clone(), attribute, 15000);

    let mut to_monitor_rx = channels.to_monitor.subscribe();

    let sf = async {
        subject.run().await?;
        Ok(())
    };

    let tf = async {
        // the write lands first
        if let ChannelData::Transaction(request) = to_monitor_rx.recv().await? {
            assert_eq!(request.op, Op::Write);
            assert_eq!(request.register, registers::MAX_POWER);
            assert_eq!(request.value, 480_000);
            let reply = Transaction {
                status: Status::Ok,
                ..request
            };
            channels
                .from_monitor
                .send(ChannelData::Transaction(reply))?;
        }

        // then the readback verification
        if let ChannelData::Transaction(request) = to_monitor_rx.recv().await? {
            assert_eq!(request.op, Op::Read);
            assert_eq!(request.register, registers::MAX_POWER);
            let reply = Transaction {
                value: 480_000,
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
async fn readback_mismatch_fails() {
    common_setup();

    let monitor = Factory::monitor();
    let channels = Channels::new();
    let attribute = Attribute::by_name("in1_max").unwrap();

    let subject = SetThreshold::new(channels.clone(), monitor.clone(), attribute, 1001);

    let mut to_monitor_rx = channels.to_monitor.subscribe();

    let sf = async {
        let result = subject.run().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("failed to set"));
        Ok(())
    };

    let tf = async {
        if let ChannelData::Transaction(request) = to_monitor_rx.recv().await? {
            let reply = Transaction {
                status: Status::Ok,
                ..request
            };
            channels
                .from_monitor
                .send(ChannelData::Transaction(reply))?;
        }

        if let ChannelData::Transaction(request) = to_monitor_rx.recv().await? {
            // the chip kept its old contents
            let reply = Transaction {
                value: 0,
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
async fn bus_write_failure_is_surfaced() {
    common_setup();

    let monitor = Factory::monitor();
    let channels = Channels::new();
    let attribute = Attribute::by_name("curr1_min").unwrap();

    let subject = SetThreshold::new(channels.clone(), monitor.clone(), attribute, 500);

    let mut to_monitor_rx = channels.to_monitor.subscribe();

    let sf = async {
        let result = subject.run().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("curr1_min"));
        Ok(())
    };

    let tf = async {
        if let ChannelData::Transaction(request) = to_monitor_rx.recv().await? {
            let reply = Transaction {
                status: Status::Failed("write of register 0x18 failed".to_string()),
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
async fn read_only_monitor_is_refused() {
    common_setup();

    let monitor = Factory::read_only_monitor();
    let channels = Channels::new();
    let attribute = Attribute::by_name("power1_max").unwrap();

    // no monitor end needed: the command bails before touching the bus
    let subject = SetThreshold::new(channels.clone(), monitor, attribute, 15000);
    let result = subject.run().await;

    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("read-only mode"));
}
