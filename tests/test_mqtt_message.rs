mod common;
use common::*;

use ltc2946_bridge::prelude::*;

fn cmd(topic: &str, payload: &str) -> mqtt::Message {
    mqtt::Message {
        topic: topic.to_string(),
        retain: false,
        payload: payload.to_string(),
    }
}

#[test]
fn parses_read_command() {
    common_setup();

    let message = cmd("cmd/main/read/power1_input", "");
    match message.to_command(Factory::monitor()).unwrap() {
        Command::ReadAttribute(monitor, attribute) => {
            assert_eq!(monitor.label(), "main");
            assert_eq!(attribute.name, "power1_input");
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn parses_set_command() {
    common_setup();

    let message = cmd("cmd/main/set/in1_max", "12000");
    match message.to_command(Factory::monitor()).unwrap() {
        Command::SetAttribute(_, attribute, value) => {
            assert_eq!(attribute.name, "in1_max");
            assert_eq!(value, 12000);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn tolerates_sysfs_style_payload() {
    common_setup();

    // echo appends a newline; accept it like the kernel's attribute
    // parser would
    let message = cmd("cmd/main/set/curr1_max", "-42\n");
    match message.to_command(Factory::monitor()).unwrap() {
        Command::SetAttribute(_, _, value) => assert_eq!(value, -42),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn non_numeric_payload_is_an_error() {
    common_setup();

    let message = cmd("cmd/main/set/power1_max", "bananas");
    assert!(message.to_command(Factory::monitor()).is_err());
}

#[test]
fn unknown_attribute_is_an_error() {
    common_setup();

    let message = cmd("cmd/main/read/temp1_input", "");
    assert!(message.to_command(Factory::monitor()).is_err());
}

#[test]
fn inputs_reject_writes() {
    common_setup();

    let message = cmd("cmd/main/set/curr1_input", "5");
    let err = message.to_command(Factory::monitor()).unwrap_err();
    assert!(err.to_string().contains("read-only"));
}

#[test]
fn result_topic_mirrors_command_topic() {
    common_setup();

    let message = cmd("cmd/main/set/power1_max", "bananas");
    assert_eq!(message.result_topic(), "result/main/set/power1_max");
}

#[test]
fn read_all_has_its_own_command() {
    common_setup();

    let message = cmd("cmd/main/read/all", "");
    assert!(matches!(
        message.to_command(Factory::monitor()).unwrap(),
        Command::ReadAll(_)
    ));
}
