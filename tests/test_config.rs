mod common;
use common::*;

use ltc2946_bridge::prelude::*;
use std::io::Write as _;

const MINIMAL: &str = r#"
monitors:
  - bus: /dev/i2c-1
    label: main
mqtt:
  enabled: false
  host: localhost
"#;

fn load(yaml: &str) -> Result<Config> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;
    Config::new(file.path().to_string_lossy().to_string())
}

#[test]
fn minimal_config_gets_chip_defaults() {
    common_setup();

    let config = load(MINIMAL).unwrap();
    let monitor = &config.monitors[0];

    assert!(monitor.enabled());
    assert_eq!(monitor.address(), 0x6e);
    assert_eq!(monitor.shunt_microohms(), 1000);
    assert_eq!(monitor.adin_r1(), 1);
    assert_eq!(monitor.adin_r2(), 1000);
    assert!(!monitor.read_only());
    assert!(!config.read_only);
    assert_eq!(config.loglevel, "info");
}

#[test]
fn line_params_follow_config() {
    common_setup();

    let yaml = r#"
monitors:
  - bus: /dev/i2c-3
    label: rail12v
    shunt_microohms: 500
    adin_r1: 9000
    adin_r2: 1000
mqtt:
  enabled: false
  host: localhost
"#;
    let config = load(yaml).unwrap();
    let params = config.monitors[0].line_params();

    assert_eq!(params.shunt_uohm, 500);
    assert_eq!(params.adin_r1, 9000);
    assert_eq!(params.adin_r2, 1000);
}

#[test]
fn label_all_is_rejected() {
    common_setup();

    let yaml = r#"
monitors:
  - bus: /dev/i2c-1
    label: all
mqtt:
  enabled: false
  host: localhost
"#;
    assert!(load(yaml).is_err());
}

#[test]
fn reserved_address_is_rejected() {
    common_setup();

    let yaml = r#"
monitors:
  - bus: /dev/i2c-1
    address: 2
    label: main
mqtt:
  enabled: false
  host: localhost
"#;
    assert!(load(yaml).is_err());
}

#[test]
fn zero_divider_is_rejected() {
    common_setup();

    let yaml = r#"
monitors:
  - bus: /dev/i2c-1
    label: main
    adin_r2: 0
mqtt:
  enabled: false
  host: localhost
"#;
    assert!(load(yaml).is_err());
}

#[test]
fn disabled_monitors_are_not_validated() {
    common_setup();

    let yaml = r#"
monitors:
  - enabled: false
    bus: ""
    label: main
mqtt:
  enabled: false
  host: localhost
"#;
    let config = load(yaml).unwrap();
    assert!(!config.monitors[0].enabled());
}
