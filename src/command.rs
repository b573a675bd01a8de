use crate::prelude::*;
use crate::ltc2946::registers::Attribute;

#[derive(Debug, Clone)]
pub enum Command {
    ReadAttribute(config::Monitor, &'static Attribute),
    SetAttribute(config::Monitor, &'static Attribute, i64),
    ReadAll(config::Monitor),
}

impl Command {
    pub fn to_result_topic(&self) -> String {
        use Command::*;

        let rest = match self {
            ReadAttribute(monitor, attribute) => {
                format!("{}/read/{}", monitor.label(), attribute.name)
            }
            SetAttribute(monitor, attribute, _) => {
                format!("{}/set/{}", monitor.label(), attribute.name)
            }
            ReadAll(monitor) => format!("{}/read/all", monitor.label()),
        };

        format!("result/{}", rest)
    }
}
