pub use std::io::Write;
pub use std::str::FromStr;
pub use std::sync::Arc;

pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use tokio::sync::broadcast;

pub use crate::channels::Channels;
pub use crate::command::Command;
pub use crate::config::{self, Config, ConfigWrapper};
pub use crate::coordinator;
pub use crate::ltc2946;
pub use crate::mqtt;
pub use crate::options::Options;
