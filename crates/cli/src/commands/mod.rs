pub(crate) mod config;
pub(crate) mod utils;
pub(crate) mod watch;

pub(crate) use config::{handle_config_command, ConfigCommands};
pub(crate) use watch::{watch, WatchOptions};
