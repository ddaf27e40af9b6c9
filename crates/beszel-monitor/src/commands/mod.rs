//! Command handlers.

pub mod check;
pub mod config_cmd;
pub mod poll;
pub mod watch;
