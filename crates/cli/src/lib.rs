//! `tonytoken` command-line front end: deployment driver and token tasks.

pub mod commands;
pub mod config;

pub use commands::{Session, execute, run};
pub use config::{Command, Config, DeployArgs};
