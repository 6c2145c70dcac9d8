//! Shared configuration keys (spec §6). Parsing YAML files and a CLI
//! flag surface are explicitly out of scope (spec §1); both binaries
//! populate these structs from environment variables the way the
//! teacher's `Config::from_env` does, in each binary's own `config`
//! module.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub to: String,
    pub port: u16,
    pub reconnect: bool,
}

#[derive(Debug, Clone)]
pub struct RunAsConfig {
    pub user: String,
    pub group: String,
    pub enforce_ownership: bool,
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub checks: PathBuf,
    pub contacts: PathBuf,
    pub monitors: PathBuf,
    pub plugins: PathBuf,
}
