//! Environment-variable configuration loading (spec §6, ambient
//! concern), following the teacher's `Config::from_env` pattern.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the accept loop binds to.
    pub listen_addr: String,
    /// How often each connected client receives a fresh CHECK dispatch
    /// (spec §4.6 — "periodically emits a CHECK message").
    pub dispatch_interval: Duration,
    pub checks_dir: PathBuf,
    pub contacts_dir: PathBuf,
    pub monitors_dir: PathBuf,
    pub max_frame_len: u32,
    /// Bound on the plugin-dispatcher's FIFO queue (spec §4.7).
    pub dispatch_queue_capacity: usize,
    /// `log runtime` config flag (spec §4.7.4): time each plugin
    /// invocation and log it.
    pub log_runtime: bool,
    pub log_level: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            listen_addr: env_or("RADAR_LISTEN_ADDR", "0.0.0.0:9797"),
            dispatch_interval: Duration::from_secs(
                env_or("RADAR_DISPATCH_INTERVAL_SECS", "30").parse().unwrap_or(30),
            ),
            checks_dir: PathBuf::from(env_or("RADAR_CHECKS_DIR", "/etc/radar/checks")),
            contacts_dir: PathBuf::from(env_or("RADAR_CONTACTS_DIR", "/etc/radar/contacts")),
            monitors_dir: PathBuf::from(env_or("RADAR_MONITORS_DIR", "/etc/radar/monitors")),
            max_frame_len: env_or("RADAR_MAX_FRAME_LEN", &radar_proto::wire::DEFAULT_MAX_FRAME_LEN.to_string())
                .parse()
                .unwrap_or(radar_proto::wire::DEFAULT_MAX_FRAME_LEN),
            dispatch_queue_capacity: env_or("RADAR_DISPATCH_QUEUE_CAPACITY", "256")
                .parse()
                .unwrap_or(256),
            log_runtime: env_bool("RADAR_LOG_RUNTIME", false),
            log_level: env_or("RUST_LOG", "radar_server=info"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
