//! Environment-variable configuration loading (spec §6, ambient
//! concern), following the teacher's `Config::from_env` pattern.

use std::path::PathBuf;

use radar_proto::config::{ConnectConfig, RunAsConfig};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect: ConnectConfig,
    pub run_as: RunAsConfig,
    pub checks_dir: PathBuf,
    pub max_frame_len: u32,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            connect: ConnectConfig {
                to: env_or("RADAR_CONNECT_TO", "127.0.0.1"),
                port: env_or("RADAR_CONNECT_PORT", "9797")
                    .parse()
                    .unwrap_or(9797),
                reconnect: env_bool("RADAR_RECONNECT", true),
            },
            run_as: RunAsConfig {
                user: env_or("RADAR_RUN_AS_USER", "radar"),
                group: env_or("RADAR_RUN_AS_GROUP", "radar"),
                enforce_ownership: env_bool("RADAR_ENFORCE_OWNERSHIP", true),
            },
            checks_dir: PathBuf::from(env_or("RADAR_CHECKS_DIR", "/etc/radar/checks")),
            max_frame_len: env_or("RADAR_MAX_FRAME_LEN", &radar_proto::wire::DEFAULT_MAX_FRAME_LEN.to_string())
                .parse()
                .unwrap_or(radar_proto::wire::DEFAULT_MAX_FRAME_LEN),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_bool_accepts_common_truthy_spellings() {
        std::env::set_var("RADAR_TEST_BOOL", "Yes");
        assert!(env_bool("RADAR_TEST_BOOL", false));
        std::env::remove_var("RADAR_TEST_BOOL");
    }

    #[test]
    fn env_bool_falls_back_to_default_when_unset() {
        std::env::remove_var("RADAR_TEST_BOOL_UNSET");
        assert!(env_bool("RADAR_TEST_BOOL_UNSET", true));
        assert!(!env_bool("RADAR_TEST_BOOL_UNSET", false));
    }
}
