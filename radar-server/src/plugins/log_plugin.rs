//! A reference plugin that logs every reply it sees (spec §3, §4.7;
//! supplemental C12). Grounds the `Plugin` trait in a working
//! implementation the way a real deployment would ship at least one
//! plugin out of the box, and gives the dispatcher something non-trivial
//! to fan out to in the binary's own startup wiring.

use std::net::IpAddr;

use async_trait::async_trait;
use radar_proto::CheckHandle;
use tracing::info;

use crate::contact::ContactHandle;
use crate::plugin::{Plugin, PluginError};

pub struct LogPlugin {
    name: String,
    version: String,
    enabled: bool,
}

impl LogPlugin {
    pub fn new() -> Self {
        Self {
            name: "log".into(),
            version: "1.0".into(),
            enabled: true,
        }
    }
}

impl Default for LogPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for LogPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn on_start(&mut self) {
        info!(plugin = %self.name, version = %self.version, "plugin started");
    }

    async fn on_check_reply(
        &mut self,
        addr: IpAddr,
        port: u16,
        checks: &[CheckHandle],
        contacts: &[ContactHandle],
    ) -> Result<(), PluginError> {
        for check in checks {
            info!(
                client = %addr,
                port,
                check = %check.name(),
                status = check.current_status().name(),
                contacts = contacts.len(),
                "check reply"
            );
        }
        Ok(())
    }

    async fn on_test_reply(
        &mut self,
        addr: IpAddr,
        port: u16,
        checks: &[CheckHandle],
        _contacts: &[ContactHandle],
    ) -> Result<(), PluginError> {
        info!(client = %addr, port, count = checks.len(), "test reply");
        Ok(())
    }

    async fn on_shutdown(&mut self) {
        info!(plugin = %self.name, "plugin shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn on_check_reply_never_errors() {
        let mut plugin = LogPlugin::new();
        let result = plugin
            .on_check_reply(IpAddr::from([127, 0, 0, 1]), 9797, &[], &[])
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn is_enabled_by_default() {
        assert!(LogPlugin::new().enabled());
    }
}
