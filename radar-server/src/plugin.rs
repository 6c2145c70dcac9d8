//! Plugin trait (spec §3, §4.7) and manifest of built-ins.
//!
//! Dynamic class lookup from a plugin directory is explicitly replaced
//! by explicit registration (spec §9 design note): `main.rs` builds a
//! `Vec<Box<dyn Plugin>>` directly rather than loading shared objects
//! or using runtime reflection.

use std::net::IpAddr;

use async_trait::async_trait;
use radar_proto::CheckHandle;

use crate::contact::ContactHandle;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("{0}")]
    Message(String),
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;

    fn enabled(&self) -> bool {
        true
    }

    async fn on_start(&mut self) {}

    async fn on_check_reply(
        &mut self,
        addr: IpAddr,
        port: u16,
        checks: &[CheckHandle],
        contacts: &[ContactHandle],
    ) -> Result<(), PluginError> {
        let _ = (addr, port, checks, contacts);
        Ok(())
    }

    async fn on_test_reply(
        &mut self,
        addr: IpAddr,
        port: u16,
        checks: &[CheckHandle],
        contacts: &[ContactHandle],
    ) -> Result<(), PluginError> {
        let _ = (addr, port, checks, contacts);
        Ok(())
    }

    async fn on_shutdown(&mut self) {}
}
