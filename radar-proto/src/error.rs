//! Crate-level error type (spec §7, ambient stack).
//!
//! Grounded on the teacher's `TrailsError` in `server/src/error.rs`: one
//! `#[derive(thiserror::Error)]` enum, one `#[from]` conversion per
//! wrapped source. Unlike the teacher, nothing here implements
//! `IntoResponse` — there is no HTTP layer to convert into (spec.md's
//! Non-goals exclude an HTTP surface entirely).
//!
//! `PluginError` is deliberately not a variant: it's defined in
//! `radar_server::plugin`, which depends on this crate, not the other
//! way around, so folding it in here would require an upward
//! dependency. Plugin failures are caught and logged at the dispatcher
//! boundary instead (spec §7).

use crate::check::{CheckError, CheckReplyError};
use crate::wire::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum RadarError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("check error: {0}")]
    Check(#[from] CheckError),

    #[error("check reply error: {0}")]
    CheckReply(#[from] CheckReplyError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("setup error: {0}")]
    Setup(String),
}
