//! Shared data model and wire codec for Radar (spec §3, §4.1–§4.3, §4.8).
//!
//! Used by both `radar-client` and `radar-server` so the two processes
//! agree on check identity, status rotation and frame layout without
//! duplicating the logic on each side.

pub mod check;
pub mod check_group;
pub mod config;
pub mod error;
pub mod id;
pub mod status;
pub mod wire;

pub use check::{Check, CheckError, CheckHandle, CheckReply, CheckReplyError};
pub use check_group::CheckGroup;
pub use error::RadarError;
pub use id::{Identified, SequentialIdGenerator, ToDict};
pub use status::Status;
pub use wire::{MessageType, ProtocolError};
