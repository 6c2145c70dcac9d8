//! Process-wide monotonic identifier generation (spec §3, §4.8).
//!
//! Every `Check`, `CheckGroup` and `Plugin` is assigned an id drawn from
//! one shared counter, no matter how many `SequentialIdGenerator`
//! instances exist — two distinct live entities never share an id.

use std::sync::atomic::{AtomicU64, Ordering};

static GLOBAL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates process-unique, monotonically increasing ids.
///
/// Cheap to construct — every instance reads from the same process-wide
/// counter, so `SequentialIdGenerator::new().generate()` never collides
/// with an id produced by another instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialIdGenerator;

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> u64 {
        GLOBAL_COUNTER.fetch_add(1, Ordering::Relaxed)
    }
}

/// Shared base for every id-bearing, enable/disable-able entity (spec §4.8).
pub trait Identified {
    fn id(&self) -> u64;
    fn enabled(&self) -> bool;
}

/// Projects named attributes into a JSON map — the Rust equivalent of the
/// source's reflection-based `to_dict(fields)` base method. Each
/// implementor supplies `field()`; the default `to_dict` just looks up
/// every requested name.
pub trait ToDict {
    fn field(&self, name: &str) -> serde_json::Value;

    fn to_dict(&self, fields: &[&str]) -> serde_json::Map<String, serde_json::Value> {
        fields
            .iter()
            .map(|f| (f.to_string(), self.field(f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_across_instances() {
        let a = SequentialIdGenerator::new();
        let b = SequentialIdGenerator::new();
        assert_ne!(a.generate(), b.generate());
    }

    #[test]
    fn ids_strictly_increase() {
        let g = SequentialIdGenerator::new();
        let first = g.generate();
        let second = g.generate();
        assert!(second > first);
    }
}
