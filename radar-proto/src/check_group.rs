//! CheckGroup (spec §4.3) — set-semantics aggregation of checks.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::check::{hash_str, CheckError, CheckHandle, CheckReply};
use crate::id::{Identified, SequentialIdGenerator, ToDict};

#[derive(Clone)]
pub struct CheckGroup {
    pub id: u64,
    pub name: String,
    pub enabled: bool,
    pub checks: HashSet<CheckHandle>,
}

impl CheckGroup {
    pub fn new(name: impl Into<String>, checks: Vec<CheckHandle>) -> Result<Self, CheckError> {
        let name = name.into();

        if name.is_empty() || checks.is_empty() {
            return Err(CheckError::MissingNameOrPath);
        }

        Ok(Self {
            id: SequentialIdGenerator::new().generate(),
            name,
            enabled: true,
            checks: checks.into_iter().collect(),
        })
    }

    /// Delegate to every member; return true if *any* member accepted
    /// the reply. Every member is always asked — this does not
    /// short-circuit on the first hit, matching the source's
    /// list-comprehension-then-`any` semantics.
    pub fn update_status(&self, reply: &CheckReply) -> bool {
        self.checks
            .iter()
            .map(|c| c.update_status(reply))
            .fold(false, |acc, updated| acc || updated)
    }

    /// Flatten every member's check-dict list into one list (spec §4.3).
    pub fn to_check_entries(&self) -> Vec<Value> {
        self.checks.iter().flat_map(|c| c.to_check_entries()).collect()
    }

    /// Unordered iteration of members.
    pub fn as_list(&self) -> Vec<CheckHandle> {
        self.checks.iter().cloned().collect()
    }
}

impl Identified for CheckGroup {
    fn id(&self) -> u64 {
        self.id
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl ToDict for CheckGroup {
    fn field(&self, name: &str) -> Value {
        match name {
            "id" => serde_json::json!(self.id),
            "name" => serde_json::json!(self.name),
            "enabled" => serde_json::json!(self.enabled),
            _ => Value::Null,
        }
    }
}

// Equality is (name, set-of-members); the id does not participate.
impl PartialEq for CheckGroup {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.checks == other.checks
    }
}

impl Eq for CheckGroup {}

// hash(name) XOR over every member's hash; an empty set (never actually
// constructible — `new` requires at least one check) would reduce to
// hash(name) alone.
impl Hash for CheckGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut combined = hash_str(&self.name);
        for check in &self.checks {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            check.hash(&mut h);
            combined ^= h.finish();
        }
        state.write_u64(combined);
    }
}
