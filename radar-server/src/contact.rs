//! Contact registry (supplemental C10): named notification targets
//! that monitors reference, resolved to opaque handles the same way
//! Checks are (spec §9).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use radar_proto::{Identified, SequentialIdGenerator, ToDict};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("missing name and/or target from contact definition")]
    MissingNameOrTarget,
}

#[derive(Debug, Clone)]
pub struct Contact {
    pub id: u64,
    pub name: String,
    pub target: String,
    pub enabled: bool,
}

impl Contact {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Result<Self, ContactError> {
        let name = name.into();
        let target = target.into();

        if name.is_empty() || target.is_empty() {
            return Err(ContactError::MissingNameOrTarget);
        }

        Ok(Self {
            id: SequentialIdGenerator::new().generate(),
            name,
            target,
            enabled: true,
        })
    }

    pub fn to_dict(&self) -> serde_json::Map<String, Value> {
        ToDict::to_dict(self, &["id", "name", "target", "enabled"])
    }
}

impl Identified for Contact {
    fn id(&self) -> u64 {
        self.id
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl ToDict for Contact {
    fn field(&self, name: &str) -> Value {
        match name {
            "id" => json!(self.id),
            "name" => json!(self.name),
            "target" => json!(self.target),
            "enabled" => json!(self.enabled),
            _ => Value::Null,
        }
    }
}

// Identity is (name, target), same pattern as Check — see radar_proto::check.
impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.target == other.target
    }
}

impl Eq for Contact {}

impl Hash for Contact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut h = DefaultHasher::new();
        self.name.hash(&mut h);
        self.target.hash(&mut h);
        state.write_u64(h.finish());
    }
}

#[derive(Clone)]
pub struct ContactHandle(Arc<Mutex<Contact>>);

impl ContactHandle {
    pub fn new(contact: Contact) -> Self {
        Self(Arc::new(Mutex::new(contact)))
    }

    pub fn id(&self) -> u64 {
        self.lock().id
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn target(&self) -> String {
        self.lock().target.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Contact> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PartialEq for ContactHandle {
    fn eq(&self, other: &Self) -> bool {
        *self.lock() == *other.lock()
    }
}

impl Eq for ContactHandle {}

impl Hash for ContactHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lock().hash(state)
    }
}
