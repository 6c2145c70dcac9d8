//! Check entity (spec §4.2) — identity, status, serialization, local
//! execution.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::id::{Identified, SequentialIdGenerator, ToDict};
use crate::status::Status;

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("missing name and/or path from check definition")]
    MissingNameOrPath,
    #[error("user '{0}' doesn't exist")]
    UnknownUser(String),
    #[error("group '{0}' doesn't exist")]
    UnknownGroup(String),
    #[error("'{path}' is not owned by user: {user} / group: {group}")]
    NotOwned {
        path: String,
        user: String,
        group: String,
    },
    #[error("couldn't stat '{0}': {1}")]
    Stat(String, std::io::Error),
    #[error("couldn't parse arguments: {0}")]
    BadArgs(String),
    #[error("couldn't run check: {0}")]
    Spawn(std::io::Error),
    #[error("couldn't parse JSON from check output: {0}")]
    BadOutput(serde_json::Error),
    #[error("missing or invalid 'status' from check output")]
    MissingOrInvalidStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckReplyError {
    #[error("can't update check's status: missing 'id' from check reply")]
    MissingId,
    #[error("can't update check's status: missing 'status' from check reply")]
    MissingStatus,
}

/// A decoded `{id, status, details?, data?}` reply dict (spec §3, §6).
/// `status` is kept as a raw integer — an unrecognized value is not a
/// parse error, it simply fails the `update_status` acceptance test.
#[derive(Debug, Clone)]
pub struct CheckReply {
    pub id: u64,
    pub status: i64,
    pub details: Option<String>,
    pub data: Option<Value>,
}

impl CheckReply {
    pub fn from_value(value: &Value) -> Result<Self, CheckReplyError> {
        let id = value
            .get("id")
            .and_then(Value::as_u64)
            .ok_or(CheckReplyError::MissingId)?;
        let status = value
            .get("status")
            .and_then(Value::as_i64)
            .ok_or(CheckReplyError::MissingStatus)?;
        let details = value
            .get("details")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let data = value.get("data").cloned();

        Ok(Self {
            id,
            status,
            details,
            data,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Check {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub args: String,
    pub enabled: bool,
    pub current_status: Status,
    pub previous_status: Status,
    pub details: String,
    pub data: Option<Value>,
}

impl Check {
    pub fn new(name: impl Into<String>, path: impl Into<String>, args: impl Into<String>) -> Result<Self, CheckError> {
        let name = name.into();
        let path = path.into();

        if name.is_empty() || path.is_empty() {
            return Err(CheckError::MissingNameOrPath);
        }

        Ok(Self {
            id: SequentialIdGenerator::new().generate(),
            name,
            path,
            args: args.into(),
            enabled: true,
            current_status: Status::Unknown,
            previous_status: Status::Unknown,
            details: String::new(),
            data: None,
        })
    }

    /// Accept a reply and mutate status (spec §4.2). Returns `false`
    /// (not an error) when the id mismatches or the check is disabled.
    pub fn update_status(&mut self, reply: &CheckReply) -> bool {
        let Some(status) = Status::from_i64(reply.status) else {
            return false;
        };

        if reply.id != self.id || !self.enabled {
            return false;
        }

        self.previous_status = self.current_status;
        self.current_status = status;
        self.details = reply.details.clone().unwrap_or_default();
        self.data = reply.data.clone();
        true
    }

    /// Full introspection projection: `{id, name, path, args,
    /// current_status, previous_status, details, data, enabled}`
    /// (carried over from `original_source/radar/check/__init__.py`'s
    /// `to_dict`, dropped by the distillation but useful for admin/debug
    /// tooling and assertions in tests).
    pub fn to_dict(&self) -> serde_json::Map<String, Value> {
        ToDict::to_dict(
            self,
            &[
                "id",
                "name",
                "path",
                "args",
                "current_status",
                "previous_status",
                "details",
                "data",
                "enabled",
            ],
        )
    }

    /// The projection sent to the client: `{id, path, args?}`, wrapped in
    /// a single-element list (spec §4.2, §6).
    pub fn to_check_entries(&self) -> Vec<Value> {
        let mut entry = serde_json::Map::new();
        entry.insert("id".into(), json!(self.id));
        entry.insert("path".into(), json!(self.path));
        if !self.args.is_empty() {
            entry.insert("args".into(), json!(self.args));
        }
        vec![Value::Object(entry)]
    }

    /// The projection sent by the client back to the server: `{id,
    /// current_status, details?, data?}` (spec §4.2, §6).
    pub fn to_check_reply_payload(&self) -> Value {
        let mut entry = serde_json::Map::new();
        entry.insert("id".into(), json!(self.id));
        entry.insert("current_status".into(), json!(self.current_status));
        if !self.details.is_empty() {
            entry.insert("details".into(), json!(self.details));
        }
        if let Some(data) = &self.data {
            entry.insert("data".into(), data.clone());
        }
        Value::Object(entry)
    }

    /// Build a transient check for client-side execution from a wire
    /// `{id, path, args?}` entry (spec §4.2, §6), which carries no name.
    /// Bypasses `new()`'s non-empty-name requirement: the id comes from
    /// the server, not a fresh `SequentialIdGenerator` draw, and the
    /// check is never registered in any `CheckGroup`.
    pub fn for_execution(id: u64, path: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            id,
            name: String::new(),
            path: path.into(),
            args: args.into(),
            enabled: true,
            current_status: Status::Unknown,
            previous_status: Status::Unknown,
            details: String::new(),
            data: None,
        }
    }

    fn absolute_path(&self, checks_dir: &Path) -> PathBuf {
        let p = Path::new(&self.path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            checks_dir.join(p)
        }
    }

    /// Execute the check locally (spec §4.2 algorithm). Never propagates
    /// a `CheckError` to the caller — every failure is converted into a
    /// `status = ERROR` outcome with a descriptive `details` string
    /// (spec §7).
    pub fn run(&mut self, user: &str, group: &str, enforce_ownership: bool, checks_dir: &Path) {
        match self.try_run(user, group, enforce_ownership, checks_dir) {
            Ok(reply) => {
                self.update_status(&reply);
            }
            Err(e) => {
                self.current_status = Status::Error;
                self.details = e.to_string();
            }
        }
    }

    fn try_run(
        &self,
        user: &str,
        group: &str,
        enforce_ownership: bool,
        checks_dir: &Path,
    ) -> Result<CheckReply, CheckError> {
        let absolute_path = self.absolute_path(checks_dir);

        if enforce_ownership {
            owned_by(&absolute_path, user, group)?;
        }

        let args = shell_words::split(&self.args).map_err(|e| CheckError::BadArgs(e.to_string()))?;

        let output = Command::new(&absolute_path)
            .args(&args)
            .output()
            .map_err(CheckError::Spawn)?;

        deserialize_output(self.id, &output.stdout)
    }
}

impl Identified for Check {
    fn id(&self) -> u64 {
        self.id
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl ToDict for Check {
    fn field(&self, name: &str) -> Value {
        match name {
            "id" => json!(self.id),
            "name" => json!(self.name),
            "path" => json!(self.path),
            "args" => json!(self.args),
            "current_status" => json!(self.current_status),
            "previous_status" => json!(self.previous_status),
            "details" => json!(self.details),
            "data" => self.data.clone().unwrap_or(Value::Null),
            "enabled" => json!(self.enabled),
            _ => Value::Null,
        }
    }
}

// Identity is the (name, path, args) triple — the id does not
// participate. This is intentional: two Checks with the same id but
// different `enabled`/`details` still collide in a `CheckGroup` (spec §9
// Open Question #2, preserved as-is).
impl PartialEq for Check {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.path == other.path && self.args == other.args
    }
}

impl Eq for Check {}

impl Hash for Check {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(hash_str(&self.name) ^ hash_str(&self.path) ^ hash_str(&self.args));
    }
}

pub(crate) fn hash_str(s: &str) -> u64 {
    let mut h = DefaultHasher::new();
    s.hash(&mut h);
    h.finish()
}

/// Shared-ownership handle into a server-owned registry (spec §9 design
/// note — replaces the source's `ctypes` pointer dereference trick).
/// Equality/hash are delegated to the locked `Check`'s identity triple,
/// which is safe because `name`/`path`/`args` never mutate after
/// construction.
#[derive(Clone)]
pub struct CheckHandle(pub Arc<Mutex<Check>>);

impl CheckHandle {
    pub fn new(check: Check) -> Self {
        Self(Arc::new(Mutex::new(check)))
    }

    pub fn update_status(&self, reply: &CheckReply) -> bool {
        self.lock().update_status(reply)
    }

    pub fn to_check_entries(&self) -> Vec<Value> {
        self.lock().to_check_entries()
    }

    pub fn id(&self) -> u64 {
        self.lock().id
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn current_status(&self) -> Status {
        self.lock().current_status
    }

    pub fn previous_status(&self) -> Status {
        self.lock().previous_status
    }

    pub fn to_dict(&self) -> serde_json::Map<String, Value> {
        self.lock().to_dict()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Check> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PartialEq for CheckHandle {
    fn eq(&self, other: &Self) -> bool {
        *self.lock() == *other.lock()
    }
}

impl Eq for CheckHandle {}

impl Hash for CheckHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lock().hash(state)
    }
}

/// Both user and group lookups receive the path — the source's
/// `_owned_by` forwarded `path` but then called `_owned_by_user(user)`
/// without it, which is a bug in the source (spec §9 Open Question #1).
/// This is the corrected form.
fn owned_by(path: &Path, user: &str, group: &str) -> Result<(), CheckError> {
    if owned_by_user(path, user)? && owned_by_group(path, group)? {
        Ok(())
    } else {
        Err(CheckError::NotOwned {
            path: path.display().to_string(),
            user: user.to_string(),
            group: group.to_string(),
        })
    }
}

#[cfg(unix)]
fn owned_by_user(path: &Path, user: &str) -> Result<bool, CheckError> {
    use std::os::unix::fs::MetadataExt;

    let uid = nix::unistd::User::from_name(user)
        .map_err(|_| CheckError::UnknownUser(user.to_string()))?
        .ok_or_else(|| CheckError::UnknownUser(user.to_string()))?
        .uid;
    let meta = std::fs::metadata(path).map_err(|e| CheckError::Stat(path.display().to_string(), e))?;
    Ok(uid.as_raw() == meta.uid())
}

#[cfg(unix)]
fn owned_by_group(path: &Path, group: &str) -> Result<bool, CheckError> {
    use std::os::unix::fs::MetadataExt;

    let gid = nix::unistd::Group::from_name(group)
        .map_err(|_| CheckError::UnknownGroup(group.to_string()))?
        .ok_or_else(|| CheckError::UnknownGroup(group.to_string()))?
        .gid;
    let meta = std::fs::metadata(path).map_err(|e| CheckError::Stat(path.display().to_string(), e))?;
    Ok(gid.as_raw() == meta.gid())
}

#[cfg(not(unix))]
fn owned_by_user(_path: &Path, user: &str) -> Result<bool, CheckError> {
    Err(CheckError::UnknownUser(user.to_string()))
}

#[cfg(not(unix))]
fn owned_by_group(_path: &Path, group: &str) -> Result<bool, CheckError> {
    Err(CheckError::UnknownGroup(group.to_string()))
}

fn deserialize_output(id: u64, output: &[u8]) -> Result<CheckReply, CheckError> {
    let raw: Value = serde_json::from_slice(output).map_err(CheckError::BadOutput)?;
    let obj = raw.as_object().ok_or(CheckError::MissingOrInvalidStatus)?;

    let mut details = None;
    let mut data = None;
    let mut status = None;

    for (key, value) in obj {
        match key.to_ascii_lowercase().as_str() {
            "status" => {
                let name = value.as_str().ok_or(CheckError::MissingOrInvalidStatus)?;
                status = Some(Status::from_name(name).ok_or(CheckError::MissingOrInvalidStatus)?);
            }
            "details" => details = value.as_str().map(str::to_owned),
            "data" => data = Some(value.clone()),
            _ => {}
        }
    }

    let status = status.ok_or(CheckError::MissingOrInvalidStatus)?;

    Ok(CheckReply {
        id,
        status: status.as_i64(),
        details,
        data,
    })
}
