//! Minimal on-disk check/contact/monitor loader (supplemental C11).
//!
//! YAML configuration parsing is explicitly out of scope, but the
//! server still needs *some* way to populate its registries to be
//! runnable. This is a line-oriented, tab-separated substitute, not a
//! reimplementation of the YAML format: non-blank, non-`#`-prefixed
//! lines of `<dir>/checks.conf` are `name<TAB>path<TAB>args`
//! (args optional); `<dir>/contacts.conf` is `name<TAB>target`;
//! `<dir>/monitors.conf` is
//! `monitor_name<TAB>check_name[,check_name...]<TAB>contact_name[,contact_name...]`
//! (contacts optional) — this is the only grouping information in the
//! program, so `main.rs` uses it to bind checks to a `CheckGroup` *and*
//! to the contacts that should be notified for them (spec §4.6 step 2,
//! §2 C3).

use std::fs;
use std::path::Path;

use radar_proto::{Check, CheckError};

use crate::contact::{Contact, ContactError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't read '{0}': {1}")]
    Read(String, std::io::Error),
    #[error("invalid check definition: {0}")]
    Check(#[from] CheckError),
    #[error("invalid contact definition: {0}")]
    Contact(#[from] ContactError),
}

pub struct MonitorDefinition {
    pub name: String,
    pub check_names: Vec<String>,
    pub contact_names: Vec<String>,
}

pub fn load_checks(dir: &Path) -> Result<Vec<Check>, ConfigError> {
    read_lines(&dir.join("checks.conf"))?
        .into_iter()
        .map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next().unwrap_or("");
            let path = fields.next().unwrap_or("");
            let args = fields.next().unwrap_or("");
            Check::new(name, path, args).map_err(ConfigError::from)
        })
        .collect()
}

pub fn load_contacts(dir: &Path) -> Result<Vec<Contact>, ConfigError> {
    read_lines(&dir.join("contacts.conf"))?
        .into_iter()
        .map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next().unwrap_or("");
            let target = fields.next().unwrap_or("");
            Contact::new(name, target).map_err(ConfigError::from)
        })
        .collect()
}

pub fn load_monitors(dir: &Path) -> Result<Vec<MonitorDefinition>, ConfigError> {
    Ok(read_lines(&dir.join("monitors.conf"))?
        .into_iter()
        .map(|line| {
            let mut fields = line.splitn(3, '\t');
            let name = fields.next().unwrap_or("").to_string();
            let check_names = split_names(fields.next().unwrap_or(""));
            let contact_names = split_names(fields.next().unwrap_or(""));
            MonitorDefinition {
                name,
                check_names,
                contact_names,
            }
        })
        .collect())
}

fn split_names(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns an empty set rather than an error when the file itself is
/// absent — an unconfigured server with no checks yet is a valid
/// startup state, not a fatal one.
fn read_lines(path: &Path) -> Result<Vec<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ConfigError::Read(path.display().to_string(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_checks_with_and_without_args() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("checks.conf"),
            "# comment\nLoad average\tload_average.py\t\nFree RAM\tfree_ram.py\t--bytes\n",
        )
        .unwrap();

        let checks = load_checks(dir.path()).unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name, "Load average");
        assert_eq!(checks[1].args, "--bytes");
    }

    #[test]
    fn missing_file_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_checks(dir.path()).unwrap().is_empty());
        assert!(load_contacts(dir.path()).unwrap().is_empty());
        assert!(load_monitors(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn loads_monitors_with_comma_separated_check_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("monitors.conf"), "Disk health\tFree RAM,Load average\n").unwrap();

        let monitors = load_monitors(dir.path()).unwrap();
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].name, "Disk health");
        assert_eq!(monitors[0].check_names, vec!["Free RAM", "Load average"]);
        assert!(monitors[0].contact_names.is_empty());
    }

    #[test]
    fn loads_monitors_with_comma_separated_contact_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("monitors.conf"),
            "Disk health\tFree RAM,Load average\tOps,Oncall\n",
        )
        .unwrap();

        let monitors = load_monitors(dir.path()).unwrap();
        assert_eq!(monitors[0].contact_names, vec!["Ops", "Oncall"]);
    }
}
