//! Server-owned registry of Check/Contact handles (spec §9 design
//! note): a read-mostly `DashMap` keyed by id, replacing the source's
//! raw-pointer handle-passing so the plugin dispatcher can resolve
//! opaque integer ids without duplicating the underlying objects.
//! Grounded on the teacher's `DashMap`-backed `connections` map in
//! `state.rs`.
//!
//! `monitors`/`monitor_contacts` wire `CheckGroup` (C3) into the
//! registry: `main.rs` builds one `CheckGroup` per `monitors.conf`
//! entry via `register_monitor`, and every check bound to a monitor
//! gets that monitor's contacts recorded against its id — the only
//! grouping the program has (spec §4.6 step 2, §9).

use dashmap::DashMap;
use radar_proto::{Check, CheckError, CheckGroup, CheckHandle, CheckReply};

use crate::contact::{Contact, ContactHandle};

pub struct Registry {
    checks: DashMap<u64, CheckHandle>,
    contacts: DashMap<u64, ContactHandle>,
    groups: DashMap<u64, CheckGroup>,
    /// check id -> the union of contact ids bound to it via every
    /// monitor that names it. A check with no entry here belongs to no
    /// monitor and so has nothing configured to notify.
    monitor_contacts: DashMap<u64, Vec<u64>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            checks: DashMap::new(),
            contacts: DashMap::new(),
            groups: DashMap::new(),
            monitor_contacts: DashMap::new(),
        }
    }

    pub fn insert_check(&self, check: Check) -> CheckHandle {
        let handle = CheckHandle::new(check);
        self.checks.insert(handle.id(), handle.clone());
        handle
    }

    pub fn insert_contact(&self, contact: Contact) -> ContactHandle {
        let handle = ContactHandle::new(contact);
        self.contacts.insert(handle.id(), handle.clone());
        handle
    }

    /// Binds `checks` into one named `CheckGroup` (spec §4.3) and
    /// records `contact_ids` against every one of those checks, so a
    /// reply naming any of them notifies exactly the contacts its
    /// monitor names — never every registered contact. Fails if `name`
    /// or `checks` is empty (the same construction rule `CheckGroup`
    /// itself enforces).
    pub fn register_monitor(&self, name: &str, checks: Vec<CheckHandle>, contact_ids: Vec<u64>) -> Result<(), CheckError> {
        for check in &checks {
            self.monitor_contacts
                .entry(check.id())
                .or_default()
                .extend(contact_ids.iter().copied());
        }

        let group = CheckGroup::new(name, checks)?;
        self.groups.insert(group.id, group);
        Ok(())
    }

    pub fn get_check(&self, id: u64) -> Option<CheckHandle> {
        self.checks.get(&id).map(|entry| entry.value().clone())
    }

    pub fn get_contact(&self, id: u64) -> Option<ContactHandle> {
        self.contacts.get(&id).map(|entry| entry.value().clone())
    }

    pub fn all_checks(&self) -> Vec<CheckHandle> {
        self.checks.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn all_groups(&self) -> Vec<CheckGroup> {
        self.groups.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Contacts bound to `check_id` via every monitor naming it (spec
    /// §4.6 step 3). Empty when the check belongs to no monitor — not
    /// every registered contact.
    pub fn contacts_for_check(&self, check_id: u64) -> Vec<u64> {
        self.monitor_contacts.get(&check_id).map(|entry| entry.value().clone()).unwrap_or_default()
    }

    /// Applies a reply to the check it names (spec §4.6 step 2). An
    /// unmatched id is silently skipped, not an error.
    ///
    /// This mutates the canonical `CheckHandle` exactly once. It
    /// satisfies "update every Check/CheckGroup bound to the client"
    /// (spec §4.6 step 2) without a second, corrupting call to
    /// `CheckGroup::update_status`: every group a check belongs to
    /// holds a clone of this *same* `Arc<Mutex<Check>>` (the
    /// shared-ownership handle of spec §9's design note), so the one
    /// mutation here is immediately visible through every group too —
    /// calling `update_status` again via a containing group would
    /// reapply the same reply to the same object and rotate
    /// `previous_status` a second time.
    pub fn apply_reply(&self, reply: &CheckReply) -> bool {
        self.get_check(reply.id)
            .map(|handle| handle.update_status(reply))
            .unwrap_or(false)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_proto::Status;

    #[test]
    fn apply_reply_skips_unmatched_id() {
        let registry = Registry::new();
        let check = Check::new("Load average", "load_average.py", "").unwrap();
        registry.insert_check(check);

        let reply = CheckReply {
            id: 999_999,
            status: Status::Ok.as_i64(),
            details: None,
            data: None,
        };
        assert!(!registry.apply_reply(&reply));
    }

    #[test]
    fn apply_reply_updates_matched_check() {
        let registry = Registry::new();
        let check = Check::new("Load average", "load_average.py", "").unwrap();
        let handle = registry.insert_check(check);

        let reply = CheckReply {
            id: handle.id(),
            status: Status::Warning.as_i64(),
            details: Some("high load".into()),
            data: None,
        };
        assert!(registry.apply_reply(&reply));
        assert_eq!(handle.current_status(), Status::Warning);
    }

    #[test]
    fn register_monitor_builds_a_check_group_and_binds_contacts() {
        let registry = Registry::new();
        let handle = registry.insert_check(Check::new("Load average", "load_average.py", "").unwrap());
        let contact = registry.insert_contact(Contact::new("Ops", "ops@example.com").unwrap());

        registry
            .register_monitor("Host health", vec![handle.clone()], vec![contact.id()])
            .unwrap();

        assert_eq!(registry.all_groups().len(), 1);
        assert_eq!(registry.contacts_for_check(handle.id()), vec![contact.id()]);
    }

    #[test]
    fn a_check_with_no_monitor_has_no_bound_contacts() {
        let registry = Registry::new();
        let handle = registry.insert_check(Check::new("Load average", "load_average.py", "").unwrap());
        registry.insert_contact(Contact::new("Ops", "ops@example.com").unwrap());

        assert!(registry.contacts_for_check(handle.id()).is_empty());
    }

    #[test]
    fn applying_a_reply_is_reflected_through_the_check_group() {
        let registry = Registry::new();
        let handle = registry.insert_check(Check::new("Load average", "load_average.py", "").unwrap());
        registry.register_monitor("Host health", vec![handle.clone()], vec![]).unwrap();

        let reply = CheckReply {
            id: handle.id(),
            status: Status::Severe.as_i64(),
            details: None,
            data: None,
        };
        assert!(registry.apply_reply(&reply));

        let group = registry.all_groups().into_iter().next().unwrap();
        let member = group.as_list().into_iter().next().unwrap();
        assert_eq!(member.current_status(), Status::Severe);
        // Rotated exactly once: previous_status is the pre-reply value,
        // not clobbered by a second application through the group.
        assert_eq!(member.previous_status(), Status::Unknown);
    }

    #[test]
    fn register_monitor_rejects_an_empty_check_list() {
        let registry = Registry::new();
        assert!(registry.register_monitor("Empty", vec![], vec![]).is_err());
    }
}
