//! Server application (spec §4.6): accepts clients, schedules periodic
//! check dispatch, and routes replies into the plugin dispatcher queue.
//!
//! Grounded on the teacher's accept-and-spawn-per-connection shape
//! (`server/src/main.rs`'s `axum::serve` handing each upgrade to
//! `ws::ws_handler`) and its `tokio::select!` read/tick loop
//! (`client-rust/src/lib.rs`'s `ws_task`) — generalized here to the raw
//! framed TCP protocol of spec §4.1 instead of a WebSocket/HTTP stack,
//! since spec.md's Non-goals carry no HTTP surface at all.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use radar_proto::wire::{self, MessageType};
use radar_proto::CheckReply;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::{DispatchMessage, DispatcherHandle};
use crate::registry::Registry;

pub struct ServerApp {
    registry: Arc<Registry>,
    dispatcher: DispatcherHandle,
    dispatch_interval: Duration,
    max_frame_len: u32,
    stop: CancellationToken,
}

impl ServerApp {
    pub fn new(
        registry: Arc<Registry>,
        dispatcher: DispatcherHandle,
        dispatch_interval: Duration,
        max_frame_len: u32,
        stop: CancellationToken,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            dispatch_interval,
            max_frame_len,
            stop,
        }
    }

    /// Accepts connections on `listen_addr` until stopped. Each
    /// accepted client gets its own reader task (spec §5 — "a reader
    /// worker thread per client").
    pub async fn run(&self, listen_addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(listen_addr).await?;
        info!(addr = listen_addr, "listening");

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => {
                    info!("accept loop stopping");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let registry = self.registry.clone();
                            let dispatcher = self.dispatcher.clone();
                            let dispatch_interval = self.dispatch_interval;
                            let max_frame_len = self.max_frame_len;
                            let stop = self.stop.clone();
                            tokio::spawn(async move {
                                handle_client(stream, addr, registry, dispatcher, dispatch_interval, max_frame_len, stop).await;
                            });
                        }
                        Err(e) => warn!("accept failed: {e}"),
                    }
                }
            }
        }

        Ok(())
    }
}

/// Owns one client connection: periodically sends a CHECK dispatch of
/// every registered check, and processes CHECK REPLY / TEST REPLY
/// frames as they arrive (spec §4.6).
async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<Registry>,
    dispatcher: DispatcherHandle,
    dispatch_interval: Duration,
    max_frame_len: u32,
    stop: CancellationToken,
) {
    info!(%addr, "client connected");
    let (mut reader, mut writer) = stream.into_split();
    let mut tick = interval(dispatch_interval);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tick.tick() => {
                let entries: Vec<Value> = registry
                    .all_checks()
                    .iter()
                    .flat_map(|c| c.to_check_entries())
                    .collect();
                if !entries.is_empty() {
                    if let Err(e) = wire::send_json(&mut writer, MessageType::Check, &entries).await {
                        warn!(%addr, "failed to send check dispatch: {e}");
                        break;
                    }
                }
            }
            received = wire::read_frame(&mut reader, max_frame_len) => {
                match received {
                    Ok(frame) if frame.msg_type == MessageType::CheckReply => {
                        handle_check_reply(&frame.body, addr, &registry, &dispatcher);
                    }
                    Ok(frame) if frame.msg_type == MessageType::TestReply => {
                        handle_test_reply(&frame.body, addr, &registry, &dispatcher);
                    }
                    Ok(_) => {} // CHECK/TEST frames arriving from a client are ignored
                    Err(e) => {
                        warn!(%addr, "connection read failed: {e}");
                        break;
                    }
                }
            }
        }
    }

    info!(%addr, "client disconnected");
}

/// A CHECK REPLY body is, per the client's own framing, a single
/// `{id, status, details?, data?}` object per frame; §4.6 also allows
/// for an array of such dicts in one frame. Both are accepted here.
fn entries_from_body(body: &[u8]) -> Option<Vec<Value>> {
    let value: Value = serde_json::from_slice(body).ok()?;
    Some(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Applies each reply in the frame to the registered Check (spec
/// §4.6.2 — an unmatched id is silently skipped) and enqueues one
/// plugin-dispatcher message per successfully-applied reply, naming
/// only the contacts bound to that check's monitor(s) (spec §4.6.3) —
/// never every registered contact.
fn handle_check_reply(body: &[u8], addr: SocketAddr, registry: &Registry, dispatcher: &DispatcherHandle) {
    let Some(entries) = entries_from_body(body) else {
        warn!(%addr, "invalid CHECK REPLY JSON");
        return;
    };

    for entry in &entries {
        match CheckReply::from_value(entry) {
            Ok(reply) => {
                if registry.apply_reply(&reply) {
                    dispatcher.dispatch(DispatchMessage {
                        client_address: addr.ip(),
                        client_port: addr.port(),
                        message_type: MessageType::CheckReply,
                        check_ids: vec![reply.id],
                        contact_ids: registry.contacts_for_check(reply.id),
                    });
                } else {
                    debug!(%addr, id = reply.id, "reply id not registered, skipped");
                }
            }
            Err(e) => warn!(%addr, "dropping malformed check reply: {e}"),
        }
    }
}

/// TEST REPLY is symmetric to CHECK REPLY (spec §6) but carries no
/// Check state to mutate — it exists only so plugins can filter on it.
fn handle_test_reply(body: &[u8], addr: SocketAddr, registry: &Registry, dispatcher: &DispatcherHandle) {
    let Some(entries) = entries_from_body(body) else {
        warn!(%addr, "invalid TEST REPLY JSON");
        return;
    };

    for entry in &entries {
        let Some(id) = entry.get("id").and_then(Value::as_u64) else {
            continue;
        };
        dispatcher.dispatch(DispatchMessage {
            client_address: addr.ip(),
            client_port: addr.port(),
            message_type: MessageType::TestReply,
            check_ids: vec![id],
            contact_ids: registry.contacts_for_check(id),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Plugin, PluginError};
    use async_trait::async_trait;
    use radar_proto::{Check, CheckHandle, Status};
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    struct CountingPlugin {
        calls: StdArc<AtomicUsize>,
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            "counting"
        }
        fn version(&self) -> &str {
            "1.0"
        }
        async fn on_check_reply(
            &mut self,
            _addr: std::net::IpAddr,
            _port: u16,
            checks: &[CheckHandle],
            _contacts: &[crate::contact::ContactHandle],
        ) -> Result<(), PluginError> {
            for check in checks {
                assert_eq!(check.current_status(), Status::Warning);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct RecordingPlugin {
        seen_contact_ids: StdArc<std::sync::Mutex<Vec<u64>>>,
    }

    #[async_trait]
    impl Plugin for RecordingPlugin {
        fn name(&self) -> &str {
            "recording"
        }
        fn version(&self) -> &str {
            "1.0"
        }
        async fn on_check_reply(
            &mut self,
            _addr: std::net::IpAddr,
            _port: u16,
            _checks: &[CheckHandle],
            contacts: &[crate::contact::ContactHandle],
        ) -> Result<(), PluginError> {
            self.seen_contact_ids
                .lock()
                .unwrap()
                .extend(contacts.iter().map(|c| c.id()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn happy_check_reply_updates_status_and_dispatches() {
        let registry = StdArc::new(Registry::new());
        let check = Check::new("Load average", "load_average.py", "").unwrap();
        let handle = registry.insert_check(check);
        let id = handle.id();

        let calls = StdArc::new(AtomicUsize::new(0));
        let dispatcher = crate::dispatcher::spawn(
            registry.clone(),
            vec![Box::new(CountingPlugin { calls: calls.clone() })],
            16,
            false,
            CancellationToken::new(),
        );

        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5555);
        handle_check_reply(
            &serde_json::to_vec(&serde_json::json!({"id": id, "status": Status::Warning.as_i64()})).unwrap(),
            peer,
            &registry,
            &dispatcher,
        );

        assert_eq!(handle.current_status(), Status::Warning);

        // Allow the dispatcher's spawned worker task to drain its queue.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn check_reply_only_dispatches_contacts_bound_to_that_checks_monitor() {
        let registry = StdArc::new(Registry::new());
        let monitored = registry.insert_check(Check::new("Load average", "load_average.py", "").unwrap());
        let unmonitored = registry.insert_check(Check::new("Free RAM", "free_ram.py", "").unwrap());
        let ops = registry.insert_contact(crate::contact::Contact::new("Ops", "ops@example.com").unwrap());
        registry.insert_contact(crate::contact::Contact::new("Oncall", "oncall@example.com").unwrap());
        registry.register_monitor("Host health", vec![monitored.clone()], vec![ops.id()]).unwrap();

        let seen = StdArc::new(std::sync::Mutex::new(Vec::new()));
        let dispatcher = crate::dispatcher::spawn(
            registry.clone(),
            vec![Box::new(RecordingPlugin { seen_contact_ids: seen.clone() })],
            16,
            false,
            CancellationToken::new(),
        );

        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5555);

        // Reply for the monitored check: only Ops should be dispatched.
        handle_check_reply(
            &serde_json::to_vec(&serde_json::json!({"id": monitored.id(), "status": Status::Warning.as_i64()})).unwrap(),
            peer,
            &registry,
            &dispatcher,
        );
        // Reply for a check bound to no monitor: no contacts dispatched.
        handle_check_reply(
            &serde_json::to_vec(&serde_json::json!({"id": unmonitored.id(), "status": Status::Warning.as_i64()})).unwrap(),
            peer,
            &registry,
            &dispatcher,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec![ops.id()]);
    }

    #[test]
    fn entries_from_body_accepts_single_object_or_array() {
        let single = entries_from_body(br#"{"id":1,"status":0}"#).unwrap();
        assert_eq!(single.len(), 1);

        let array = entries_from_body(br#"[{"id":1,"status":0},{"id":2,"status":1}]"#).unwrap();
        assert_eq!(array.len(), 2);

        assert!(entries_from_body(b"not json").is_none());
    }
}
