//! Client application (spec §4.5): owns the socket, the reconnect
//! state machine, the inbound/outbound queues, and the workers that
//! execute checks and ship their replies back.
//!
//! Naming follows the spec: the **inbound queue** holds replies
//! pending delivery to the server (drained by `on_timeout`); the
//! **outbound queue** holds decoded messages just received from the
//! server (filled by `on_receive`, drained by the check-execution
//! worker). The overflow policy for the outbound queue is drop-oldest
//! (`DroppingQueue`); the inbound queue is an ordinary bounded
//! `mpsc::channel`.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use radar_proto::config::{ConnectConfig, RunAsConfig};
use radar_proto::wire::{self, Frame, MessageType};
use radar_proto::Check;
use serde_json::Value;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{self, ConnectionHandler};
use crate::queue::DroppingQueue;

const RECONNECT_DELAYS: [u64; 3] = [5, 15, 60];
const OUTBOUND_QUEUE_CAPACITY: usize = 256;
const INBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Stopped = 3,
}

impl ClientState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ClientState::Disconnected,
            1 => ClientState::Connecting,
            2 => ClientState::Connected,
            _ => ClientState::Stopped,
        }
    }
}

/// Rotating `[5, 15, 60]` second reconnect delays (spec §4.5). Never
/// applies jitter or exponential backoff — the exact rotation is a
/// tested property (spec §8).
struct ReconnectCycle {
    delays: VecDeque<Duration>,
}

impl ReconnectCycle {
    fn new() -> Self {
        Self {
            delays: RECONNECT_DELAYS.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.delays.pop_front().expect("delay list is never empty");
        self.delays.push_back(delay);
        delay
    }
}

pub struct ClientApp {
    connect: ConnectConfig,
    run_as: RunAsConfig,
    checks_dir: PathBuf,
    max_frame_len: u32,
    state: AtomicU8,
    stop: CancellationToken,
}

impl ClientApp {
    pub fn new(connect: ConnectConfig, run_as: RunAsConfig, checks_dir: PathBuf, max_frame_len: u32, stop: CancellationToken) -> Self {
        Self {
            connect,
            run_as,
            checks_dir,
            max_frame_len,
            state: AtomicU8::new(ClientState::Disconnected as u8),
            stop,
        }
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: ClientState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    fn is_stopped(&self) -> bool {
        self.state() == ClientState::Stopped
    }

    fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected
    }

    /// Drives the connect/run/reconnect state machine until stopped.
    pub async fn run(&self) {
        let mut cycle = ReconnectCycle::new();

        // Supplemental doubled guard (original_source/radar/client):
        // don't loop back into a connect attempt once the state
        // machine has already settled on Stopped or is already
        // Connected from a prior iteration.
        while !self.is_stopped() {
            self.set_state(ClientState::Connecting);
            info!(to = %self.connect.to, port = self.connect.port, "connecting");

            match TcpStream::connect((self.connect.to.as_str(), self.connect.port)).await {
                Ok(stream) => {
                    cycle = ReconnectCycle::new();
                    self.set_state(ClientState::Connected);
                    self.run_connection(stream).await;
                    if self.is_stopped() {
                        break;
                    }
                    self.set_state(ClientState::Disconnected);
                }
                Err(e) => {
                    warn!("connect failed: {e}");
                    if !self.connect.reconnect {
                        self.set_state(ClientState::Stopped);
                        break;
                    }
                    self.set_state(ClientState::Disconnected);
                }
            }

            if self.is_stopped() || self.is_connected() {
                continue;
            }

            let delay = cycle.next_delay();
            debug!(?delay, "reconnect backoff");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.stop.cancelled() => {
                    self.set_state(ClientState::Stopped);
                    break;
                }
            }
        }
    }

    async fn run_connection(&self, stream: TcpStream) {
        let outbound = Arc::new(DroppingQueue::<(MessageType, Value)>::new(OUTBOUND_QUEUE_CAPACITY));
        let (inbound_tx, inbound_rx) = mpsc::channel::<Value>(INBOUND_QUEUE_CAPACITY);

        let worker_stop = self.stop.clone();
        let worker = tokio::spawn(run_check_worker(
            outbound.clone(),
            inbound_tx,
            self.run_as.clone(),
            self.checks_dir.clone(),
            worker_stop,
        ));

        let mut handler = ClientHandler { outbound, inbound_rx };
        connection::run(stream, self.max_frame_len, self.stop.clone(), &mut handler).await;
        worker.abort();
    }
}

struct ClientHandler {
    outbound: Arc<DroppingQueue<(MessageType, Value)>>,
    inbound_rx: mpsc::Receiver<Value>,
}

#[async_trait]
impl ConnectionHandler for ClientHandler {
    async fn on_receive(&mut self, frame: Frame) {
        match serde_json::from_slice::<Value>(&frame.body) {
            Ok(message) => self.outbound.push((frame.msg_type, message)),
            Err(e) => warn!("dropping unparseable frame: {e}"),
        }
    }

    async fn on_timeout(&mut self, writer: &mut OwnedWriteHalf) {
        if let Ok(reply) = self.inbound_rx.try_recv() {
            if let Err(e) = wire::send_json(writer, MessageType::CheckReply, &reply).await {
                warn!("failed to send check reply: {e}");
            }
        }
    }

    async fn on_disconnect(&mut self) {
        debug!("connection closed");
    }
}

struct CheckEntry {
    id: u64,
    path: String,
    args: String,
}

/// Parse a `[{id, path, args?}, ...]` CHECK payload (spec §4.2, §6).
/// Malformed entries are skipped rather than aborting the whole batch.
fn parse_check_entries(value: &Value) -> Vec<CheckEntry> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_u64()?;
            let path = entry.get("path")?.as_str()?.to_string();
            let args = entry.get("args").and_then(Value::as_str).unwrap_or("").to_string();
            Some(CheckEntry { id, path, args })
        })
        .collect()
}

/// Drains the outbound queue, executes each CHECK entry locally, and
/// forwards the resulting reply payload on `inbound_tx` for
/// `on_timeout` to ship back to the server.
async fn run_check_worker(
    outbound: Arc<DroppingQueue<(MessageType, Value)>>,
    inbound_tx: mpsc::Sender<Value>,
    run_as: RunAsConfig,
    checks_dir: PathBuf,
    stop: CancellationToken,
) {
    loop {
        let (msg_type, message) = tokio::select! {
            _ = stop.cancelled() => break,
            item = outbound.pop() => item,
        };

        if msg_type != MessageType::Check {
            continue;
        }

        for entry in parse_check_entries(&message) {
            let run_as = run_as.clone();
            let checks_dir = checks_dir.clone();
            let inbound_tx = inbound_tx.clone();

            tokio::spawn(async move {
                let payload = tokio::task::spawn_blocking(move || {
                    let mut check = Check::for_execution(entry.id, entry.path, entry.args);
                    check.run(&run_as.user, &run_as.group, run_as.enforce_ownership, &checks_dir);
                    check.to_check_reply_payload()
                })
                .await;

                match payload {
                    Ok(payload) => {
                        let _ = inbound_tx.send(payload).await;
                    }
                    Err(e) => warn!("check execution task panicked: {e}"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_cycle_rotates_in_order() {
        let mut cycle = ReconnectCycle::new();
        let observed: Vec<u64> = (0..6).map(|_| cycle.next_delay().as_secs()).collect();
        assert_eq!(observed, vec![5, 15, 60, 5, 15, 60]);
    }

    #[test]
    fn parse_check_entries_skips_malformed_and_keeps_valid() {
        let value = serde_json::json!([
            {"id": 1, "path": "free_ram.py", "args": "-v"},
            {"id": 2},
            {"path": "missing_id.py"},
        ]);
        let entries = parse_check_entries(&value);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].path, "free_ram.py");
        assert_eq!(entries[0].args, "-v");
    }

    #[test]
    fn parse_check_entries_defaults_missing_args_to_empty() {
        let value = serde_json::json!([{"id": 3, "path": "check.py"}]);
        let entries = parse_check_entries(&value);
        assert_eq!(entries[0].args, "");
    }

    // End-to-end: a CHECK payload pushed onto the outbound queue drives a
    // real subprocess, and the resulting reply payload surfaces on the
    // inbound channel `on_timeout` would drain (spec §4.5, S1).
    #[cfg(unix)]
    #[tokio::test]
    async fn run_check_worker_executes_a_dispatched_check_and_reports_the_reply() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ok.sh");
        std::fs::write(&script, "#!/bin/sh\ncat <<'EOF'\n{\"status\":\"OK\",\"details\":\"fine\"}\nEOF\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let outbound = Arc::new(DroppingQueue::<(MessageType, Value)>::new(8));
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<Value>(8);
        let stop = CancellationToken::new();
        let run_as = RunAsConfig {
            user: "ignored".into(),
            group: "ignored".into(),
            enforce_ownership: false,
        };

        let worker = tokio::spawn(run_check_worker(
            outbound.clone(),
            inbound_tx,
            run_as,
            dir.path().to_path_buf(),
            stop.clone(),
        ));

        outbound.push((MessageType::Check, serde_json::json!([{"id": 7, "path": "ok.sh"}])));

        let reply = tokio::time::timeout(Duration::from_secs(5), inbound_rx.recv())
            .await
            .expect("worker should report a reply")
            .expect("channel should stay open");

        assert_eq!(reply["id"], 7);
        assert_eq!(reply["current_status"], 0);
        assert_eq!(reply["details"], "fine");

        stop.cancel();
        worker.abort();
    }
}
