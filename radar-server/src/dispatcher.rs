//! Plugin dispatcher (spec §4.7, §9) — a single worker draining a
//! bounded FIFO and fanning each reply out to every enabled plugin.
//!
//! Grounded on the teacher's single-consumer background-task pattern
//! (`client-rust/src/lib.rs`'s `ws_task` owning an `mpsc::Receiver`) and
//! its `tokio::spawn`-per-lifecycle-task style in `lifecycle.rs`.
//! Scheduling is cooperative: `mpsc::Receiver::recv` already parks the
//! task without polling when the queue is empty, which satisfies the
//! spec's "sleep up to STOP_EVENT_TIMEOUT" clause more directly than a
//! poll loop would.

use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use radar_proto::MessageType;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::plugin::Plugin;
use crate::registry::Registry;

/// One fan-out job: the opaque id lists are resolved against the
/// `Registry` on the worker side rather than carrying live handles
/// across the channel (spec §9 design note).
#[derive(Debug, Clone)]
pub struct DispatchMessage {
    pub client_address: IpAddr,
    pub client_port: u16,
    pub message_type: MessageType,
    pub check_ids: Vec<u64>,
    pub contact_ids: Vec<u64>,
}

/// Handle used by the rest of the server to enqueue dispatch messages.
/// Cloning is cheap — it's just a channel sender.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<DispatchMessage>,
}

impl DispatcherHandle {
    /// Enqueue a message. Drops it silently if the queue is full — a
    /// saturated plugin dispatcher degrades by losing the newest
    /// notification rather than blocking the server's reader task
    /// (mirrors the client's outbound-queue policy of never letting a
    /// slow consumer stall the producer, spec §9 Open Question #3).
    pub fn dispatch(&self, message: DispatchMessage) {
        if self.tx.try_send(message).is_err() {
            warn!("plugin dispatch queue full, dropping message");
        }
    }
}

/// Spawns the dispatcher worker and returns a handle to feed it.
/// `plugins` is consumed by the worker task; `on_shutdown` is called on
/// every plugin exactly once, in construction (i.e. `Vec`) order, when
/// `stop` is cancelled.
pub fn spawn(
    registry: Arc<Registry>,
    plugins: Vec<Box<dyn Plugin>>,
    queue_capacity: usize,
    log_runtime: bool,
    stop: CancellationToken,
) -> DispatcherHandle {
    let (tx, rx) = mpsc::channel(queue_capacity);
    tokio::spawn(run(registry, plugins, rx, log_runtime, stop));
    DispatcherHandle { tx }
}

async fn run(
    registry: Arc<Registry>,
    mut plugins: Vec<Box<dyn Plugin>>,
    mut rx: mpsc::Receiver<DispatchMessage>,
    log_runtime: bool,
    stop: CancellationToken,
) {
    for plugin in &mut plugins {
        plugin.on_start().await;
    }

    loop {
        let message = tokio::select! {
            _ = stop.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        process(&registry, &mut plugins, message, log_runtime).await;
    }

    for plugin in &mut plugins {
        plugin.on_shutdown().await;
    }
}

/// Resolve the message's opaque ids against the registry, then invoke
/// every enabled plugin in order. Each invocation is isolated: a panic
/// (caught via `catch_unwind`) or a returned `PluginError` is logged
/// with the plugin's name/version and never prevents the remaining
/// plugins — or the next queued message — from running (spec §4.7.3,
/// §8 testable property 8).
async fn process(registry: &Registry, plugins: &mut [Box<dyn Plugin>], message: DispatchMessage, log_runtime: bool) {
    let checks: Vec<_> = message.check_ids.iter().filter_map(|id| registry.get_check(*id)).collect();
    let contacts: Vec<_> = message
        .contact_ids
        .iter()
        .filter_map(|id| registry.get_contact(*id))
        .collect();

    for plugin in plugins.iter_mut() {
        if !plugin.enabled() {
            continue;
        }

        let started = Instant::now();
        let outcome = AssertUnwindSafe(invoke(plugin.as_mut(), &message, &checks, &contacts))
            .catch_unwind()
            .await;

        if log_runtime {
            debug!(
                plugin = plugin.name(),
                version = plugin.version(),
                elapsed_ms = started.elapsed().as_millis(),
                "plugin invocation complete"
            );
        }

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(plugin = plugin.name(), version = plugin.version(), "plugin error: {e}");
            }
            Err(_) => {
                error!(plugin = plugin.name(), version = plugin.version(), "plugin panicked");
            }
        }
    }
}

async fn invoke(
    plugin: &mut dyn Plugin,
    message: &DispatchMessage,
    checks: &[radar_proto::CheckHandle],
    contacts: &[crate::contact::ContactHandle],
) -> Result<(), crate::plugin::PluginError> {
    match message.message_type {
        MessageType::CheckReply => {
            plugin
                .on_check_reply(message.client_address, message.client_port, checks, contacts)
                .await
        }
        MessageType::TestReply => {
            plugin
                .on_test_reply(message.client_address, message.client_port, checks, contacts)
                .await
        }
        MessageType::Check | MessageType::Test => Ok(()),
    }
}
