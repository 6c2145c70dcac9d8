//! radar-server — accepts client connections, schedules check dispatch,
//! and fans replies out to plugins (spec §4.6, §4.7).

mod app;
mod config;
mod contact;
mod dispatcher;
mod monitor;
mod plugin;
mod plugins;
mod registry;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use app::ServerApp;
use config::ServerConfig;
use plugin::Plugin;
use plugins::log_plugin::LogPlugin;
use registry::Registry;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.clone())
        .with_target(true)
        .init();

    info!("radar-server starting");

    let registry = Arc::new(Registry::new());
    load_registry(&registry, &config);

    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(LogPlugin::new())];

    let stop = CancellationToken::new();
    let ctrlc_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            ctrlc_stop.cancel();
        }
    });

    let dispatcher = dispatcher::spawn(
        registry.clone(),
        plugins,
        config.dispatch_queue_capacity,
        config.log_runtime,
        stop.clone(),
    );

    let server = ServerApp::new(registry, dispatcher, config.dispatch_interval, config.max_frame_len, stop);

    if let Err(e) = server.run(&config.listen_addr).await {
        error!("accept loop failed: {e}");
    }

    info!("radar-server stopped");
}

/// Populates the registry from the minimal on-disk check/contact format
/// (spec.md Non-goals exclude YAML parsing — see DESIGN.md for the
/// substitute format this reads). Every monitor definition is turned
/// into a registered `CheckGroup` (C3) binding its checks to its
/// contacts (spec §4.6 step 2-3) — the only check-to-contact grouping
/// information in the program, so a monitor naming unknown check or
/// contact names just skips those names with a warning rather than
/// failing startup. No scoping of checks to specific clients is
/// implemented (a single flat check set is dispatched to every
/// connected client, documented as a simplification in DESIGN.md).
fn load_registry(registry: &Registry, config: &ServerConfig) {
    let mut checks_by_name = std::collections::HashMap::new();
    match monitor::load_checks(&config.checks_dir) {
        Ok(checks) => {
            for check in checks {
                let name = check.name.clone();
                let handle = registry.insert_check(check);
                checks_by_name.insert(name, handle);
            }
        }
        Err(e) => warn!("failed to load checks: {e}"),
    }

    let mut contacts_by_name = std::collections::HashMap::new();
    match monitor::load_contacts(&config.contacts_dir) {
        Ok(contacts) => {
            for contact in contacts {
                let name = contact.name.clone();
                let handle = registry.insert_contact(contact);
                contacts_by_name.insert(name, handle.id());
            }
        }
        Err(e) => warn!("failed to load contacts: {e}"),
    }

    match monitor::load_monitors(&config.monitors_dir) {
        Ok(monitors) => {
            let count = monitors.len();
            for monitor in monitors {
                register_monitor(registry, &monitor, &checks_by_name, &contacts_by_name);
            }
            info!(count, groups = registry.all_groups().len(), "loaded monitor definitions");
        }
        Err(e) => warn!("failed to load monitors: {e}"),
    }

    info!(checks = registry.all_checks().len(), "registry populated");
}

fn register_monitor(
    registry: &Registry,
    monitor: &monitor::MonitorDefinition,
    checks_by_name: &std::collections::HashMap<String, radar_proto::CheckHandle>,
    contacts_by_name: &std::collections::HashMap<String, u64>,
) {
    let checks: Vec<_> = monitor
        .check_names
        .iter()
        .filter_map(|name| {
            let handle = checks_by_name.get(name);
            if handle.is_none() {
                warn!(monitor = monitor.name, check = name, "monitor names an unknown check, skipping it");
            }
            handle.cloned()
        })
        .collect();

    let contact_ids: Vec<_> = monitor
        .contact_names
        .iter()
        .filter_map(|name| {
            let id = contacts_by_name.get(name);
            if id.is_none() {
                warn!(monitor = monitor.name, contact = name, "monitor names an unknown contact, skipping it");
            }
            id.copied()
        })
        .collect();

    if checks.is_empty() {
        warn!(monitor = monitor.name, "monitor has no resolvable checks, skipping it");
        return;
    }

    if let Err(e) = registry.register_monitor(&monitor.name, checks, contact_ids) {
        warn!(monitor = monitor.name, "failed to register monitor: {e}");
    }
}
