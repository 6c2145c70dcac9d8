pub mod log_plugin;
