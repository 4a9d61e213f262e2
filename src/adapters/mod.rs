//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to               |
//! |----------------|--------------------|---------------------------|
//! | `config_file`  | ConfigPort         | `config.json` on disk     |
//! | `file_store`   | RecipeStore        | `<data_dir>/recipes`      |
//! |                | LogStore           | `<data_dir>/logs`         |
//! | `log_sink`     | NotificationPort   | Process log output        |
//! | `probe`        | HealthProbe        | Brewing server over HTTP  |
//!
//! Relays and thermometers live in `drivers` and `sensors`.

pub mod config_file;
pub mod file_store;
pub mod log_sink;
pub mod probe;
