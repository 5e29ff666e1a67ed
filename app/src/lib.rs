pub mod app;
pub mod config;
pub mod ui;

pub use app::{ChatApp, LineOutcome, Services};
pub use config::{apply_overrides, load_settings, storage_root, Overrides};
