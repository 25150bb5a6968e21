//! Scanning front door.
//!
//! This module connects engines to the outside world:
//! - File access with existence, permission and size checks
//! - The host-facing service (`initialize`, `load_rules_*`, `scan_*`)

pub mod file;
pub mod service;

pub use file::FileStore;
pub use service::ScanService;
