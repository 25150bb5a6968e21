//! rulescan: a rule-based content scanner
//!
//! This crate validates and parses YARA-like rule sets, evaluates them
//! against in-memory buffers and files, and reports the first satisfied rule
//! as the threat verdict. A keyword-based fallback engine can stand in when
//! the precise engine is unavailable.

pub mod core;
pub mod detection;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
pub use crate::detection::{build_scanner, ContentScanner, ScanEngine, ScanResult};
pub use crate::scanner::ScanService;
