//! A telemetry collection agent for the RNP ViaIpe monitoring API

pub mod aggregate;
pub mod collector;
pub mod config;
pub mod error;
pub mod model;
pub mod retry;
pub mod source;
pub mod storage;
pub mod util;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::aggregate::aggregate;
    pub use crate::collector::Collector;
    pub use crate::config::AgentConfig;
    pub use crate::error::{AgentError, Result};
    pub use crate::model::{ClientReport, SummaryRecord};
    pub use crate::retry::retry_indefinitely;
    pub use crate::source::{ReportSource, ViaIpeSource};
    pub use crate::storage::{PostgresSink, SummarySink};
}

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
