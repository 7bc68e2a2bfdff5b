//! Security event monitoring and IP blocking

pub mod blocklist;
pub mod monitor;

pub use blocklist::BlockRegistry;
pub use monitor::{EventOutcome, MonitorError, SecurityEventMonitor};
