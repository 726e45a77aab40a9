use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// Only positive states exist; closed ports are never recorded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Open,
    /// No rejection observed for a UDP datagram. Not a confirmed open port.
    #[serde(rename = "Open|Filtered")]
    OpenFiltered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Open => write!(f, "Open"),
            PortState::OpenFiltered => write!(f, "Open|Filtered"),
        }
    }
}

/// One unit of work handed to a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTask {
    pub target: Arc<str>,
    pub port: u16,
    pub protocol: Protocol,
}

/// One positive finding for a port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub port: u16,
    pub protocol: Protocol,
    pub state: PortState,
    pub service: String,
    pub banner: String,
}

/// Ordered findings and progress counters for a single target.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanResult {
    pub target: String,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub scanned_total: u64,
    pub scanned_done: u64,
    pub open_count: u64,
    #[serde(default)]
    pub cancelled: bool,
    pub entries: Vec<ProbeResult>,
}
