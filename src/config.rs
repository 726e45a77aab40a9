use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 100;
pub const DEFAULT_TIMEOUT_MS: u64 = 1_000;
/// Upper bound on workers spawned per protocol pass.
pub const MAX_WORKERS: usize = 5_000;

/// Tunables for one scan session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub workers: usize,
    /// Per-probe timeout for TCP connects and banner reads.
    pub timeout: Duration,
    pub tcp: bool,
    pub udp: bool,
    pub grab_banners: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            tcp: true,
            udp: false,
            grab_banners: true,
        }
    }
}

impl ScanConfig {
    /// UDP waits twice as long as TCP for an ICMP rejection.
    pub fn udp_timeout(&self) -> Duration {
        self.timeout * 2
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }
}
