use crate::banner::grab_banner;
use crate::config::ScanConfig;
use crate::error::{ProbeError, ScanError};
use crate::ports::parse_port_spec;
use crate::services::service_name;
use crate::types::{PortState, ProbeResult, ProbeTask, Protocol, ScanResult};
use ::time::{format_description::well_known, OffsetDateTime};
use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{self, TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Parse `port_spec` and scan `target` with the protocols enabled in `cfg`.
///
/// A malformed spec fails before any probe is sent. Per-port network failures
/// are never surfaced; they simply produce no entry.
pub async fn scan(target: &str, port_spec: &str, cfg: &ScanConfig) -> Result<ScanResult, ScanError> {
    scan_with_cancel(target, port_spec, cfg, CancellationToken::new()).await
}

/// Variant that accepts a `CancellationToken` to allow external cancellation.
pub async fn scan_with_cancel(
    target: &str,
    port_spec: &str,
    cfg: &ScanConfig,
    cancel: CancellationToken,
) -> Result<ScanResult, ScanError> {
    let ports = parse_port_spec(port_spec)?;
    Ok(dispatch(target, &ports, cfg, cancel).await)
}

/// Split `ports` into at most `workers` contiguous chunks.
///
/// Chunk size is `max(1, len / workers)` and the last chunk absorbs the remainder,
/// so every port lands in exactly one chunk.
pub fn chunk_ports(ports: &[u16], workers: usize) -> Vec<&[u16]> {
    if ports.is_empty() {
        return Vec::new();
    }
    let workers = workers.max(1);
    let size = (ports.len() / workers).max(1);
    let count = workers.min(ports.len());

    let mut chunks = Vec::with_capacity(count);
    for i in 0..count {
        let start = i * size;
        let end = if i + 1 == count { ports.len() } else { start + size };
        chunks.push(&ports[start..end]);
    }
    chunks
}

#[derive(Clone, Debug, Default)]
struct SharedProgress {
    scanned_done: Arc<AtomicU64>,
    open_count: Arc<AtomicU64>,
    entries: Arc<Mutex<Vec<ProbeResult>>>,
}

/// Probe every port in `ports` on `target` and return the findings ordered by port.
///
/// One task is spawned per chunk per requested protocol; all of them are awaited
/// before the results are sorted, even when `cancel` fires.
pub async fn dispatch(
    target: &str,
    ports: &[u16],
    cfg: &ScanConfig,
    cancel: CancellationToken,
) -> ScanResult {
    let grab_banners = cfg.grab_banners;
    dispatch_with(target, ports, cfg, cancel, move |task: ProbeTask, timeout| async move {
        match task.protocol {
            Protocol::Tcp => probe_tcp(&task, timeout, grab_banners).await,
            Protocol::Udp => probe_udp(&task, timeout).await,
        }
    })
    .await
}

/// Worker pool behind `dispatch`, generic over the per-port probe.
pub(crate) async fn dispatch_with<P, Fut>(
    target: &str,
    ports: &[u16],
    cfg: &ScanConfig,
    cancel: CancellationToken,
    probe: P,
) -> ScanResult
where
    P: Fn(ProbeTask, Duration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeResult, ProbeError>> + Send + 'static,
{
    let probe = Arc::new(probe);
    let mut protocols = Vec::with_capacity(2);
    if cfg.tcp {
        protocols.push(Protocol::Tcp);
    }
    if cfg.udp {
        protocols.push(Protocol::Udp);
    }

    let started_at = now_rfc3339();
    let start = Instant::now();
    let total = ports.len() as u64 * protocols.len() as u64;
    let workers = cfg.effective_workers();
    let shared = SharedProgress::default();
    let target: Arc<str> = Arc::from(target);
    let mut set = JoinSet::new();

    info!(
        host = %target,
        ports = ports.len(),
        workers,
        tcp = cfg.tcp,
        udp = cfg.udp,
        "starting port scan"
    );

    for &protocol in &protocols {
        let timeout = match protocol {
            Protocol::Tcp => cfg.timeout,
            Protocol::Udp => cfg.udp_timeout(),
        };
        for chunk in chunk_ports(ports, workers) {
            set.spawn(run_worker(
                target.clone(),
                chunk.to_vec(),
                protocol,
                timeout,
                probe.clone(),
                shared.clone(),
                cancel.clone(),
            ));
        }
    }

    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "scan worker aborted; its remaining ports are unreported");
        }
    }

    let mut entries = std::mem::take(&mut *shared.entries.lock().await);
    entries.sort_by_key(|r| (r.port, r.protocol));

    let elapsed_ms = start.elapsed().as_millis() as u64;
    info!(host = %target, open = entries.len(), elapsed_ms, "scan completed");

    ScanResult {
        target: target.to_string(),
        started_at,
        elapsed_ms,
        scanned_total: total,
        scanned_done: shared.scanned_done.load(Ordering::Relaxed),
        open_count: shared.open_count.load(Ordering::Relaxed),
        cancelled: cancel.is_cancelled(),
        entries,
    }
}

async fn run_worker<P, Fut>(
    target: Arc<str>,
    chunk: Vec<u16>,
    protocol: Protocol,
    timeout: Duration,
    probe: Arc<P>,
    shared: SharedProgress,
    cancel: CancellationToken,
) where
    P: Fn(ProbeTask, Duration) -> Fut,
    Fut: Future<Output = Result<ProbeResult, ProbeError>>,
{
    for port in chunk {
        if cancel.is_cancelled() {
            break;
        }
        let task = ProbeTask { target: target.clone(), port, protocol };
        let outcome = probe(task, timeout).await;
        shared.scanned_done.fetch_add(1, Ordering::Relaxed);

        match outcome {
            Ok(found) => {
                debug!(port, %protocol, service = %found.service, "found open port");
                shared.open_count.fetch_add(1, Ordering::Relaxed);
                shared.entries.lock().await.push(found);
            }
            Err(e) => trace!(port, %protocol, error = %e, "no finding"),
        }
    }
}

/// TCP connect probe. An established connection means the port is open.
pub async fn probe_tcp(
    task: &ProbeTask,
    timeout: Duration,
    grab_banners: bool,
) -> Result<ProbeResult, ProbeError> {
    let mut stream = time::timeout(timeout, TcpStream::connect((&*task.target, task.port)))
        .await
        .map_err(|_| ProbeError::Timeout)?
        .map_err(ProbeError::Connect)?;

    let banner = if grab_banners {
        grab_banner(&mut stream, task.port, timeout).await
    } else {
        String::new()
    };

    Ok(ProbeResult {
        port: task.port,
        protocol: Protocol::Tcp,
        state: PortState::Open,
        service: service_name(task.port).to_string(),
        banner,
    })
}

/// Best-effort UDP probe: send an empty datagram on a connected socket and treat
/// the absence of an ICMP rejection within `timeout` as `Open|Filtered`.
pub async fn probe_udp(task: &ProbeTask, timeout: Duration) -> Result<ProbeResult, ProbeError> {
    let addr = resolve(task, timeout).await?;
    let local: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local).await?;
    // Connecting lets the kernel report ICMP port-unreachable as ConnectionRefused.
    socket.connect(addr).await?;
    time::timeout(timeout, socket.send(&[]))
        .await
        .map_err(|_| ProbeError::Timeout)??;

    let mut buf = [0u8; 512];
    if let Ok(Err(e)) = time::timeout(timeout, socket.recv(&mut buf)).await {
        return Err(ProbeError::Io(e));
    }

    Ok(ProbeResult {
        port: task.port,
        protocol: Protocol::Udp,
        state: PortState::OpenFiltered,
        service: service_name(task.port).to_string(),
        banner: String::new(),
    })
}

async fn resolve(task: &ProbeTask, timeout: Duration) -> Result<SocketAddr, ProbeError> {
    let mut addrs = time::timeout(timeout, net::lookup_host((&*task.target, task.port)))
        .await
        .map_err(|_| ProbeError::Timeout)?
        .map_err(|source| ProbeError::Resolve {
            target: task.target.to_string(),
            source,
        })?;
    addrs
        .next()
        .ok_or_else(|| ProbeError::NoAddress(task.target.to_string()))
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn chunks_partition_ports_exactly_once() {
        for len in [0usize, 1, 2, 7, 99, 100, 101, 1000, 1001] {
            let ports: Vec<u16> = (1..=len as u16).collect();
            for workers in [1usize, 2, 3, 10, 100, 5000] {
                let chunks = chunk_ports(&ports, workers);
                assert!(chunks.len() <= workers);
                let flat: Vec<u16> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
                assert_eq!(flat, ports, "len={len} workers={workers}");
                let uniq: HashSet<u16> = flat.iter().copied().collect();
                assert_eq!(uniq.len(), ports.len());
            }
        }
    }

    #[test]
    fn last_chunk_absorbs_remainder() {
        let ports: Vec<u16> = (1..=10).collect();
        let chunks = chunk_ports(&ports, 3);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![3, 3, 4]);
    }

    #[test]
    fn zero_workers_treated_as_one() {
        let ports = [1u16, 2, 3];
        assert_eq!(chunk_ports(&ports, 0), vec![&ports[..]]);
    }

    #[tokio::test]
    async fn malformed_spec_fails_before_probing() {
        let err = scan("127.0.0.1", "80-22", &ScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::Parse(crate::error::ParseError::InvalidRange { start: 80, end: 22 })
        ));
    }

    #[tokio::test]
    async fn cancelled_before_start_scans_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = dispatch("127.0.0.1", &[1, 2, 3], &ScanConfig::default(), cancel).await;
        assert!(res.cancelled);
        assert_eq!(res.scanned_total, 3);
        assert_eq!(res.scanned_done, 0);
        assert!(res.entries.is_empty());
    }

    fn fake_open(task: &ProbeTask) -> ProbeResult {
        ProbeResult {
            port: task.port,
            protocol: task.protocol,
            state: PortState::Open,
            service: service_name(task.port).to_string(),
            banner: String::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_worker_does_not_lose_sibling_findings() {
        let ports: Vec<u16> = (1..=8).collect();
        let cfg = ScanConfig { workers: 4, ..ScanConfig::default() };
        let faulty = |task: ProbeTask, _: Duration| async move {
            if task.port == 3 {
                panic!("worker fault on port 3");
            }
            Ok::<_, ProbeError>(fake_open(&task))
        };
        let res = dispatch_with("127.0.0.1", &ports, &cfg, CancellationToken::new(), faulty).await;

        // Chunk [3, 4] dies at port 3; every other chunk reports in full.
        let got: Vec<u16> = res.entries.iter().map(|e| e.port).collect();
        assert_eq!(got, vec![1, 2, 5, 6, 7, 8]);
        assert_eq!(res.open_count, 6);
        assert_eq!(res.scanned_done, 6);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_ports_become_no_finding() {
        let ports: Vec<u16> = (1..=6).collect();
        let cfg = ScanConfig { workers: 3, udp: true, ..ScanConfig::default() };
        let odd_only = |task: ProbeTask, _: Duration| async move {
            if task.port % 2 == 0 {
                Err(ProbeError::Timeout)
            } else {
                Ok(fake_open(&task))
            }
        };
        let res = dispatch_with("127.0.0.1", &ports, &cfg, CancellationToken::new(), odd_only).await;

        let got: Vec<(u16, Protocol)> = res.entries.iter().map(|e| (e.port, e.protocol)).collect();
        assert_eq!(
            got,
            vec![
                (1, Protocol::Tcp),
                (1, Protocol::Udp),
                (3, Protocol::Tcp),
                (3, Protocol::Udp),
                (5, Protocol::Tcp),
                (5, Protocol::Udp),
            ]
        );
        assert_eq!(res.scanned_done, 12);
    }

    #[tokio::test]
    async fn no_protocols_means_nothing_scanned() {
        let cfg = ScanConfig { tcp: false, udp: false, ..ScanConfig::default() };
        let res = dispatch("127.0.0.1", &[22, 80], &cfg, CancellationToken::new()).await;
        assert_eq!(res.scanned_total, 0);
        assert!(res.entries.is_empty());
    }
}
