use crate::config::ScanConfig;
use crate::error::{ParseError, ScanError};
use crate::scanner;
use crate::types::ProbeResult;
use hickory_resolver::TokioAsyncResolver;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on hosts taken from one network.
pub const MAX_HOSTS: usize = 254;

/// Ports checked on every live host.
pub const COMMON_PORTS: &[u16] = &[21, 22, 23, 25, 53, 80, 110, 143, 443, 993, 995, 8080, 8443];

/// Fallback liveness ports when ICMP echo gets no answer.
const ALIVE_PORTS: &[u16] = &[80, 443, 22, 445, 3389];

const HOST_CONCURRENCY: usize = 32;

pub const UNKNOWN_HOSTNAME: &str = "Unknown";

/// One live host and the common ports found open on it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub host: String,
    pub hostname: String,
    pub response_time_ms: u64,
    pub open_ports: Vec<ProbeResult>,
}

/// Expand a CIDR into its host addresses (at most 254), or pass a single host through.
///
/// For IPv4 networks the network and broadcast addresses are excluded.
pub fn expand_targets(target: &str) -> Result<Vec<String>, ParseError> {
    let target = target.trim();
    if !target.contains('/') {
        return Ok(vec![target.to_string()]);
    }
    let net: IpNet = target
        .parse()
        .map_err(|_| ParseError::InvalidCidr { input: target.to_string() })?;
    Ok(net.hosts().take(MAX_HOSTS).map(|ip| ip.to_string()).collect())
}

/// Discover live hosts in `target` and scan each for [`COMMON_PORTS`].
pub async fn discover(
    target: &str,
    cfg: &ScanConfig,
    cancel: CancellationToken,
) -> Result<Vec<HostReport>, ScanError> {
    discover_ports(target, COMMON_PORTS, cfg, cancel).await
}

/// Like [`discover`] with an explicit port list. Live hosts come back in address order.
pub async fn discover_ports(
    target: &str,
    ports: &[u16],
    cfg: &ScanConfig,
    cancel: CancellationToken,
) -> Result<Vec<HostReport>, ScanError> {
    let hosts = expand_targets(target)?;
    info!(network = target, hosts = hosts.len(), "starting host discovery");

    let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
        Ok(r) => Some(r),
        Err(e) => {
            warn!(error = %e, "reverse DNS unavailable; hostnames will be unknown");
            None
        }
    };
    let port_cfg = ScanConfig {
        tcp: true,
        udp: false,
        grab_banners: false,
        ..cfg.clone()
    };
    let ports: Arc<[u16]> = ports.into();
    let sem = Arc::new(Semaphore::new(HOST_CONCURRENCY));
    let mut set = JoinSet::new();

    for (idx, host) in hosts.into_iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let Ok(permit) = sem.clone().acquire_owned().await else {
            break;
        };
        let resolver = resolver.clone();
        let port_cfg = port_cfg.clone();
        let ports = ports.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let _permit = permit;
            let Some(rtt) = check_alive(&host, port_cfg.timeout).await else {
                return None;
            };
            debug!(%host, rtt_ms = rtt.as_millis() as u64, "host is alive");
            let hostname = lookup_hostname(&host, resolver.as_ref(), port_cfg.timeout).await;
            let scan = scanner::dispatch(&host, &ports, &port_cfg, cancel).await;
            Some((
                idx,
                HostReport {
                    host,
                    hostname,
                    response_time_ms: rtt.as_millis() as u64,
                    open_ports: scan.entries,
                },
            ))
        });
    }

    let mut found = Vec::new();
    while let Some(res) = set.join_next().await {
        match res {
            Ok(Some(entry)) => found.push(entry),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "host check aborted"),
        }
    }
    found.sort_by_key(|(idx, _)| *idx);

    info!(network = target, alive = found.len(), "host discovery completed");
    Ok(found.into_iter().map(|(_, report)| report).collect())
}

/// Returns the time to the first sign of life, or `None` if the host looks down.
///
/// An ICMP echo via the system `ping` is tried first; failing that, a connect that
/// is accepted or actively refused on any of a few common ports counts as alive.
pub async fn check_alive(host: &str, timeout: Duration) -> Option<Duration> {
    let start = Instant::now();
    if ping(host, timeout).await {
        return Some(start.elapsed());
    }
    for &port in ALIVE_PORTS {
        let start = Instant::now();
        match time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => return Some(start.elapsed()),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => return Some(start.elapsed()),
            _ => {}
        }
    }
    None
}

async fn ping(host: &str, timeout: Duration) -> bool {
    let mut cmd = Command::new("ping");
    if cfg!(windows) {
        cmd.args(["-n", "1", "-w", timeout.as_millis().to_string().as_str()]);
    } else {
        cmd.args(["-c", "1", "-W", timeout.as_secs().max(1).to_string().as_str()]);
    }
    cmd.arg(host).kill_on_drop(true);

    match time::timeout(timeout + Duration::from_secs(1), cmd.output()).await {
        Ok(Ok(output)) => output.status.success(),
        _ => false,
    }
}

async fn lookup_hostname(host: &str, resolver: Option<&TokioAsyncResolver>, timeout: Duration) -> String {
    let Ok(ip) = host.parse::<IpAddr>() else {
        return host.to_string();
    };
    let Some(resolver) = resolver else {
        return UNKNOWN_HOSTNAME.to_string();
    };
    match time::timeout(timeout, resolver.reverse_lookup(ip)).await {
        Ok(Ok(lookup)) => lookup
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string()),
        _ => UNKNOWN_HOSTNAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_small_cidr_excludes_network_and_broadcast() {
        let hosts = expand_targets("192.168.1.0/30").unwrap();
        assert_eq!(hosts, vec!["192.168.1.1", "192.168.1.2"]);
    }

    #[test]
    fn expand_24_yields_all_hosts() {
        let hosts = expand_targets("10.1.2.0/24").unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts.first().map(String::as_str), Some("10.1.2.1"));
        assert_eq!(hosts.last().map(String::as_str), Some("10.1.2.254"));
    }

    #[test]
    fn large_networks_are_capped() {
        let hosts = expand_targets("10.1.0.0/16").unwrap();
        assert_eq!(hosts.len(), MAX_HOSTS);
        assert_eq!(hosts[0], "10.1.0.1");
        assert_eq!(hosts[253], "10.1.0.254");
    }

    #[test]
    fn single_host_passes_through() {
        assert_eq!(expand_targets("192.168.1.7").unwrap(), vec!["192.168.1.7"]);
        assert_eq!(expand_targets(" example.com ").unwrap(), vec!["example.com"]);
        assert_eq!(expand_targets("127.0.0.1/32").unwrap(), vec!["127.0.0.1"]);
    }

    #[test]
    fn malformed_network_errors() {
        assert_eq!(
            expand_targets("10.0.0.0/33"),
            Err(ParseError::InvalidCidr { input: "10.0.0.0/33".into() })
        );
        assert!(expand_targets("lan/24").is_err());
    }

    #[tokio::test]
    async fn hostname_of_a_name_is_itself() {
        assert_eq!(
            lookup_hostname("printer.lan", None, Duration::from_millis(10)).await,
            "printer.lan"
        );
        assert_eq!(
            lookup_hostname("10.0.0.1", None, Duration::from_millis(10)).await,
            UNKNOWN_HOSTNAME
        );
    }
}
