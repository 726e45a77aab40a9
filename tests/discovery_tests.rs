use std::time::Duration;

use srh_rs::config::ScanConfig;
use srh_rs::discovery::{discover_ports, expand_targets, MAX_HOSTS};
use srh_rs::error::{ParseError, ScanError};
use srh_rs::types::Protocol;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[test]
fn cidr_expands_to_hosts() {
    let hosts = expand_targets("10.0.0.0/29").unwrap();
    assert_eq!(
        hosts,
        vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5", "10.0.0.6"]
    );
    assert_eq!(expand_targets("172.16.0.0/12").unwrap().len(), MAX_HOSTS);
}

#[tokio::test(flavor = "multi_thread")]
async fn loopback_host_is_alive_with_its_open_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = listener.accept().await {
            held.push(sock);
        }
    });

    let cfg = ScanConfig {
        timeout: Duration::from_millis(300),
        ..ScanConfig::default()
    };
    let hosts = discover_ports("127.0.0.1/32", &[port], &cfg, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].host, "127.0.0.1");
    assert!(!hosts[0].hostname.is_empty());
    let open: Vec<(u16, Protocol)> = hosts[0].open_ports.iter().map(|p| (p.port, p.protocol)).collect();
    assert_eq!(open, vec![(port, Protocol::Tcp)]);
}

#[tokio::test]
async fn malformed_network_fails_before_probing() {
    let err = discover_ports("10.0.0.0/40", &[22], &ScanConfig::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Parse(ParseError::InvalidCidr { .. })));
}
