use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time;

pub const HTTPS_BANNER: &str = "HTTPS (SSL/TLS)";
pub const MAX_BANNER_CHARS: usize = 100;
const READ_BUF_SIZE: usize = 1024;
const HTTP_PORTS: &[u16] = &[80, 8080];
const HTTPS_PORTS: &[u16] = &[443, 8443];
const HTTP_HEAD: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";

/// Capture a short service banner from an open connection.
///
/// - HTTPS ports return a fixed label without touching the stream (no TLS handshake).
/// - HTTP ports get a `HEAD` request before reading.
/// - Everything else is read passively: up to 1024 bytes within `timeout`.
///
/// The banner is trimmed and truncated to 100 characters. Any error yields an empty string.
pub async fn grab_banner<S>(stream: &mut S, port: u16, timeout: Duration) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if HTTPS_PORTS.contains(&port) {
        return HTTPS_BANNER.to_string();
    }

    if HTTP_PORTS.contains(&port) {
        match time::timeout(timeout, stream.write_all(HTTP_HEAD)).await {
            Ok(Ok(())) => {}
            _ => return String::new(),
        }
    }

    let mut buf = vec![0u8; READ_BUF_SIZE];
    match time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            buf.truncate(n);
            let s = String::from_utf8_lossy(&buf);
            s.trim().chars().take(MAX_BANNER_CHARS).collect()
        }
        _ => String::new(),
    }
}
