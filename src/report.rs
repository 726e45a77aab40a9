use crate::discovery::HostReport;
use crate::types::{ProbeResult, ScanResult};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

const BANNER_SNIP: usize = 40;
const SERVICES_SNIP: usize = 50;

/// Render findings as a column-aligned text table.
pub fn render_table(results: &ScanResult) -> String {
    let mut out = String::new();
    if results.entries.is_empty() {
        let _ = writeln!(out, "No open ports found (scanned: {})", results.scanned_done);
        return out;
    }

    let rows: Vec<[String; 5]> = results
        .entries
        .iter()
        .map(|e| {
            [
                e.port.to_string(),
                e.protocol.to_string(),
                e.state.to_string(),
                e.service.clone(),
                snip_banner(&e.banner),
            ]
        })
        .collect();

    let headers = ["port", "protocol", "state", "service", "banner"];
    let mut widths = headers.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let _ = writeln!(
        out,
        "Open ports: {} (scanned: {}/{}, {} ms)",
        results.open_count, results.scanned_done, results.scanned_total, results.elapsed_ms
    );
    let _ = writeln!(
        out,
        "{:>pw$}  {:<rw$}  {:<sw$}  {:<vw$}  {}",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        headers[4],
        pw = widths[0],
        rw = widths[1],
        sw = widths[2],
        vw = widths[3],
    );
    let _ = writeln!(
        out,
        "{:-<pw$}  {:-<rw$}  {:-<sw$}  {:-<vw$}  {:-<bw$}",
        "",
        "",
        "",
        "",
        "",
        pw = widths[0],
        rw = widths[1],
        sw = widths[2],
        vw = widths[3],
        bw = widths[4],
    );
    for row in &rows {
        let line = format!(
            "{:>pw$}  {:<rw$}  {:<sw$}  {:<vw$}  {}",
            row[0],
            row[1],
            row[2],
            row[3],
            row[4],
            pw = widths[0],
            rw = widths[1],
            sw = widths[2],
            vw = widths[3],
        );
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}

fn snip_banner(banner: &str) -> String {
    snip(&banner.replace('\n', "\\n").replace('\r', "\\r"), BANNER_SNIP)
}

fn snip(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    } else {
        s.to_string()
    }
}

/// Render discovered hosts, one line each, with their open common ports.
pub fn render_hosts(hosts: &[HostReport]) -> String {
    let mut out = String::new();
    if hosts.is_empty() {
        out.push_str("No active hosts found\n");
        return out;
    }

    let host_w = hosts.iter().map(|h| h.host.len()).max().unwrap_or(0).max("host".len());
    let name_w = hosts
        .iter()
        .map(|h| h.hostname.chars().count())
        .max()
        .unwrap_or(0)
        .max("hostname".len());

    let _ = writeln!(out, "Active hosts: {}", hosts.len());
    let _ = writeln!(
        out,
        "{:<host_w$}  {:<name_w$}  {:>7}  {:>4}  services",
        "host", "hostname", "rtt_ms", "open"
    );
    let _ = writeln!(
        out,
        "{:-<host_w$}  {:-<name_w$}  {:-<7}  {:-<4}  {:-<8}",
        "", "", "", "", ""
    );
    for h in hosts {
        let services = if h.open_ports.is_empty() {
            String::from("No open ports detected")
        } else {
            h.open_ports
                .iter()
                .map(|p| format!("{}/{}", p.port, p.service))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(
            out,
            "{:<host_w$}  {:<name_w$}  {:>7}  {:>4}  {}",
            h.host,
            h.hostname,
            h.response_time_ms,
            h.open_ports.len(),
            snip(&services, SERVICES_SNIP)
        );
    }
    out
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Exposure {
    pub port: u16,
    pub service: String,
    pub reason: &'static str,
}

/// Presentational split of findings into risky and secure services.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityAnalysis {
    pub risky: Vec<Exposure>,
    pub secure: Vec<Exposure>,
}

enum Class {
    Risky(&'static str),
    Secure(&'static str),
}

fn classify(port: u16) -> Option<Class> {
    match port {
        21 | 23 | 25 | 110 | 143 => Some(Class::Risky("Unencrypted protocol")),
        135 | 139 | 445 => Some(Class::Risky("Windows service (SMB/RPC)")),
        3389 => Some(Class::Risky("Remote Desktop (brute force target)")),
        22 | 443 | 993 | 995 => Some(Class::Secure("Encrypted protocol")),
        _ => None,
    }
}

pub fn analyze_security(entries: &[ProbeResult]) -> SecurityAnalysis {
    let mut analysis = SecurityAnalysis::default();
    for e in entries {
        let (list, reason) = match classify(e.port) {
            Some(Class::Risky(r)) => (&mut analysis.risky, r),
            Some(Class::Secure(r)) => (&mut analysis.secure, r),
            None => continue,
        };
        list.push(Exposure { port: e.port, service: e.service.clone(), reason });
    }
    analysis
}

pub fn render_security(analysis: &SecurityAnalysis) -> String {
    let mut out = String::from("Security analysis\n");
    if !analysis.risky.is_empty() {
        out.push_str("Potentially risky services detected:\n");
        for x in &analysis.risky {
            let _ = writeln!(out, "  - Port {} ({}) - {}", x.port, x.service, x.reason);
        }
    }
    if !analysis.secure.is_empty() {
        out.push_str("Secure services detected:\n");
        for x in &analysis.secure {
            let _ = writeln!(out, "  - Port {} ({}) - {}", x.port, x.service, x.reason);
        }
    }
    if analysis.risky.is_empty() && analysis.secure.is_empty() {
        out.push_str("No specific security concerns identified\n");
    }
    out
}

/// Write results as pretty JSON to `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, results: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}
