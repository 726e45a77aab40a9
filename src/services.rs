/// Well-known TCP/UDP port to service name table.
const WELL_KNOWN: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (111, "RPC"),
    (135, "RPC"),
    (139, "NetBIOS"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1723, "PPTP"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (8080, "HTTP-Alt"),
    (8443, "HTTPS-Alt"),
];

pub const UNKNOWN_SERVICE: &str = "Unknown";

/// Look up the conventional service name for a port, or `"Unknown"`.
pub fn service_name(port: u16) -> &'static str {
    WELL_KNOWN
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_SERVICE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ports_resolve() {
        assert_eq!(service_name(22), "SSH");
        assert_eq!(service_name(8443), "HTTPS-Alt");
    }

    #[test]
    fn unlisted_port_is_unknown() {
        assert_eq!(service_name(9000), UNKNOWN_SERVICE);
        assert_eq!(service_name(0), UNKNOWN_SERVICE);
    }
}
