use crate::error::ParseError;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const DEFAULT_PORT_SPEC: &str = "1-1000";

/// Parse a port specification such as `22,80,8000-8100` into an ascending,
/// deduplicated list of ports.
///
/// Supported segments, separated by commas:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
///
/// Whitespace around segments is ignored. An empty segment, a non-numeric token
/// or an inverted range is an error; nothing is skipped silently.
pub fn parse_port_spec(spec: &str) -> std::result::Result<Vec<u16>, ParseError> {
    let mut set = BTreeSet::new();

    for raw in spec.split(',') {
        let segment = raw.trim();

        if let Some((a, b)) = segment.split_once('-') {
            let start = parse_port_token(a.trim())?;
            let end = parse_port_token(b.trim())?;
            if start > end {
                return Err(ParseError::InvalidRange { start, end });
            }
            set.extend(start..=end);
            continue;
        }

        set.insert(parse_port_token(segment)?);
    }

    Ok(set.into_iter().collect())
}

/// Parse a ports file: one spec per line, `#` comments and blank lines ignored.
pub fn parse_port_file_str(s: &str) -> Result<Vec<u16>> {
    let mut set = BTreeSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }
        let ports = parse_port_spec(line).with_context(|| format!("line {line_no}: {line}"))?;
        set.extend(ports);
    }

    Ok(set.into_iter().collect())
}

/// Load a ports file from disk. Errors if the file cannot be read or parsed.
pub fn load_port_file(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_port_file_str(&content)
}

fn parse_port_token(s: &str) -> std::result::Result<u16, ParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidPort { token: s.to_string() });
    }
    // All digits, so the only possible failure is overflow.
    s.parse::<u16>()
        .map_err(|_| ParseError::OutOfRange { token: s.to_string() })
}
