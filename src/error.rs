//! Error types for parsing, probing and scanning.

use std::io;
use thiserror::Error;

/// A malformed port specification. Fatal to the scan request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid port: {token:?}")]
    InvalidPort { token: String },

    #[error("invalid range {start}-{end} (start > end)")]
    InvalidRange { start: u16, end: u16 },

    #[error("port out of range: {token}")]
    OutOfRange { token: String },

    #[error("invalid network: {input:?}")]
    InvalidCidr { input: String },
}

/// Failure of a single probe. Never leaves a worker: every variant means "not open".
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to resolve {target}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("no address found for {0}")]
    NoAddress(String),

    #[error("connect failed")]
    Connect(#[source] io::Error),

    #[error("timed out")]
    Timeout,

    #[error("socket error")]
    Io(#[from] io::Error),
}

/// Errors surfaced to the caller of the scan engine.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid port specification: {0}")]
    Parse(#[from] ParseError),
}
