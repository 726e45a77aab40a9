//! Library crate for srh-rs exposing the port scan engine and its reporting helpers.
pub mod banner;
pub mod config;
pub mod discovery;
pub mod error;
pub mod ports;
pub mod report;
pub mod scanner;
pub mod services;
pub mod types;
