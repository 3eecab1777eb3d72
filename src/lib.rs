// Oadin client - SDK for the local Oadin inference daemon
// Library exports

pub mod client; // HTTP client and streaming reader
pub mod config;
pub mod daemon; // Download, PATH registration and launch
pub mod errors;

pub use client::{OadinClient, StreamEvent, StreamSummary};
pub use errors::{ErrorKind, OadinError, Result};
