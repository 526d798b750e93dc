//! Client-side pipelines for the fileshelf RPC surface.
//!
//! Each operation opens one TCP connection, runs one call, and closes.
//! Uploads learn their outcome from the server's status byte; downloads
//! derive it from the client-side size check, since no in-band status
//! channel exists in that direction.

mod client;

pub use client::FileClient;

use std::time::Duration;

/// Socket read/write buffer size (256 KB).
pub const WIRE_BUFFER_SIZE: usize = 256 * 1024;

/// Timeout for the TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
