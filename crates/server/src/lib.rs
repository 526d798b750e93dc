//! TCP server exposing the fileshelf RPC surface over a storage root.
//!
//! One connection carries one call (list, upload or download). Each
//! accepted connection runs on its own task; transfers for different
//! files share no state beyond the storage root and the per-filename
//! lock map.

mod handlers;
mod server;

pub use server::{FileServer, ServerConfig};

/// Socket read/write buffer size (256 KB).
pub const WIRE_BUFFER_SIZE: usize = 256 * 1024;
