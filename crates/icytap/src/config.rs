//! Configuration constants for icytap

/// Network-related configuration
pub mod network {
    /// User agent for HTTP requests
    pub const USER_AGENT: &str = concat!("icytap/", env!("CARGO_PKG_VERSION"));

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Read timeout in seconds
    pub const READ_TIMEOUT_SECS: u64 = 30;
}

/// ICY framing configuration
pub mod icy {
    /// Request header asking the server to interleave metadata
    pub const METADATA_REQUEST_HEADER: &str = "Icy-MetaData";

    /// Response header carrying the metadata interval
    pub const METAINT_HEADER: &str = "icy-metaint";

    /// Bytes per length unit in a metadata block
    pub const METADATA_BLOCK_UNIT: usize = 16;

    /// Chunk size used when copying audio out of a stream (bytes)
    pub const COPY_CHUNK_SIZE: usize = 8 * 1024;
}
