//! Stream handling
//!
//! Connects to Icecast/Shoutcast stations, strips interleaved ICY metadata
//! from the audio body, and parses metadata blocks into key/value records.

pub mod connect;
pub mod icy;
pub mod listener;
pub mod metadata;

pub use connect::{connect, detect_format_hint, open, StationStream};
pub use icy::{IcyHeaders, IcyMetadataStream};
pub use listener::{ChannelListener, MetadataListener, NoopListener};
pub use metadata::{parse_metadata, MetadataRecord, StreamMetadata, TextEncoding};
