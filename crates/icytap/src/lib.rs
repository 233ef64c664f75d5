//! icytap — ICY metadata for internet radio
//!
//! Strips interleaved Icecast/Shoutcast metadata frames out of a live audio
//! byte stream and reports the decoded key/value pairs to a listener.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::io::Read;
//! use icytap::stream::{IcyMetadataStream, MetadataRecord};
//!
//! # fn demo(body: impl Read) -> icytap::error::Result<()> {
//! let mut stream = IcyMetadataStream::new(body, 16000, |record: MetadataRecord| {
//!     if let Some(title) = record.stream_title() {
//!         println!("Now playing: {title}");
//!     }
//! })?;
//! let mut audio = [0u8; 4096];
//! let n = stream.read(&mut audio)?;
//! # let _ = n;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod stream;
