//! ICY metadata stream
//!
//! Wraps the body of an Icecast/Shoutcast response, strips the interleaved
//! metadata blocks out of the audio payload, and reports each decoded block
//! to a [`MetadataListener`].
//!
//! Framing: after every `metaint` audio bytes the server inserts one length
//! byte `L`, followed by `L * 16` bytes of NUL-padded text. `L == 0` means no
//! metadata this cycle.

use std::io::{self, Read};

use reqwest::header::{HeaderMap, CONTENT_TYPE};

use crate::config::icy::{METADATA_BLOCK_UNIT, METAINT_HEADER};
use crate::error::{IcyError, Result};
use crate::stream::listener::MetadataListener;
use crate::stream::metadata::{decode_block, parse_metadata, TextEncoding};

/// Headers parsed from an ICY stream response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IcyHeaders {
    /// Audio bytes between metadata blocks, 0 when the server sends none
    pub metaint: usize,
    pub station_name: Option<String>,
    pub genre: Option<String>,
    pub station_url: Option<String>,
    pub content_type: Option<String>,
    pub bitrate: Option<u32>,
}

impl IcyHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let metaint = text(METAINT_HEADER)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        Self {
            metaint,
            station_name: text("icy-name"),
            genre: text("icy-genre"),
            station_url: text("icy-url"),
            content_type: text(CONTENT_TYPE.as_str()),
            bitrate: text("icy-br").and_then(|v| v.parse::<u32>().ok()),
        }
    }

    /// True when the server interleaves metadata into the body
    pub fn has_metadata(&self) -> bool {
        self.metaint > 0
    }
}

/// Position within the current ICY frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Audio,
    /// Audio period done, length byte not read yet
    Length,
    /// `filled` of `len` block bytes read into the scratch buffer
    Block { len: usize, filled: usize },
}

/// Reader that removes ICY metadata frames from an audio byte stream.
///
/// Reads never cross a frame boundary: a call returns at most the number of
/// audio bytes left before the next metadata block. When a call consumes the
/// last audio byte of a period, the metadata block is read, decoded and handed
/// to the listener before the call returns.
///
/// If the inner reader fails partway through a block, the call still returns
/// its audio bytes and the error is reported by the next call. Reading again
/// afterwards resumes the block where it stopped.
pub struct IcyMetadataStream<R, L> {
    inner: R,
    listener: L,
    period: usize,
    remaining: usize,
    frame: Frame,
    deferred: Option<io::Error>,
    encoding: TextEncoding,
    scratch: Vec<u8>,
    frames_decoded: u64,
}

impl<R: Read, L: MetadataListener> IcyMetadataStream<R, L> {
    /// Wrap `inner`, decoding metadata as UTF-8.
    ///
    /// Fails with [`IcyError::InvalidMetaInterval`] when `period` is 0. A
    /// stream without metadata must not be wrapped at all.
    pub fn new(inner: R, period: usize, listener: L) -> Result<Self> {
        Self::with_encoding(inner, period, listener, None)
    }

    /// Wrap `inner`, decoding metadata with the named encoding (UTF-8 when `None`).
    pub fn with_encoding(
        inner: R,
        period: usize,
        listener: L,
        encoding: Option<&str>,
    ) -> Result<Self> {
        if period == 0 {
            return Err(IcyError::InvalidMetaInterval(period));
        }
        let encoding = TextEncoding::from_label(encoding)?;

        Ok(Self {
            inner,
            listener,
            period,
            remaining: period,
            frame: Frame::Audio,
            deferred: None,
            encoding,
            scratch: Vec::new(),
            frames_decoded: 0,
        })
    }

    /// Read a single audio byte. `Ok(None)` at end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Drive the frame state back to `Audio`, consuming the pending metadata
    /// block. On error the state is left as is so a later call can resume.
    fn finish_block(&mut self) -> io::Result<()> {
        loop {
            match self.frame {
                Frame::Audio => return Ok(()),
                Frame::Length => {
                    let mut len_byte = [0u8; 1];
                    if read_retrying(&mut self.inner, &mut len_byte)? == 0 {
                        log::debug!("[ICY] stream ended before metadata length byte");
                        self.start_period();
                        continue;
                    }
                    let len = usize::from(len_byte[0]) * METADATA_BLOCK_UNIT;
                    if len == 0 {
                        log::trace!("[ICY] empty metadata frame");
                        self.start_period();
                        continue;
                    }
                    if self.scratch.len() < len {
                        self.scratch.resize(len, 0);
                    }
                    self.frame = Frame::Block { len, filled: 0 };
                }
                Frame::Block { len, filled } if filled == len => {
                    self.dispatch(len);
                    self.start_period();
                }
                Frame::Block { len, filled } => {
                    let n = read_retrying(&mut self.inner, &mut self.scratch[filled..len])?;
                    if n == 0 {
                        log::debug!("[ICY] metadata block truncated: {filled} of {len} bytes");
                        self.dispatch(filled);
                        self.start_period();
                    } else {
                        self.frame = Frame::Block {
                            len,
                            filled: filled + n,
                        };
                    }
                }
            }
        }
    }

    fn start_period(&mut self) {
        self.frame = Frame::Audio;
        self.remaining = self.period;
    }

    /// Decode the first `len` scratch bytes and report them if non-empty
    fn dispatch(&mut self, len: usize) {
        let text = match decode_block(&self.scratch[..len], self.encoding) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("[ICY] dropping undecodable metadata block: {e}");
                return;
            }
        };

        let record = parse_metadata(&text);
        if record.is_empty() {
            log::trace!("[ICY] metadata block without key/value pairs: {text:?}");
            return;
        }

        log::debug!("[ICY] metadata: {text}");
        self.frames_decoded += 1;
        self.listener.on_metadata(record);
    }
}

impl<R, L> IcyMetadataStream<R, L> {
    /// Audio bytes between metadata blocks
    pub fn period(&self) -> usize {
        self.period
    }

    /// Audio bytes left before the next metadata block.
    /// 0 while a block is still owed by the inner reader.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Number of non-empty metadata records handed to the listener
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, L: MetadataListener> Read for IcyMetadataStream<R, L> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        self.finish_block()?;

        let want = buf.len().min(self.remaining);
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Ok(0);
        }

        self.remaining -= n;
        if self.remaining == 0 {
            self.frame = Frame::Length;
            // The audio above is already in `buf`; report the failure next call
            if let Err(e) = self.finish_block() {
                self.deferred = Some(e);
            }
        }
        Ok(n)
    }
}

/// One read from `reader`, retried on `Interrupted`
fn read_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
