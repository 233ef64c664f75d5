//! Station connector
//!
//! Opens a station URL over blocking HTTP, asks for interleaved metadata, and
//! wraps the body in an [`IcyMetadataStream`] only when the server advertises
//! a positive `icy-metaint`.

use std::io::{self, Read};
use std::time::Duration;

use reqwest::blocking::Response;

use crate::config::icy::METADATA_REQUEST_HEADER;
use crate::config::network::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, USER_AGENT};
use crate::error::{IcyError, Result};
use crate::stream::icy::{IcyHeaders, IcyMetadataStream};
use crate::stream::listener::MetadataListener;
use crate::stream::metadata::TextEncoding;

/// Send the request and check the status. The body is left unread.
pub fn connect(url: &str) -> Result<(IcyHeaders, Response)> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
        .build()?;

    let response = client
        .get(url)
        .header(METADATA_REQUEST_HEADER, "1")
        .send()?;

    if !response.status().is_success() {
        return Err(IcyError::Stream(format!("HTTP {}", response.status())));
    }

    let headers = IcyHeaders::from_header_map(response.headers());
    log::debug!(
        "[ICY] connected to {url}: metaint={} name={:?} type={:?}",
        headers.metaint,
        headers.station_name,
        headers.content_type
    );
    Ok((headers, response))
}

/// Connect to `url` and return its audio stream.
///
/// `encoding` names the metadata text encoding (UTF-8 when `None`); it is
/// validated even when the server sends no metadata.
pub fn open<L: MetadataListener>(
    url: &str,
    listener: L,
    encoding: Option<&str>,
) -> Result<StationStream<Response, L>> {
    let (headers, response) = connect(url)?;
    StationStream::from_parts(url, headers, response, listener, encoding)
}

enum Body<R, L> {
    Plain(R),
    Icy(IcyMetadataStream<R, L>),
}

/// Audio body of a station, with metadata frames removed when present
pub struct StationStream<R, L> {
    url: String,
    headers: IcyHeaders,
    body: Body<R, L>,
}

impl<R: Read, L: MetadataListener> StationStream<R, L> {
    /// Wrap an already connected body according to `headers`.
    pub fn from_parts(
        url: &str,
        headers: IcyHeaders,
        body: R,
        listener: L,
        encoding: Option<&str>,
    ) -> Result<Self> {
        let body = if headers.has_metadata() {
            Body::Icy(IcyMetadataStream::with_encoding(
                body,
                headers.metaint,
                listener,
                encoding,
            )?)
        } else {
            TextEncoding::from_label(encoding)?;
            log::debug!("[ICY] {url} sends no metadata, passing body through");
            Body::Plain(body)
        };

        Ok(Self {
            url: url.to_string(),
            headers,
            body,
        })
    }
}

impl<R, L> StationStream<R, L> {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &IcyHeaders {
        &self.headers
    }

    /// True when metadata frames are being stripped from the body
    pub fn has_metadata(&self) -> bool {
        matches!(self.body, Body::Icy(_))
    }

    /// Non-empty metadata records delivered so far
    pub fn frames_decoded(&self) -> u64 {
        match &self.body {
            Body::Plain(_) => 0,
            Body::Icy(s) => s.frames_decoded(),
        }
    }

    /// Container format guessed from the content type, then the URL
    pub fn format_hint(&self) -> Option<&'static str> {
        detect_format_hint(&self.url, self.headers.content_type.as_deref())
    }
}

impl<R: Read, L: MetadataListener> Read for StationStream<R, L> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.body {
            Body::Plain(r) => r.read(buf),
            Body::Icy(s) => s.read(buf),
        }
    }
}

/// Guess the container format of a station.
///
/// The MIME subtype of `content_type` wins; parameters such as
/// `; charset=` are ignored. Otherwise the extension of the last path
/// segment of `url` is used.
pub fn detect_format_hint(url: &str, content_type: Option<&str>) -> Option<&'static str> {
    let from_mime = content_type
        .and_then(|ct| ct.split(';').next())
        .and_then(|mime| mime.trim().split_once('/'))
        .and_then(|(_, subtype)| match subtype.to_ascii_lowercase().as_str() {
            "mpeg" | "mp3" => Some("mp3"),
            "aac" | "aacp" => Some("aac"),
            "ogg" => Some("ogg"),
            "flac" => Some("flac"),
            "opus" => Some("opus"),
            _ => None,
        });
    if from_mime.is_some() {
        return from_mime;
    }

    let url = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let (_, path) = after_scheme.split_once('/')?;
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = segment.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "mp3" => Some("mp3"),
        "aac" | "adts" => Some("aac"),
        "ogg" | "oga" => Some("ogg"),
        "opus" => Some("opus"),
        "flac" => Some("flac"),
        "m4a" | "mp4" => Some("mp4"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::net::TcpListener;
    use std::thread;

    use crossbeam_channel::{unbounded, Receiver};

    use crate::stream::listener::{ChannelListener, NoopListener};

    /// Serve one canned HTTP response on localhost.
    /// The request head is sent back on the returned channel.
    fn serve_once(response: Vec<u8>) -> (String, Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = unbounded();
        thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 512];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
            sock.write_all(&response).unwrap();
        });
        (format!("http://{addr}/stream.mp3"), rx)
    }

    fn icy_response(extra_headers: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: audio/mpeg\r\n\
             Connection: close\r\n\
             {extra_headers}\r\n"
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    fn framed_body() -> Vec<u8> {
        let mut body = vec![1, 2, 3, 4];
        body.push(1);
        let mut block = b"StreamTitle='A';".to_vec();
        block.resize(16, 0);
        body.extend_from_slice(&block);
        body.extend_from_slice(&[5, 6]);
        body
    }

    // --- StationStream::from_parts ---

    #[test]
    fn wraps_body_when_metaint_present() {
        let headers = IcyHeaders {
            metaint: 4,
            ..IcyHeaders::default()
        };
        let (listener, rx) = ChannelListener::channel();
        let mut s = StationStream::from_parts(
            "http://x/s",
            headers,
            Cursor::new(framed_body()),
            listener,
            None,
        )
        .unwrap();
        assert!(s.has_metadata());

        let mut out = Vec::new();
        s.read_to_end(&mut out).unwrap();

        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(rx.try_recv().unwrap().stream_title(), Some("A"));
        assert_eq!(s.frames_decoded(), 1);
    }

    #[test]
    fn passes_body_through_without_metaint() {
        let body = framed_body();
        let mut s = StationStream::from_parts(
            "http://x/s",
            IcyHeaders::default(),
            Cursor::new(body.clone()),
            NoopListener,
            None,
        )
        .unwrap();
        assert!(!s.has_metadata());

        let mut out = Vec::new();
        s.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
        assert_eq!(s.frames_decoded(), 0);
    }

    #[test]
    fn bad_encoding_rejected_even_without_metadata() {
        let result = StationStream::from_parts(
            "http://x/s",
            IcyHeaders::default(),
            Cursor::new(Vec::<u8>::new()),
            NoopListener,
            Some("klingon"),
        );
        assert!(matches!(result, Err(IcyError::UnsupportedEncoding(_))));
    }

    // --- open over HTTP ---

    #[test]
    fn open_requests_metadata_and_strips_frames() {
        let (url, request) =
            serve_once(icy_response("icy-metaint: 4\r\nicy-name: Test FM\r\n", &framed_body()));
        let (listener, rx) = ChannelListener::channel();

        let mut s = open(&url, listener, None).unwrap();
        assert!(s.has_metadata());
        assert_eq!(s.headers().metaint, 4);
        assert_eq!(s.headers().station_name.as_deref(), Some("Test FM"));
        assert_eq!(s.format_hint(), Some("mp3"));
        assert_eq!(s.url(), url);

        let mut out = Vec::new();
        s.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(rx.try_recv().unwrap().stream_title(), Some("A"));

        let head = request.recv().unwrap().to_lowercase();
        assert!(head.contains("icy-metadata: 1"));
        assert!(head.contains("user-agent: icytap/"));
    }

    #[test]
    fn open_without_metaint_is_plain() {
        let (url, _request) = serve_once(icy_response("", &[9, 8, 7]));

        let mut s = open(&url, NoopListener, None).unwrap();
        assert!(!s.has_metadata());

        let mut out = Vec::new();
        s.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![9, 8, 7]);
    }

    #[test]
    fn http_error_status_is_stream_error() {
        let (url, _request) = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        );

        let err = open(&url, NoopListener, None).err().unwrap();
        assert!(matches!(err, IcyError::Stream(ref m) if m.contains("404")));
    }

    // --- detect_format_hint ---

    #[test]
    fn hint_from_content_type() {
        assert_eq!(detect_format_hint("http://x/stream", Some("audio/mpeg")), Some("mp3"));
        assert_eq!(detect_format_hint("http://x/stream", Some("audio/aacp")), Some("aac"));
        assert_eq!(
            detect_format_hint("http://x/stream", Some("application/ogg")),
            Some("ogg")
        );
        assert_eq!(detect_format_hint("http://x/stream", Some("AUDIO/FLAC")), Some("flac"));
    }

    #[test]
    fn content_type_beats_extension() {
        assert_eq!(
            detect_format_hint("http://x/stream.mp3", Some("audio/ogg")),
            Some("ogg")
        );
    }

    #[test]
    fn hint_from_extension_ignores_query() {
        assert_eq!(detect_format_hint("http://x/live.opus?sid=1", None), Some("opus"));
        assert_eq!(detect_format_hint("http://x/live.M4A", None), Some("mp4"));
    }

    #[test]
    fn no_hint_for_unknown() {
        assert_eq!(detect_format_hint("http://x/live", Some("text/html")), None);
    }

    #[test]
    fn mime_parameters_are_ignored() {
        assert_eq!(
            detect_format_hint("http://x/live", Some("audio/mpeg; charset=utf-8")),
            Some("mp3")
        );
    }

    #[test]
    fn dotted_host_is_not_an_extension() {
        assert_eq!(detect_format_hint("http://radio.example.ogg", None), None);
        assert_eq!(detect_format_hint("http://radio.example.com/live", None), None);
    }
}
