//! Error types for icytap
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for icytap
#[derive(Error, Debug)]
pub enum IcyError {
    #[error("{}", friendly_network_error(.0))]
    Network(#[from] reqwest::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid metadata interval: {0} (must be positive)")]
    InvalidMetaInterval(usize),

    #[error("Unsupported text encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Result type alias for icytap
pub type Result<T> = std::result::Result<T, IcyError>;

fn friendly_network_error(e: &reqwest::Error) -> String {
    let host = e
        .url()
        .and_then(|u| u.host_str())
        .unwrap_or("station")
        .to_string();
    if e.is_builder() {
        match e.url() {
            Some(url) => format!("Invalid URL: {url}"),
            None => "Invalid URL".to_string(),
        }
    } else if e.is_connect() {
        format!("Could not reach {host}")
    } else if e.is_timeout() {
        format!("{host} stopped responding")
    } else if e.is_status() || e.is_decode() {
        format!("Bad response from {host}")
    } else {
        format!("Network error talking to {host}: {e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_interval_message() {
        let e = IcyError::InvalidMetaInterval(0);
        assert_eq!(e.to_string(), "Invalid metadata interval: 0 (must be positive)");
    }

    #[test]
    fn unsupported_encoding_message() {
        let e = IcyError::UnsupportedEncoding("koi8-r".to_string());
        assert!(e.to_string().contains("koi8-r"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "gone");
        let e: IcyError = io.into();
        assert!(matches!(e, IcyError::Io(_)));
        assert!(e.to_string().starts_with("I/O error"));
    }

    #[test]
    fn invalid_url_is_friendly() {
        let err = reqwest::blocking::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let e: IcyError = err.into();
        assert!(e.to_string().starts_with("Invalid URL"));
    }

    #[test]
    fn refused_connection_names_host() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = reqwest::blocking::get(format!("http://127.0.0.1:{port}/live")).unwrap_err();
        let e: IcyError = err.into();
        assert_eq!(e.to_string(), "Could not reach 127.0.0.1");
    }
}
