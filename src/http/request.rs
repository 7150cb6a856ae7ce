//! HTTP/1.1 request parsing using the [`httparse`] crate.

use std::str;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, MediaType, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A fully parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer. The body is stored
/// as a [`Bytes`] buffer, making clones of the whole request cheap enough to
/// hand a private copy to each handler invocation.
///
/// # Examples
///
/// ```
/// use trellis::http::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_string(), Some("name=world"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body
    /// begins in `buf` (immediately after the `\r\n\r\n` header terminator).
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request head.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()
            .unwrap(); // Infallible

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (path, query) = match raw_path.find('?') {
            Some(pos) => (
                raw_path[..pos].to_owned(),
                Some(raw_path[pos + 1..].to_owned()),
            ),
            None => (raw_path.to_owned(), None),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        // The buffer may already hold bytes past this request (pipelining);
        // a declared Content-Length bounds the body we expose.
        let mut body_end = buf.len();
        if let Some(len) = header_map
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
        {
            body_end = body_end.min(body_offset + len);
        }
        let body = Bytes::copy_from_slice(&buf[body_offset..body_end]);

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                query,
                body,
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the parsed `Content-Type` header, if present and well-formed.
    pub fn media_type(&self) -> Option<MediaType> {
        self.headers.get("content-type").and_then(MediaType::parse)
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}
