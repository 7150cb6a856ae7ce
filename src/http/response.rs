//! HTTP/1.1 response builder and wire encoder.

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// Headers are buffered in the builder and only hit the wire in
/// [`into_bytes`](Self::into_bytes), so a header set at any point before
/// serialization is always honored.
///
/// # Examples
///
/// ```
/// use trellis::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("X-Request-Id", "abc-123")
///     .body("hello");
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 5\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Creates a `200 OK` response carrying `value` serialized as JSON, with
    /// the `Content-Type: application/json` header already recorded.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when `value` cannot be
    /// serialized.
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis::http::Response;
    ///
    /// let response = Response::json(&vec![1, 2, 3]).unwrap();
    /// let text = String::from_utf8(response.into_bytes().to_vec()).unwrap();
    /// assert!(text.contains("Content-Type: application/json\r\n"));
    /// assert!(text.ends_with("[1,2,3]"));
    /// ```
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body_bytes(body))
    }

    /// Appends a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers recorded so far.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response body bytes.
    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and
    ///   no `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        // Headers
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());

        buf.put(&b"\r\n"[..]);

        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn simple_ok_response() {
        let r = Response::new(StatusCode::Ok).body("Hello");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn json_sets_header_and_body() {
        #[derive(serde::Serialize)]
        struct Ping {
            ok: bool,
        }
        let r = Response::json(&Ping { ok: true }).unwrap();
        assert_eq!(r.status(), StatusCode::Ok);
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Type: application/json\r\n"));
        assert!(s.ends_with("{\"ok\":true}"));
    }

    #[test]
    fn no_body_no_content_type() {
        let r = Response::new(StatusCode::NoContent);
        let s = to_string(r.into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_close() {
        let r = Response::new(StatusCode::Ok).keep_alive(false);
        let s = to_string(r.into_bytes());
        assert!(s.contains("Connection: close\r\n"));
    }

    #[test]
    fn method_not_allowed() {
        let r = Response::new(StatusCode::MethodNotAllowed).body("method not allowed");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    }
}
