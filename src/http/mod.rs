//! HTTP protocol types shared by the router, dispatcher, and transport.
//!
//! This module provides [`Method`], [`StatusCode`], [`MediaType`], [`Headers`],
//! [`Request`], [`Response`], and the [`multipart`] form model.

use std::fmt;

pub mod headers;
pub mod multipart;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::Response;

/// The response status codes this crate emits.
///
/// # Examples
///
/// ```
/// use trellis::http::StatusCode;
///
/// assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
/// assert_eq!(StatusCode::Ok.canonical_reason(), "OK");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    NoContent = 204,
    BadRequest = 400,
    NotFound = 404,
    MethodNotAllowed = 405,
    PayloadTooLarge = 413,
    UnsupportedMediaType = 415,
    InternalServerError = 500,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::NoContent => "No Content",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::UnsupportedMediaType => "Unsupported Media Type",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// An HTTP request method.
///
/// Standard methods are unit variants for zero-cost comparison; anything else
/// is carried verbatim in `Custom`. Resources dispatch on GET/POST/PUT/DELETE
/// and answer every other method with `405 Method Not Allowed`.
///
/// # Examples
///
/// ```
/// use trellis::http::Method;
///
/// let method: Method = "PUT".parse().unwrap();
/// assert_eq!(method, Method::Put);
/// assert_eq!(method.as_str(), "PUT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    /// A non-standard extension method.
    Custom(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            other => Self::Custom(other.to_owned()),
        })
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// A parsed media type from a `Content-Type` value: the lowercased
/// `type/subtype` essence plus any `key=value` parameters.
///
/// Parsing is lenient — surrounding whitespace is ignored and parameter
/// values may be quoted. A value without a `/` in its first section is not a
/// media type and yields `None`.
///
/// # Examples
///
/// ```
/// use trellis::http::MediaType;
///
/// let mt = MediaType::parse("multipart/form-data; boundary=xYz").unwrap();
/// assert_eq!(mt.essence(), "multipart/form-data");
/// assert_eq!(mt.param("boundary"), Some("xYz"));
///
/// assert!(MediaType::parse("not a media type").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    /// Parse a `Content-Type` header value.
    pub fn parse(value: &str) -> Option<Self> {
        let mut sections = value.split(';');

        let essence = sections.next()?.trim().to_ascii_lowercase();
        if !essence.contains('/') || essence.starts_with('/') || essence.ends_with('/') {
            return None;
        }

        let mut params = Vec::new();
        for section in sections {
            let Some((key, raw)) = section.split_once('=') else {
                continue;
            };
            let value = raw.trim().trim_matches('"');
            params.push((key.trim().to_ascii_lowercase(), value.to_owned()));
        }

        Some(Self { essence, params })
    }

    /// The lowercased `type/subtype` part, e.g. `application/json`.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// Returns the value of a parameter by its (case-insensitive) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the essence equals `essence` (which must already be lowercase).
    pub fn is(&self, essence: &str) -> bool {
        self.essence == essence
    }
}
