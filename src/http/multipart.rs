//! `multipart/form-data` body parsing.
//!
//! [`MultipartForm`] separates a parsed body into text fields and uploaded
//! files, both multi-valued. The parser works on a fully buffered body plus
//! the `boundary` parameter from the `Content-Type` header; part headers are
//! parsed with [`httparse`], boundary scanning is done here.

use std::collections::HashMap;
use std::str;

use bytes::Bytes;
use thiserror::Error;

/// Errors produced while parsing a `multipart/form-data` body.
#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("multipart boundary is empty or absent from the body")]
    MissingBoundary,

    #[error("multipart body ended before the closing boundary")]
    Truncated,

    #[error("malformed part headers")]
    BadPartHeaders,

    #[error("part has no Content-Disposition name")]
    MissingName,
}

/// One uploaded file from a multipart body.
#[derive(Debug, Clone)]
pub struct FilePart {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

impl FilePart {
    /// The client-supplied filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The part's own `Content-Type` header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The file contents.
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// A parsed `multipart/form-data` body: text fields and uploaded files,
/// keyed by the `Content-Disposition` name. Both sides are multi-valued in
/// submission order.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    values: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<FilePart>>,
}

impl MultipartForm {
    /// Returns the first text value for `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first().map(String::as_str)
    }

    /// Returns every text value submitted under `name`.
    pub fn values(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the first file submitted under `name`.
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.get(name)?.first()
    }

    /// Returns every file submitted under `name`.
    pub fn files(&self, name: &str) -> &[FilePart] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns `true` if the body contained no fields or files at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.files.is_empty()
    }
}

/// Maximum number of headers on a single part.
const MAX_PART_HEADERS: usize = 8;

/// Parse a buffered multipart body with the given boundary.
///
/// A preamble before the first boundary is skipped per RFC 2046; the parse
/// ends at the closing `--boundary--` delimiter.
pub fn parse(body: &[u8], boundary: &str) -> Result<MultipartForm, MultipartError> {
    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }

    let delimiter = format!("--{boundary}");
    let part_end = format!("\r\n--{boundary}");

    let mut form = MultipartForm::default();
    let mut pos = find(body, delimiter.as_bytes()).ok_or(MultipartError::MissingBoundary)?
        + delimiter.len();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        if !rest.starts_with(b"\r\n") {
            return Err(MultipartError::Truncated);
        }
        pos += 2;

        let (header_len, name, filename, content_type) = part_head(&body[pos..])?;
        let data_start = pos + header_len;

        let data_len =
            find(&body[data_start..], part_end.as_bytes()).ok_or(MultipartError::Truncated)?;
        let data = &body[data_start..data_start + data_len];

        let name = name.ok_or(MultipartError::MissingName)?;
        match filename {
            Some(filename) => form.files.entry(name).or_default().push(FilePart {
                filename,
                content_type,
                data: Bytes::copy_from_slice(data),
            }),
            None => form
                .values
                .entry(name)
                .or_default()
                .push(String::from_utf8_lossy(data).into_owned()),
        }

        // Past the data, its trailing CRLF, and the next delimiter.
        pos = data_start + data_len + 2 + delimiter.len();
    }
}

type PartHead = (usize, Option<String>, Option<String>, Option<String>);

// Parses one part's header block: (length consumed, name, filename, content type).
fn part_head(input: &[u8]) -> Result<PartHead, MultipartError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
    let (consumed, parsed) = match httparse::parse_headers(input, &mut headers) {
        Ok(httparse::Status::Complete(done)) => done,
        Ok(httparse::Status::Partial) => return Err(MultipartError::Truncated),
        Err(_) => return Err(MultipartError::BadPartHeaders),
    };

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for header in parsed {
        let value = str::from_utf8(header.value).map_err(|_| MultipartError::BadPartHeaders)?;
        if header.name.eq_ignore_ascii_case("content-disposition") {
            name = disposition_param(value, "name");
            filename = disposition_param(value, "filename");
        } else if header.name.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_owned());
        }
    }

    Ok((consumed, name, filename, content_type))
}

// Extracts a parameter like `name="value"` from a Content-Disposition value.
fn disposition_param(header: &str, key: &str) -> Option<String> {
    header.split(';').skip(1).find_map(|section| {
        let (k, v) = section.split_once('=')?;
        if k.trim().eq_ignore_ascii_case(key) {
            Some(v.trim().trim_matches('"').to_owned())
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "xYzBoundary42";

    fn form_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"--xYzBoundary42\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"fieldname\"\r\n\r\n");
        body.extend_from_slice(b"fieldvalue\r\n");
        body.extend_from_slice(b"--xYzBoundary42\r\n");
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"uploadfile\"; filename=\"notes.txt\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
        body.extend_from_slice(b"line one\r\nline two\r\n");
        body.extend_from_slice(b"--xYzBoundary42--\r\n");
        body
    }

    #[test]
    fn parses_fields_and_files() {
        let form = parse(&form_body(), BOUNDARY).unwrap();

        assert_eq!(form.value("fieldname"), Some("fieldvalue"));
        assert_eq!(form.values("fieldname").len(), 1);

        let file = form.file("uploadfile").unwrap();
        assert_eq!(file.filename(), "notes.txt");
        assert_eq!(file.content_type(), Some("text/plain"));
        // embedded CRLF inside the data must survive
        assert_eq!(file.data().as_ref(), b"line one\r\nline two");
    }

    #[test]
    fn repeated_field_names_accumulate() {
        let mut body = Vec::new();
        for value in ["a", "b"] {
            body.extend_from_slice(b"--xYzBoundary42\r\n");
            body.extend_from_slice(b"Content-Disposition: form-data; name=\"tag\"\r\n\r\n");
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"--xYzBoundary42--");

        let form = parse(&body, BOUNDARY).unwrap();
        assert_eq!(form.values("tag"), ["a", "b"]);
        assert_eq!(form.value("tag"), Some("a"));
    }

    #[test]
    fn preamble_is_skipped() {
        let mut body = b"this is ignored preamble text".to_vec();
        body.extend_from_slice(&form_body());
        let form = parse(&body, BOUNDARY).unwrap();
        assert_eq!(form.value("fieldname"), Some("fieldvalue"));
    }

    #[test]
    fn missing_closing_boundary_is_truncated() {
        let mut body = form_body();
        body.truncate(body.len() - 20); // cut into the last part
        assert!(matches!(
            parse(&body, BOUNDARY),
            Err(MultipartError::Truncated)
        ));
    }

    #[test]
    fn wrong_boundary_is_missing() {
        assert!(matches!(
            parse(&form_body(), "other"),
            Err(MultipartError::MissingBoundary)
        ));
        assert!(matches!(
            parse(&form_body(), ""),
            Err(MultipartError::MissingBoundary)
        ));
    }

    #[test]
    fn unnamed_part_is_rejected() {
        let body = b"--xYzBoundary42\r\nContent-Disposition: form-data\r\n\r\nx\r\n--xYzBoundary42--";
        assert!(matches!(
            parse(body, BOUNDARY),
            Err(MultipartError::MissingName)
        ));
    }

    #[test]
    fn empty_form() {
        let body = b"--xYzBoundary42--\r\n";
        let form = parse(body, BOUNDARY).unwrap();
        assert!(form.is_empty());
    }
}
