//! Content negotiation: choosing and running the decode strategy for a
//! method's typed request.
//!
//! The table, by HTTP method and `Content-Type`:
//!
//! | Method      | Content-Type                    | Decode source            |
//! |-------------|---------------------------------|--------------------------|
//! | GET, DELETE | *(ignored)*                     | URL query string         |
//! | POST, PUT   | `application/json`              | JSON body                |
//! | POST, PUT   | `multipart/form-data`           | multipart body (only for the multipart shape) |
//! | POST, PUT   | anything else / absent          | urlencoded form body     |

use serde::de::DeserializeOwned;

use crate::context::{DecodeError, DispatchError};
use crate::http::multipart::{self, MultipartForm};
use crate::http::{Method, Request};

const JSON: &str = "application/json";
const MULTIPART: &str = "multipart/form-data";

/// Decodes the typed request for a serde-typed method shape.
///
/// A `multipart/form-data` payload is refused here — multipart bodies only
/// ever populate [`MultipartForm`], which has its own shape and decoder.
pub(super) fn decode<T: DeserializeOwned>(request: &Request) -> Result<T, DispatchError> {
    if matches!(request.method(), Method::Get | Method::Delete) {
        let query = request.query_string().unwrap_or("");
        return serde_urlencoded::from_str(query)
            .map_err(|e| DispatchError::Decode(DecodeError::Form(e)));
    }

    match request.media_type() {
        Some(media) if media.is(JSON) => serde_json::from_slice(request.body())
            .map_err(|e| DispatchError::Decode(DecodeError::Json(e))),
        Some(media) if media.is(MULTIPART) => Err(DispatchError::MultipartMismatch),
        // Anything else — missing or unparseable included — is treated as an
        // urlencoded form body.
        _ => serde_urlencoded::from_bytes(request.body())
            .map_err(|e| DispatchError::Decode(DecodeError::Form(e))),
    }
}

/// Decodes the body for the multipart method shape.
///
/// The shape declares its content type: anything other than
/// `multipart/form-data` (with a boundary) is unsupported.
pub(super) fn decode_multipart(request: &Request) -> Result<MultipartForm, DispatchError> {
    let unsupported = || DispatchError::UnsupportedContentType {
        content_type: request
            .headers()
            .get("content-type")
            .unwrap_or("(none)")
            .to_owned(),
    };

    let media = request.media_type().ok_or_else(unsupported)?;
    if !media.is(MULTIPART) {
        return Err(unsupported());
    }

    let boundary = media
        .param("boundary")
        .ok_or_else(|| DispatchError::Decode(DecodeError::Multipart(
            multipart::MultipartError::MissingBoundary,
        )))?
        .to_owned();

    multipart::parse(request.body(), &boundary)
        .map_err(|e| DispatchError::Decode(DecodeError::Multipart(e)))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Payload {
        f1: String,
        f2: i64,
    }

    fn request(raw: &str) -> Request {
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn get_decodes_from_query_string() {
        let req = request("GET /p/?f1=F1&f2=2 HTTP/1.1\r\nHost: x\r\n\r\n");
        let payload: Payload = decode(&req).unwrap();
        assert_eq!(
            payload,
            Payload {
                f1: "F1".into(),
                f2: 2
            }
        );
    }

    #[test]
    fn delete_decodes_from_query_string() {
        let req = request("DELETE /p/?f1=x&f2=-7 HTTP/1.1\r\nHost: x\r\n\r\n");
        let payload: Payload = decode(&req).unwrap();
        assert_eq!(payload.f2, -7);
    }

    #[test]
    fn get_ignores_content_type() {
        let req = request(
            "GET /p/?f1=F1&f2=2 HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\n\r\n",
        );
        let payload: Payload = decode(&req).unwrap();
        assert_eq!(payload.f1, "F1");
    }

    #[test]
    fn put_decodes_json_body() {
        let req = request(
            "PUT /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: 18\r\n\r\n{\"f1\":\"F1\",\"f2\":2}",
        );
        let payload: Payload = decode(&req).unwrap();
        assert_eq!(
            payload,
            Payload {
                f1: "F1".into(),
                f2: 2
            }
        );
    }

    #[test]
    fn post_decodes_urlencoded_body() {
        let req = request(
            "POST /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nf1=F1&f2=2",
        );
        let payload: Payload = decode(&req).unwrap();
        assert_eq!(payload.f2, 2);
    }

    #[test]
    fn post_without_content_type_falls_back_to_form() {
        let req = request("POST /p/ HTTP/1.1\r\nHost: x\r\n\r\nf1=F1&f2=2");
        let payload: Payload = decode(&req).unwrap();
        assert_eq!(payload.f1, "F1");
    }

    #[test]
    fn multipart_against_typed_shape_is_a_mismatch() {
        let req = request(
            "POST /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: multipart/form-data; boundary=b\r\n\r\n",
        );
        let err = decode::<Payload>(&req).unwrap_err();
        assert!(matches!(err, DispatchError::MultipartMismatch));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let req = request(
            "PUT /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\n\r\n{\"f1\":",
        );
        let err = decode::<Payload>(&req).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Decode(DecodeError::Json(_))
        ));
    }

    #[test]
    fn multipart_shape_requires_multipart_content_type() {
        let req = request("POST /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\n\r\n{}");
        assert!(matches!(
            decode_multipart(&req),
            Err(DispatchError::UnsupportedContentType { content_type }) if content_type == "application/json"
        ));

        let req = request("POST /p/ HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(matches!(
            decode_multipart(&req),
            Err(DispatchError::UnsupportedContentType { content_type }) if content_type == "(none)"
        ));
    }

    #[test]
    fn multipart_shape_requires_boundary() {
        let req =
            request("POST /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: multipart/form-data\r\n\r\n");
        assert!(matches!(
            decode_multipart(&req),
            Err(DispatchError::Decode(DecodeError::Multipart(_)))
        ));
    }

    #[test]
    fn multipart_shape_decodes_fields() {
        let body = "--b\r\nContent-Disposition: form-data; name=\"fieldname\"\r\n\r\nfieldvalue\r\n--b--";
        let raw = format!(
            "POST /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: multipart/form-data; boundary=b\r\nContent-Length: {}\r\n\r\n{body}",
            body.len(),
        );
        let form = decode_multipart(&request(&raw)).unwrap();
        assert_eq!(form.value("fieldname"), Some("fieldvalue"));
    }
}
