//! Status and headers for a file response, decided before any I/O on the
//! file body happens.

use std::fmt::Write;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, ContentType, HeaderMapExt};
use mime_guess::Mime;
use tokio::fs::File;

use crate::error::Error;
use crate::{KnownSize, RangeResult, RangedStream, ResolvedFile, StreamRequest};

/// How the client should present the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Disposition {
    /// Play or show in place.
    #[default]
    Inline,
    /// Save to disk.
    Attachment,
}

impl Disposition {
    pub fn from_download(download: bool) -> Self {
        if download { Disposition::Attachment } else { Disposition::Inline }
    }

    fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// What the body of a [`ResponseDescriptor`] will be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPlan {
    Empty,
    Stream(StreamRequest),
}

/// Status, headers and body plan for one file request.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyPlan,
}

/// Guess the media type from the file extension.
pub fn media_type(name: &str) -> Mime {
    mime_guess::from_path(name).first_or_octet_stream()
}

/// Decide the response for `file` given the outcome of range parsing.
///
/// * no range: 200 with the whole file
/// * satisfiable range: 206 with `Content-Range`
/// * unsatisfiable range: 416 with `Content-Range: bytes */size`, no body
/// * malformed range: 400, no body
pub fn build(
    file: &ResolvedFile,
    range: RangeResult,
    media_type: &Mime,
    disposition: Disposition,
) -> ResponseDescriptor {
    let mut headers = HeaderMap::new();

    let (status, range) = match range {
        RangeResult::NoRange => (StatusCode::OK, None),
        RangeResult::Satisfiable(range) => (StatusCode::PARTIAL_CONTENT, Some(range)),
        RangeResult::Unsatisfiable => {
            headers.typed_insert(ContentRange::unsatisfied_bytes(file.size));
            return ResponseDescriptor {
                status: StatusCode::RANGE_NOT_SATISFIABLE,
                headers,
                body: BodyPlan::Empty,
            };
        }
        RangeResult::Malformed => {
            return ResponseDescriptor {
                status: StatusCode::BAD_REQUEST,
                headers,
                body: BodyPlan::Empty,
            };
        }
    };

    headers.typed_insert(AcceptRanges::bytes());
    headers.typed_insert(ContentType::from(media_type.clone()));
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(disposition, &file.name));

    match range {
        Some(range) => {
            let content_range = ContentRange::bytes(range.start..=range.end, file.size)
                .expect("ContentRange::bytes cannot panic in this usage");
            headers.typed_insert(content_range);
            headers.typed_insert(ContentLength(range.len()));
        }
        None => {
            headers.typed_insert(ContentLength(file.size));
        }
    }

    ResponseDescriptor {
        status,
        headers,
        body: BodyPlan::Stream(StreamRequest { path: file.path.clone(), range, size: file.size }),
    }
}

impl ResponseDescriptor {
    /// Open the body stream, if any. Failure here happens before anything
    /// was sent, so it still becomes a clean error response.
    pub async fn open(self) -> Result<RangedResponse, Error> {
        let body = match &self.body {
            BodyPlan::Empty => None,
            BodyPlan::Stream(request) => Some(RangedStream::open(request).await?),
        };
        Ok(RangedResponse {
            status: self.status,
            headers: self.headers,
            body,
        })
    }
}

/// A [`ResponseDescriptor`] with its body stream opened. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct RangedResponse<B = KnownSize<File>> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<RangedStream<B>>,
}

impl<B: crate::RangeBody + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        match self.body {
            Some(stream) => (self.status, self.headers, stream).into_response(),
            None => (self.status, self.headers).into_response(),
        }
    }
}

/// `Content-Disposition` value carrying the file name.
///
/// ASCII names go in a quoted `filename`. Other names get an ASCII
/// approximation there plus an RFC 5987 `filename*`.
fn content_disposition(disposition: Disposition, name: &str) -> HeaderValue {
    let mut value = String::from(disposition.as_str());

    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    let _ = write!(value, "; filename=\"{fallback}\"");

    if !name.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        for byte in name.bytes() {
            if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
                value.push(byte as char);
            } else {
                let _ = write!(value, "%{byte:02X}");
            }
        }
    }

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(disposition.as_str()))
}
