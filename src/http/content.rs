//! Streaming a store file as an HTTP response.
//!
//! # Responsibilities
//! - Content-Type from the file name, falling back to sniffing
//! - Last-Modified, Accept-Ranges and Content-Length
//! - Conditional requests (`If-None-Match`, `If-Modified-Since`, `If-Range`)
//! - Single byte ranges (206 / 416)
//! - Closing the file once the body has been streamed
//!
//! # Design Decisions
//! - Multiple ranges are answered with the full body (servers may ignore Range)
//! - Close failures after the body started are logged, not surfaced

use std::io::{self, SeekFrom};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::stream;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::fs::{FileInfo, StoreFile};
use crate::http::date::{format_http_date, parse_http_date, to_utc};

/// Bytes read per body chunk.
const CHUNK_SIZE: usize = 32 * 1024;

/// Bytes inspected when the extension does not reveal a content type.
const SNIFF_LEN: usize = 512;

/// A window of `length` bytes starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
}

impl ByteRange {
    fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.start + self.length - 1, size)
    }
}

/// Why a `Range` header could not be honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    Invalid,
    NoOverlap,
}

/// Serve `file` for a request, with `headers` already set by the caller.
///
/// The file is consumed and closed on every path.
pub async fn serve_content<F: StoreFile>(
    method: &Method,
    request: &HeaderMap,
    mut file: F,
    info: &FileInfo,
    mut headers: HeaderMap,
) -> Response {
    if let Some(status) = check_preconditions(method, request, &headers, info) {
        let mut response = empty(status, &headers);
        if status == StatusCode::NOT_MODIFIED {
            response.headers_mut().remove(header::CONTENT_TYPE);
        }
        return close_then(file, response).await;
    }

    if !headers.contains_key(header::CONTENT_TYPE) {
        match content_type(&mut file, &info.name).await {
            Ok(value) => {
                headers.insert(header::CONTENT_TYPE, value);
            }
            Err(e) => return close_then(file, internal_error(&e)).await,
        }
    }

    if !headers.contains_key(header::LAST_MODIFIED) && info.modified != std::time::SystemTime::UNIX_EPOCH {
        if let Ok(value) = HeaderValue::from_str(&format_http_date(to_utc(info.modified))) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }

    let size = info.size;
    let mut status = StatusCode::OK;
    let mut window = ByteRange { start: 0, length: size };

    let range = request.get(header::RANGE).and_then(|v| v.to_str().ok());
    if let Some(range) = range.filter(|_| if_range_allows(request, &headers)) {
        match parse_range(range, size) {
            Ok(ranges) if ranges.len() == 1 => {
                window = ranges[0];
                status = StatusCode::PARTIAL_CONTENT;
                if let Ok(value) = HeaderValue::from_str(&window.content_range(size)) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
            }
            Ok(_) => {}
            Err(RangeError::Invalid | RangeError::NoOverlap) => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                let response = empty(StatusCode::RANGE_NOT_SATISFIABLE, &headers);
                return close_then(file, response).await;
            }
        }
    }

    if window.start > 0 {
        if let Err(e) = file.seek(SeekFrom::Start(window.start)).await {
            return close_then(file, internal_error(&e)).await;
        }
    }

    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(window.length));

    if method == Method::HEAD {
        return close_then(file, empty(status, &headers)).await;
    }

    let mut response = Response::new(body_stream(file, window.length));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Parse a `Range` header value against a resource of `size` bytes.
///
/// Returns an empty list when the header names no ranges at all.
pub fn parse_range(value: &str, size: u64) -> Result<Vec<ByteRange>, RangeError> {
    let spec = value.strip_prefix("bytes=").ok_or(RangeError::Invalid)?;
    let mut ranges = Vec::new();
    let mut no_overlap = false;

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = part.split_once('-').ok_or(RangeError::Invalid)?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            // Suffix range: the last `end` bytes.
            let suffix: u64 = end.parse().map_err(|_| RangeError::Invalid)?;
            if suffix == 0 || size == 0 {
                no_overlap = true;
                continue;
            }
            let length = suffix.min(size);
            ranges.push(ByteRange { start: size - length, length });
            continue;
        }

        let start: u64 = start.parse().map_err(|_| RangeError::Invalid)?;
        if start >= size {
            no_overlap = true;
            continue;
        }
        let length = if end.is_empty() {
            size - start
        } else {
            let end: u64 = end.parse().map_err(|_| RangeError::Invalid)?;
            if start > end {
                return Err(RangeError::Invalid);
            }
            end.min(size - 1) - start + 1
        };
        ranges.push(ByteRange { start, length });
    }

    if no_overlap && ranges.is_empty() {
        return Err(RangeError::NoOverlap);
    }
    Ok(ranges)
}

fn check_preconditions(
    method: &Method,
    request: &HeaderMap,
    response: &HeaderMap,
    info: &FileInfo,
) -> Option<StatusCode> {
    let safe = method == Method::GET || method == Method::HEAD;

    if let Some(if_none_match) = request.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        let etag = response.get(header::ETAG).and_then(|v| v.to_str().ok());
        if let Some(etag) = etag {
            if etag_list_matches(if_none_match, etag, false) {
                return Some(if safe { StatusCode::NOT_MODIFIED } else { StatusCode::PRECONDITION_FAILED });
            }
        }
        return None;
    }

    if !safe || info.modified == std::time::SystemTime::UNIX_EPOCH {
        return None;
    }
    let since = request
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)?;
    let modified = to_utc(info.modified).timestamp();
    (modified <= since.timestamp()).then_some(StatusCode::NOT_MODIFIED)
}

fn if_range_allows(request: &HeaderMap, response: &HeaderMap) -> bool {
    let Some(if_range) = request.get(header::IF_RANGE).and_then(|v| v.to_str().ok()) else {
        return true;
    };
    if if_range.starts_with('"') || if_range.starts_with("W/") {
        return response
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|etag| etag_list_matches(if_range, etag, true));
    }
    response
        .get(header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|last_modified| last_modified == if_range.trim())
}

fn etag_list_matches(list: &str, etag: &str, strong: bool) -> bool {
    let list = list.trim();
    if list == "*" {
        return !strong;
    }
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    list.split(',').any(|candidate| {
        let candidate = candidate.trim();
        if strong && (candidate.starts_with("W/") || etag.starts_with("W/")) {
            return false;
        }
        opaque(candidate) == opaque(etag)
    })
}

async fn content_type<F: StoreFile>(file: &mut F, name: &str) -> io::Result<HeaderValue> {
    if let Some(mime) = mime_guess::from_path(name).first() {
        if let Ok(value) = HeaderValue::from_str(mime.essence_str()) {
            return Ok(value);
        }
    }

    let mut buf = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    file.seek(SeekFrom::Start(0)).await?;

    Ok(HeaderValue::from_static(sniff(&buf[..filled])))
}

fn sniff(head: &[u8]) -> &'static str {
    let text = match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut off by the sniff window still counts as text.
        Err(e) => e.error_len().is_none(),
    };
    if text && !head.contains(&0) {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

fn body_stream<F: StoreFile>(file: F, length: u64) -> Body {
    let chunks = stream::unfold(Some((file, length)), |state| async move {
        let (mut file, remaining) = state?;
        if remaining == 0 {
            finish(file).await;
            return None;
        }

        let mut buf = vec![0u8; remaining.min(CHUNK_SIZE as u64) as usize];
        match file.read(&mut buf).await {
            Ok(0) => {
                finish(file).await;
                let err = io::Error::new(io::ErrorKind::UnexpectedEof, "file shorter than its reported size");
                Some((Err(err), None))
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some((file, remaining - n as u64))))
            }
            Err(e) => {
                finish(file).await;
                Some((Err(e), None))
            }
        }
    });
    Body::from_stream(chunks)
}

/// Close after the response is committed; failures can only be logged.
async fn finish<F: StoreFile>(file: F) {
    if let Err(e) = file.close().await {
        tracing::warn!(error = %e, "Failed to close static file after response");
    }
}

/// Close before anything was sent; a failure replaces the response.
pub(crate) async fn close_then<F: StoreFile>(file: F, response: Response) -> Response {
    match file.close().await {
        Ok(()) => response,
        Err(e) => internal_error(&e),
    }
}

fn empty(status: StatusCode, headers: &HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    *response.headers_mut() = headers.clone();
    response
}

fn internal_error(e: &io::Error) -> Response {
    tracing::error!(error = %e, "Static file I/O failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error").into_response()
}
