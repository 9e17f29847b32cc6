//! Cache validators derived from file metadata.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};

use crate::fs::FileInfo;
use crate::http::date::{format_http_date, parse_http_date, to_utc};

/// Slack applied to `If-Modified-Since`.
///
/// HTTP dates carry whole seconds while stores may record sub-second
/// modification times.
pub const MODIFIED_SINCE_TOLERANCE: Duration = Duration::from_secs(1);

/// ETag and Last-Modified pair for one file, recomputed per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValidator {
    etag: String,
    last_modified: String,
    modified: DateTime<Utc>,
}

impl CacheValidator {
    pub fn from_info(info: &FileInfo) -> Self {
        let modified = to_utc(info.modified);
        Self {
            etag: format!("\"{}-{:x}\"", hex_i64(modified.timestamp()), info.size),
            last_modified: format_http_date(modified),
            modified,
        }
    }

    /// Quoted entity tag: `"<hex mtime seconds>-<hex size>"`.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    /// Caching headers for a response served at `now`.
    pub fn headers(&self, ttl: Duration, now: DateTime<Utc>) -> HeaderMap {
        let expires = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut headers = HeaderMap::new();
        insert(&mut headers, header::ETAG, &self.etag);
        insert(&mut headers, header::LAST_MODIFIED, &self.last_modified);
        insert(&mut headers, header::CACHE_CONTROL, &format!("public, max-age={}", ttl.as_secs()));
        insert(&mut headers, header::EXPIRES, &format_http_date(expires));
        headers.insert(header::PRAGMA, HeaderValue::from_static("cache"));
        headers
    }

    /// Whether the client's cached copy is still current.
    ///
    /// `If-None-Match` is checked first and matches when it contains the ETag
    /// anywhere in its value. Otherwise a parseable `If-Modified-Since` matches
    /// when the file was modified before that date plus the tolerance.
    pub fn is_fresh(&self, request: &HeaderMap) -> bool {
        if let Some(value) = non_empty(request, header::IF_NONE_MATCH) {
            if value.contains(self.etag.as_str()) {
                return true;
            }
        }

        non_empty(request, header::IF_MODIFIED_SINCE)
            .and_then(parse_http_date)
            .and_then(|since| since.checked_add_signed(tolerance()))
            .is_some_and(|limit| self.modified < limit)
    }
}

fn tolerance() -> chrono::Duration {
    chrono::Duration::from_std(MODIFIED_SINCE_TOLERANCE).unwrap_or(chrono::Duration::zero())
}

fn non_empty(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn insert(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Signed hex; pre-epoch times keep a leading minus instead of two's complement.
fn hex_i64(v: i64) -> String {
    if v < 0 {
        format!("-{:x}", v.unsigned_abs())
    } else {
        format!("{:x}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::SystemTime;

    fn info(secs: u64, nanos: u32, size: u64) -> FileInfo {
        FileInfo {
            name: "app.js".into(),
            size,
            modified: SystemTime::UNIX_EPOCH + Duration::new(secs, nanos),
            is_dir: false,
        }
    }

    fn request(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn etag_is_hex_mtime_and_size() {
        let v = CacheValidator::from_info(&info(1_700_000_000, 0, 1234));
        assert_eq!(v.etag(), "\"6553f100-4d2\"");
        assert_eq!(v.last_modified(), "Tue, 14 Nov 2023 22:13:20 GMT");
    }

    #[test]
    fn etag_ignores_sub_second_precision() {
        let a = CacheValidator::from_info(&info(1_700_000_000, 0, 10));
        let b = CacheValidator::from_info(&info(1_700_000_000, 999_000_000, 10));
        assert_eq!(a.etag(), b.etag());
    }

    #[test]
    fn headers_carry_ttl_and_expiry() {
        let v = CacheValidator::from_info(&info(1_700_000_000, 0, 10));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let headers = v.headers(Duration::from_secs(600), now);
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=600");
        assert_eq!(headers[header::EXPIRES], "Mon, 01 Jan 2024 00:10:00 GMT");
        assert_eq!(headers[header::PRAGMA], "cache");
        assert_eq!(headers[header::ETAG], v.etag());
    }

    #[test]
    fn if_none_match_is_a_substring_check() {
        let v = CacheValidator::from_info(&info(1_700_000_000, 0, 10));
        let list = format!("\"other\", {}", v.etag());
        assert!(v.is_fresh(&request(header::IF_NONE_MATCH, &list)));
        assert!(!v.is_fresh(&request(header::IF_NONE_MATCH, "\"other\"")));
    }

    #[test]
    fn if_modified_since_allows_one_second_of_skew() {
        let v = CacheValidator::from_info(&info(1_700_000_000, 500_000_000, 10));
        let last_modified = v.last_modified().to_string();
        assert!(v.is_fresh(&request(header::IF_MODIFIED_SINCE, &last_modified)));
        assert!(!v.is_fresh(&request(header::IF_MODIFIED_SINCE, "Tue, 14 Nov 2023 22:13:19 GMT")));
    }

    #[test]
    fn if_modified_since_ignores_a_mismatched_weekday() {
        let v = CacheValidator::from_info(&info(1_700_000_000, 0, 10));
        assert!(v.is_fresh(&request(header::IF_MODIFIED_SINCE, "Mon, 14 Nov 2023 22:13:20 GMT")));
    }

    #[test]
    fn unparseable_if_modified_since_is_ignored() {
        let v = CacheValidator::from_info(&info(1_700_000_000, 0, 10));
        assert!(!v.is_fresh(&request(header::IF_MODIFIED_SINCE, "yesterday")));
    }

    #[test]
    fn pre_epoch_times_format_with_sign() {
        assert_eq!(hex_i64(-255), "-ff");
        assert_eq!(hex_i64(255), "ff");
    }
}
