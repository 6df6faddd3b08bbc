//! Content length extraction utilities.
//!
//! This module computes the full size of a resource from a response,
//! supporting both ranged (`Content-Range`) and plain (`Content-Length`)
//! answers.

use reqwest::{header::HeaderMap, header::CONTENT_LENGTH, header::CONTENT_RANGE, StatusCode};

/// Size of the full resource described by a response, if announced.
///
/// For a `206 Partial Content` answer the total comes from `Content-Range`,
/// falling back to `offset + Content-Length`. Otherwise `Content-Length` is
/// the total.
pub fn expected_total(status: StatusCode, headers: &HeaderMap, offset: u64) -> Option<u64> {
    let content_length = header_u64(headers, CONTENT_LENGTH.as_str());
    if status == StatusCode::PARTIAL_CONTENT {
        headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .or_else(|| content_length.map(|len| offset.saturating_add(len)))
    } else {
        content_length
    }
}

/// Parse Content-Range header to extract total size.
///
/// Content-Range header format: "bytes start-end/total"
///
/// # Example
///
/// ```rust
/// use trawl::utils::parse_content_range_total;
///
/// let total = parse_content_range_total("bytes 0-1023/2048");
/// assert_eq!(total, Some(2048));
/// ```
pub fn parse_content_range_total(content_range: &str) -> Option<u64> {
    content_range
        .split('/')
        .next_back()
        .and_then(|size| size.trim().parse::<u64>().ok())
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
