//! Server-suggested file names.

use percent_encoding::percent_decode_str;
use reqwest::{header::HeaderMap, header::CONTENT_DISPOSITION, Url};

/// Infers the file name a server suggests for a response.
///
/// The `filename` parameter of `Content-Disposition` wins; otherwise the
/// last, percent-decoded, segment of the URL path is used.
pub fn suggested_filename(headers: &HeaderMap, url: &Url) -> Option<String> {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_disposition)
        .or_else(|| filename_from_url(url))
}

/// Extracts the `filename` parameter of a `Content-Disposition` value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .map(|(_, name)| name.trim().trim_matches('"').to_string())
        .and_then(sanitize)
}

/// Last path segment of `url`, percent-decoded.
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    sanitize(percent_decode_str(segment).decode_utf8_lossy().into_owned())
}

fn sanitize(name: String) -> Option<String> {
    let name = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    match name.as_str() {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}
