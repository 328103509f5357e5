//! Header relay helpers.
//!
//! Multi-value headers are canonicalized to one comma-joined value: for every
//! header name present in the origin response, the outgoing header is
//! overwritten (not appended) with all of the origin's values joined by `,`.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Name used when a URI has no usable last path segment.
const FALLBACK_FILENAME: &str = "download";

/// Copy every header in `from` onto `to`, collapsing repeated values.
pub fn relay_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for name in from.keys() {
        let joined = from
            .get_all(name)
            .iter()
            .map(HeaderValue::as_bytes)
            .collect::<Vec<_>>()
            .join(&b","[..]);

        match HeaderValue::from_bytes(&joined) {
            Ok(value) => {
                to.insert(name.clone(), value);
            }
            Err(e) => {
                tracing::warn!(header = %name, error = %e, "Dropping unrelayable header");
            }
        }
    }
}

/// Remove connection-scoped headers from a relayed set. They describe the
/// origin hop, not ours.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let hop_by_hop: [HeaderName; 7] = [
        header::CONNECTION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
    ];
    for name in hop_by_hop {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// File name offered to the client: the last path segment of the URI,
/// ignoring query and fragment.
pub fn basename(uri: &str) -> String {
    let name = match reqwest::Url::parse(uri) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
            }),
        // Not an absolute URL; fall back to plain path handling.
        Err(_) => uri
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').find(|s| !s.is_empty()))
            .map(str::to_string),
    };

    name.unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// `Content-Disposition: attachment; filename="<name>"`.
///
/// Characters that cannot appear in a quoted header string are replaced.
pub fn content_disposition(filename: &str) -> HeaderValue {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_value_headers_are_joined() {
        let mut origin = HeaderMap::new();
        origin.append("x-a", HeaderValue::from_static("1"));
        origin.append("x-a", HeaderValue::from_static("2"));
        origin.append("x-b", HeaderValue::from_static("x"));

        let mut relayed = HeaderMap::new();
        relay_headers(&origin, &mut relayed);

        assert_eq!(relayed.len(), 2);
        assert_eq!(relayed.get("x-a").unwrap(), "1,2");
        assert_eq!(relayed.get("x-b").unwrap(), "x");
        assert_eq!(relayed.get_all("x-a").iter().count(), 1);
    }

    #[test]
    fn test_relay_overwrites_existing_values() {
        let mut origin = HeaderMap::new();
        origin.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));

        let mut relayed = HeaderMap::new();
        relayed.append(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        relayed.append(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        relayed.insert("x-kept", HeaderValue::from_static("yes"));
        relay_headers(&origin, &mut relayed);

        assert_eq!(relayed.get_all(header::CONTENT_TYPE).iter().count(), 1);
        assert_eq!(relayed.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
        assert_eq!(relayed.get("x-kept").unwrap(), "yes");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("10"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "10");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("https://example.com/path/video.mp4?q=1"), "video.mp4");
        assert_eq!(basename("https://example.com/path/clip.webm#t=10"), "clip.webm");
        assert_eq!(basename("https://example.com/dir/"), "dir");
        assert_eq!(basename("https://example.com/a%20b.gif"), "a b.gif");
        assert_eq!(basename("https://example.com"), "download");
        assert_eq!(basename("videos/cat.mp4?x=y"), "cat.mp4");
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("video.mp4"),
            "attachment; filename=\"video.mp4\""
        );
        assert_eq!(
            content_disposition("we\"ird\u{e9}.mp4"),
            "attachment; filename=\"we_ird_.mp4\""
        );
    }
}
