// URL resolution for playlist and segment references.

use url::Url;

use crate::error::SessionError;

/// Resolves a possibly-relative playlist/segment reference against a
/// base URL.
///
/// Absolute references (scheme prefix) pass through unchanged;
/// `/`-rooted references join against the base's origin; anything else
/// joins against the base's directory.
pub fn resolve(base: &str, reference: &str) -> Result<String, SessionError> {
    let reference = reference.trim();
    if reference.starts_with("http") {
        return Ok(reference.to_string());
    }

    let base_url =
        Url::parse(base).map_err(|e| SessionError::invalid_url(base, e.to_string()))?;
    if base_url.host_str().is_none() {
        return Err(SessionError::invalid_url(base, "URL has no host"));
    }
    let origin = origin_of(&base_url);

    if reference.starts_with('/') {
        return Ok(format!("{origin}{reference}"));
    }

    let path = base_url.path();
    let dir = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };
    Ok(format!("{origin}{dir}{reference}"))
}

/// The given URL truncated after the last `/` of its path, used as the
/// base for resolving the segment references a playlist lists. A URL
/// with no path component yields the origin plus `/`.
pub fn directory_of(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let origin = origin_of(&parsed);
    let path = parsed.path();
    match path.rfind('/') {
        Some(idx) => format!("{origin}{}", &path[..=idx]),
        None => format!("{origin}/"),
    }
}

/// `scheme://host[:port]`, keeping a non-default port.
fn origin_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://cdn.example.com/a/b/master.m3u8";

    #[test]
    fn path_relative_reference_joins_directory() {
        assert_eq!(
            resolve(BASE, "seg1.ts").unwrap(),
            "http://cdn.example.com/a/b/seg1.ts"
        );
    }

    #[test]
    fn host_relative_reference_joins_origin() {
        assert_eq!(
            resolve(BASE, "/x/seg1.ts").unwrap(),
            "http://cdn.example.com/x/seg1.ts"
        );
    }

    #[test]
    fn absolute_reference_passes_through() {
        assert_eq!(
            resolve(BASE, "http://other/seg.ts").unwrap(),
            "http://other/seg.ts"
        );
    }

    #[test]
    fn explicit_port_is_preserved() {
        assert_eq!(
            resolve("http://cdn.example.com:8080/live/index.m3u8", "seg.ts").unwrap(),
            "http://cdn.example.com:8080/live/seg.ts"
        );
        assert_eq!(
            resolve("http://cdn.example.com:8080/live/index.m3u8", "/seg.ts").unwrap(),
            "http://cdn.example.com:8080/seg.ts"
        );
    }

    #[test]
    fn invalid_base_is_an_error() {
        assert!(matches!(
            resolve("not a url", "seg.ts"),
            Err(SessionError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn directory_of_truncates_after_last_slash() {
        assert_eq!(directory_of(BASE), "http://cdn.example.com/a/b/");
        assert_eq!(
            directory_of("http://cdn.example.com/plain"),
            "http://cdn.example.com/"
        );
    }

    #[test]
    fn directory_of_host_only_url_keeps_the_origin() {
        assert_eq!(
            directory_of("http://cdn.example.com"),
            "http://cdn.example.com/"
        );
        assert_eq!(
            directory_of("http://cdn.example.com:8080"),
            "http://cdn.example.com:8080/"
        );
        assert_eq!(
            resolve(&directory_of("http://cdn.example.com"), "seg.ts").unwrap(),
            "http://cdn.example.com/seg.ts"
        );
    }
}
