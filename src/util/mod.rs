pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Host part of a URL for the secondary line of a row (`https://go.dev/doc` -> `go.dev`).
/// Falls back to the raw input when there is no scheme.
pub(crate) fn display_host(url: &str) -> &str {
    let Some((_, rest)) = url.split_once("://") else {
        return url;
    };
    let end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
    let host = &rest[..end];
    // Drop userinfo.
    host.rsplit_once('@').map(|(_, h)| h).unwrap_or(host)
}

/// Date part of an ISO-8601 timestamp (`2026-01-02T03:04:05+00:00` -> `2026-01-02`).
pub(crate) fn display_date(created_at: &str) -> &str {
    created_at.split_once('T').map(|(d, _)| d).unwrap_or(created_at)
}
