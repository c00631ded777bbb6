use url::Url;

use crate::error::LiveResult;

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

/// Resolves a `BaseURL` against the current base, carrying the query string of
/// the current base over when the new one has none.
///
/// `https://example.com/live/manifest.mpd?auth=secret` + `video/` =>
/// `https://example.com/live/video/?auth=secret`
pub(crate) fn merge_baseurls(current: &Url, new: &str) -> LiveResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        let mut merged = current.join(new)?;
        if merged.query().is_none() {
            merged.set_query(current.query());
        }
        Ok(merged)
    }
}
