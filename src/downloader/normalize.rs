// Canonical URL construction
//
// Tracking and cache-busting query parameters would make one asset look
// like many, and a stray playlist parameter would expand a single pick
// into a whole playlist fetch. Everything but the allow-list goes.

use url::Url;

use super::errors::NormalizeError;

/// Query parameters that survive normalization.
const ALLOWED_PARAMS: &[&str] = &["v", "t"];

const PLAYLIST_PARAM: &str = "list";

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizePolicy {
    /// Retain the playlist identifier instead of dropping it
    pub keep_playlist: bool,
}

/// Canonicalize an input URL. Pure and idempotent.
pub fn normalize(raw: &str, policy: NormalizePolicy) -> Result<String, NormalizeError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| NormalizeError::Malformed(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(NormalizeError::UnsupportedScheme(other.to_string())),
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            ALLOWED_PARAMS.contains(&k.as_ref())
                || (policy.keep_playlist && k == PLAYLIST_PARAM)
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_fragment(None);
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
    }

    Ok(url.to_string())
}
