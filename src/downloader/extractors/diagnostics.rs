// Failure classification - maps engine error text to a categorized hint
//
// Matching substrings in free-text yt-dlp output is brittle, so every
// known pattern lives here and nowhere else. Checked in order of
// specificity; the generic "unavailable" bucket goes last.

use serde::{Deserialize, Serialize};

/// Why an extraction or download most likely failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureHint {
    /// Age gate, needs a logged-in account
    AgeRestricted,
    /// Private media, needs access plus cookies
    PrivateMedia,
    /// Scheduled premiere, not published yet
    Premiere,
    /// Removed, taken down or otherwise gone
    Unavailable,
    /// Blocked in the server's region
    GeoBlocked,
    /// 429 or explicit throttling
    RateLimited,
    /// Socket timeout or connection failure
    NetworkTimeout,
    /// The extractor does not handle this URL
    UnsupportedUrl,
    Unknown,
}

impl FailureHint {
    /// One-line advice appended to the user-visible error message.
    pub fn user_hint(&self) -> &'static str {
        match self {
            Self::AgeRestricted => {
                "The video looks age-restricted. Uploading cookies from a logged-in account may help."
            }
            Self::PrivateMedia => {
                "This is a private video. You need access on the account whose cookies you uploaded."
            }
            Self::Premiere => "This is a premiere and is not available for download yet.",
            Self::Unavailable => "The video is unavailable; it may have been removed.",
            Self::GeoBlocked => "The video is not available from the server's region.",
            Self::RateLimited => "The source is rate-limiting us. Try again in a few minutes.",
            Self::NetworkTimeout => "The source did not respond in time. Try again later.",
            Self::UnsupportedUrl => "That link does not point to media the extractor understands.",
            Self::Unknown => "Something went wrong on the source side.",
        }
    }

    /// Whether a per-user cookie file is likely to change the outcome.
    pub fn cookies_might_help(&self) -> bool {
        matches!(self, Self::AgeRestricted | Self::PrivateMedia)
    }
}

/// Classify a raw engine error message.
pub fn classify_failure(error: &str) -> FailureHint {
    let lower = error.to_lowercase();

    if lower.contains("confirm your age")
        || lower.contains("age-restricted")
        || lower.contains("age_verification")
    {
        return FailureHint::AgeRestricted;
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return FailureHint::PrivateMedia;
    }

    if lower.contains("premiere") {
        return FailureHint::Premiere;
    }

    if lower.contains("available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restricted")
    {
        return FailureHint::GeoBlocked;
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        return FailureHint::RateLimited;
    }

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("network unreachable")
    {
        return FailureHint::NetworkTimeout;
    }

    if lower.contains("unsupported url") || lower.contains("is not a valid url") {
        return FailureHint::UnsupportedUrl;
    }

    if lower.contains("unavailable") || lower.contains("has been removed") {
        return FailureHint::Unavailable;
    }

    FailureHint::Unknown
}
