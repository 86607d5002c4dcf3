// Public link construction
//
// The staged name in the path keeps the engine filename hidden; the
// filename query parameter gives the browser a human title to save as.

use super::models::StagedArtifact;

/// Upper bound on the sanitized display name, hash suffix included.
pub const MAX_DISPLAY_NAME_LEN: usize = 150;

const HASH_SUFFIX_LEN: usize = 8;

pub struct LinkPublisher {
    base_url: String,
}

impl LinkPublisher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Build the externally shareable URL for a staged file.
    pub fn publish(&self, final_name: &str, title: &str, extension: &str) -> StagedArtifact {
        let display = format!("{}.{}", sanitize_display_name(title), extension);
        let public_url = format!(
            "{}/{}?filename={}",
            self.base_url,
            urlencoding::encode(final_name),
            urlencoding::encode(&display),
        );

        StagedArtifact {
            final_name: final_name.to_string(),
            extension: extension.to_string(),
            public_url,
        }
    }
}

/// Strip filesystem-unsafe characters, collapse whitespace and bound the
/// length. Over-long names are cut at a word boundary and suffixed with a
/// content hash so two different long titles cannot truncate to the same
/// name.
pub fn sanitize_display_name(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') && !c.is_control())
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= MAX_DISPLAY_NAME_LEN {
        return collapsed;
    }

    // leave room for "_" plus the hash so the bound holds afterwards
    let keep = MAX_DISPLAY_NAME_LEN - HASH_SUFFIX_LEN - 1;
    let head: String = collapsed.chars().take(keep).collect();
    let head = match head.rfind(' ') {
        Some(cut) if cut > 0 => head[..cut].to_string(),
        _ => head,
    };

    let digest = format!("{:x}", md5::compute(title.as_bytes()));
    format!("{}_{}", head, &digest[..HASH_SUFFIX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_characters_stripped() {
        assert_eq!(
            sanitize_display_name("What?! A <great> clip: part 1/2"),
            "What! A great clip part 12"
        );
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(sanitize_display_name("  a \t b\n  c  "), "a b c");
    }

    #[test]
    fn test_long_title_bounded_with_hash_suffix() {
        let title = "word ".repeat(60); // 300 characters
        let sanitized = sanitize_display_name(&title);

        assert!(sanitized.chars().count() <= MAX_DISPLAY_NAME_LEN);
        let (_, suffix) = sanitized.rsplit_once('_').expect("hash suffix");
        assert_eq!(suffix.len(), HASH_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_distinct_long_titles_stay_distinct() {
        let shared_head = "word ".repeat(40);
        let a = sanitize_display_name(&format!("{}ending one", shared_head));
        let b = sanitize_display_name(&format!("{}ending two", shared_head));
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_title_untouched() {
        assert_eq!(sanitize_display_name("Plain title"), "Plain title");
    }

    #[test]
    fn test_published_url_shape() {
        let publisher = LinkPublisher::new("https://files.example.com/d/");
        let artifact = publisher.publish("a1b2c3d4_1700000000.mp4", "My clip", "mp4");

        assert_eq!(
            artifact.public_url,
            "https://files.example.com/d/a1b2c3d4_1700000000.mp4?filename=My%20clip.mp4"
        );
        assert_eq!(artifact.final_name, "a1b2c3d4_1700000000.mp4");
        assert_eq!(artifact.extension, "mp4");
    }
}
