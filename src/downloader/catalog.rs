// Rendition catalog construction
//
// Turns the raw extractor-reported format list into the deduplicated,
// sorted, UI-bounded set of picks that ends up on the keyboard.
//
// Manifest/segment renditions (m3u8, DASH) stay in: dropping them used to
// leave some sources with an empty catalog. Their extra fragility is the
// download fallback's problem, not the catalog's.

use lazy_static::lazy_static;
use regex::Regex;

use super::extractors::RawFormat;
use super::models::RenditionDescriptor;
use super::protocol::{fits_payload_limit, Action};

/// Upper bound on surfaced picks; keeps the keyboard readable.
pub const MAX_CATALOG_ENTRIES: usize = 12;

pub struct CatalogBuilder;

impl CatalogBuilder {
    /// Build the catalog for one media reference.
    pub fn build(
        formats: &[RawFormat],
        duration_seconds: Option<f64>,
    ) -> Vec<RenditionDescriptor> {
        let mut catalog: Vec<RenditionDescriptor> = Vec::new();
        let mut seen_keys: Vec<String> = Vec::new();

        for format in formats {
            // Structural rows (storyboards, metadata-only) have no video
            // track; pure audio streams are covered by the audio action.
            if !format.has_video() {
                continue;
            }

            let height = format.height.or_else(|| infer_height(format));
            let size = estimate_size(format, duration_seconds);

            // Dedup on the size-free quality key so two same-quality
            // candidates with different sizes collapse; first seen wins.
            let key = quality_key(height, &format.ext);
            if seen_keys.contains(&key) {
                continue;
            }

            let action = Action::PickRendition {
                rendition_id: format.format_id.clone(),
            };
            if !fits_payload_limit(&action) {
                tracing::warn!(
                    rendition_id = %format.format_id,
                    "selection token would exceed the payload limit, dropping rendition"
                );
                continue;
            }

            seen_keys.push(key.clone());
            catalog.push(RenditionDescriptor {
                rendition_id: format.format_id.clone(),
                height_px: height,
                container_ext: format.ext.clone(),
                estimated_size_bytes: size.map(|(bytes, _)| bytes),
                is_size_approximate: size.map(|(_, approx)| approx).unwrap_or(false),
                label: build_label(&key, size.map(|(bytes, _)| bytes)),
            });
        }

        // Descending by known height; unknown heights sort below every
        // known one, keeping their input order (stable sort).
        catalog.sort_by_key(|r| std::cmp::Reverse(r.height_px.unwrap_or(0)));
        catalog.truncate(MAX_CATALOG_ENTRIES);
        catalog
    }
}

/// Height from the explicit field is preferred; this recovers it from a
/// quality token ("720p", "1080p60") in the note or the id.
fn infer_height(format: &RawFormat) -> Option<u32> {
    lazy_static! {
        static ref QUALITY_RE: Regex = Regex::new(r"(\d{3,4})p").unwrap();
    }

    let note = format.format_note.as_deref().unwrap_or("");
    QUALITY_RE
        .captures(note)
        .or_else(|| QUALITY_RE.captures(&format.format_id))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Size in bytes plus an is-approximate flag. Exact report wins, then the
/// reported approximation, then bitrate x duration. No usable bitrate or
/// duration means no estimate at all.
fn estimate_size(format: &RawFormat, duration_seconds: Option<f64>) -> Option<(u64, bool)> {
    if let Some(size) = format.filesize {
        return Some((size, false));
    }
    if let Some(size) = format.filesize_approx {
        return Some((size, true));
    }

    let tbr = format.tbr?;
    let duration = duration_seconds?;
    if tbr <= 0.0 || duration <= 0.0 {
        return None;
    }
    Some(((tbr * 1000.0 / 8.0 * duration) as u64, true))
}

fn quality_key(height: Option<u32>, ext: &str) -> String {
    match height {
        Some(h) => format!("{}p {}", h, ext),
        None => ext.to_string(),
    }
}

fn build_label(key: &str, size_bytes: Option<u64>) -> String {
    match size_bytes {
        Some(bytes) => {
            let mb = (bytes as f64 / 1_048_576.0).round() as u64;
            format!("{} (~{}mb)", key, mb)
        }
        None => key.to_string(),
    }
}
