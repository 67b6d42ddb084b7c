//! Artifact naming convention.
//!
//! Convention: `{timestamp}_{sanitized_title}_{workflow}.png`, with a
//! `.txt` sidecar sharing the stem. When a name is already taken the
//! stem gains a `_{suffix}` (see [`disambiguate`]).

use chrono::{DateTime, TimeZone};

/// Timestamp format used as the filename prefix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

pub const IMAGE_EXTENSION: &str = "png";
pub const SIDECAR_EXTENSION: &str = "txt";

/// Replace every character outside `[A-Za-z0-9_]` with `-`, one for one.
///
/// # Examples
///
/// ```
/// use comfymcp_core::naming::sanitize_title;
///
/// assert_eq!(sanitize_title("Red Fox"), "Red-Fox");
/// assert_eq!(sanitize_title("Sun & Moon!!"), "Sun---Moon--");
/// ```
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Compose the image filename for a generation finished at `timestamp`.
pub fn image_filename<Tz>(timestamp: &DateTime<Tz>, title: &str, workflow: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}_{}.{IMAGE_EXTENSION}",
        timestamp.format(TIMESTAMP_FORMAT),
        sanitize_title(title),
        workflow,
    )
}

/// The sidecar filename for an image filename (same stem, `.txt`).
pub fn sidecar_filename(image_filename: &str) -> String {
    let stem = image_filename
        .strip_suffix(&format!(".{IMAGE_EXTENSION}"))
        .unwrap_or(image_filename);
    format!("{stem}.{SIDECAR_EXTENSION}")
}

/// Insert `_{suffix}` before the `.png` extension.
pub fn disambiguate(image_filename: &str, suffix: &str) -> String {
    let stem = image_filename
        .strip_suffix(&format!(".{IMAGE_EXTENSION}"))
        .unwrap_or(image_filename);
    format!("{stem}_{suffix}.{IMAGE_EXTENSION}")
}

/// Markdown image link pointing at the gallery's view URL.
pub fn markdown_reference(title: &str, base_url: &str, filename: &str) -> String {
    format!("![{title}]({}/{filename})", base_url.trim_end_matches('/'))
}
