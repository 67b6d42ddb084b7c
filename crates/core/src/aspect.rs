//! Aspect-ratio aliases and their pixel sizes.
//!
//! Callers pick a size with a friendly alias (`"wide"`, `"tallest"`) or
//! a canonical ratio key (`"4:3"`). The workflow config maps each
//! canonical key to a concrete width/height pair.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::workflow::BindingConfig;

/* --------------------------------------------------------------------------
Canonical ratio keys
-------------------------------------------------------------------------- */

pub const RATIO_SQUARE: &str = "1:1";
pub const RATIO_WIDEST: &str = "16:9";
pub const RATIO_TALLEST: &str = "9:16";
pub const RATIO_WIDE: &str = "4:3";
pub const RATIO_TALL: &str = "3:4";

/// Every ratio key a binding config must be able to resolve.
pub const CANONICAL_RATIOS: &[&str] = &[
    RATIO_SQUARE,
    RATIO_WIDEST,
    RATIO_TALLEST,
    RATIO_WIDE,
    RATIO_TALL,
];

/// Alias -> canonical key. Canonical keys map to themselves.
const ALIASES: &[(&str, &str)] = &[
    ("1:1", RATIO_SQUARE),
    ("square", RATIO_SQUARE),
    ("16:9", RATIO_WIDEST),
    ("widest", RATIO_WIDEST),
    ("9:16", RATIO_TALLEST),
    ("tallest", RATIO_TALLEST),
    ("4:3", RATIO_WIDE),
    ("wide", RATIO_WIDE),
    ("3:4", RATIO_TALL),
    ("tall", RATIO_TALL),
];

/// Width/height pair for one aspect ratio.
///
/// Deserializes from the two-element list form used in workflow
/// configs, e.g. `"16:9": [1280, 720]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[u32; 2]")]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<[u32; 2]> for ImageSize {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

/// Ratio key -> size table.
pub type AspectRatioTable = BTreeMap<String, ImageSize>;

/// Sizes used when a workflow config does not define its own table.
pub fn default_aspect_ratios() -> AspectRatioTable {
    [
        (RATIO_WIDEST, ImageSize::new(1280, 720)),
        (RATIO_WIDE, ImageSize::new(1152, 864)),
        (RATIO_SQUARE, ImageSize::new(1024, 1024)),
        (RATIO_TALL, ImageSize::new(864, 1152)),
        (RATIO_TALLEST, ImageSize::new(720, 1280)),
    ]
    .into_iter()
    .map(|(key, size)| (key.to_string(), size))
    .collect()
}

/// Map a user-supplied alias to its canonical ratio key.
///
/// Unknown or empty input silently falls back to square; the aspect
/// ratio is a convenience and never blocks a generation.
pub fn canonical_ratio(alias: &str) -> &'static str {
    let wanted = alias.trim();
    ALIASES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(_, key)| *key)
        .unwrap_or_else(|| {
            tracing::debug!(alias, "Unrecognised aspect ratio, using square");
            RATIO_SQUARE
        })
}

/// Resolve an alias to the pixel size configured for its ratio.
pub fn resolve_size(alias: &str, config: &BindingConfig) -> Result<ImageSize, ConfigError> {
    let key = canonical_ratio(alias);
    config
        .aspect_ratios
        .get(key)
        .copied()
        .ok_or_else(|| ConfigError::MissingAspectRatio(key.to_string()))
}

/// Check that a table covers every canonical ratio with non-zero sizes.
pub fn validate_table(table: &AspectRatioTable) -> Result<(), ConfigError> {
    for key in CANONICAL_RATIOS {
        if !table.contains_key(*key) {
            return Err(ConfigError::MissingAspectRatio((*key).to_string()));
        }
    }
    for (ratio, size) in table {
        if size.width == 0 || size.height == 0 {
            return Err(ConfigError::InvalidAspectRatio {
                ratio: ratio.clone(),
                width: size.width,
                height: size.height,
            });
        }
    }
    Ok(())
}
