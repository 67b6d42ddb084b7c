//! Directory listing, pagination and thumbnail generation.
//!
//! Everything here is blocking filesystem / image work; handlers run it
//! on the blocking pool.

use std::io;
use std::path::{Path, PathBuf};

use comfymcp_core::naming::IMAGE_EXTENSION;
use image::imageops::FilterType;
use serde::Serialize;

/// Images per page.
pub const PAGE_SIZE: usize = 12;

/// Subdirectory of the output directory holding thumbnails.
pub const THUMBNAIL_DIR: &str = "thumbnails";

/// Bounding box for thumbnails, in pixels.
pub const THUMBNAIL_SIZE: u32 = 150;

/// Pagers with at most this many pages list every page.
const FULL_PAGER_MAX: usize = 7;

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// `true` for names ending in `.png`, case-insensitively.
pub fn is_png(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(IMAGE_EXTENSION))
}

/// PNG file names in `dir`, newest first.
///
/// Generated names start with a sortable timestamp, so reverse
/// lexicographic order is reverse chronological order.
pub fn list_pngs(dir: &Path) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_png(name) {
                files.push(name.to_string());
            }
        }
    }
    files.sort_unstable_by(|a, b| b.cmp(a));
    Ok(files)
}

pub fn thumbnail_path(output_dir: &Path, filename: &str) -> PathBuf {
    output_dir.join(THUMBNAIL_DIR).join(filename)
}

/// Create the thumbnail for `filename` unless it already exists.
///
/// Returns whether a new thumbnail was written. Images already inside
/// the bounding box are stored unscaled.
pub fn ensure_thumbnail(output_dir: &Path, filename: &str) -> Result<bool, image::ImageError> {
    let target = thumbnail_path(output_dir, filename);
    if target.exists() {
        return Ok(false);
    }

    let img = image::open(output_dir.join(filename))?;
    let thumb = if img.width() > THUMBNAIL_SIZE || img.height() > THUMBNAIL_SIZE {
        img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3)
    } else {
        img
    };
    thumb.save_with_format(&target, image::ImageFormat::Png)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageLink {
    Page { number: usize, current: bool },
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub filename: String,
    pub view_url: String,
    pub thumb_url: String,
}

impl GalleryItem {
    fn new(filename: String) -> Self {
        Self {
            view_url: format!("/view/{filename}"),
            thumb_url: format!("/thumb/{filename}"),
            filename,
        }
    }
}

/// One page of the gallery listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryPage {
    pub page: usize,
    pub total_pages: usize,
    pub total_images: usize,
    pub previous: Option<usize>,
    pub next: Option<usize>,
    pub links: Vec<PageLink>,
    pub images: Vec<GalleryItem>,
}

/// Slice `files` (already ordered) into page `page` (1-based).
///
/// A page past the end yields an empty image list.
pub fn paginate(files: Vec<String>, page: usize) -> GalleryPage {
    let page = page.max(1);
    let total_images = files.len();
    let total_pages = total_images.div_ceil(PAGE_SIZE);

    let images = files
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .map(GalleryItem::new)
        .collect();

    GalleryPage {
        page,
        total_pages,
        total_images,
        previous: (page > 1).then(|| page - 1),
        next: (page < total_pages).then(|| page + 1),
        links: page_links(page, total_pages),
        images,
    }
}

/// Page-number window around `page`.
///
/// Up to seven pages are all listed. Beyond that the first and last
/// pages are always shown, with ellipses around a window of five pages
/// at either end or three pages in the middle.
pub fn page_links(page: usize, total_pages: usize) -> Vec<PageLink> {
    let number = |n: usize| PageLink::Page {
        number: n,
        current: n == page,
    };

    if total_pages <= FULL_PAGER_MAX {
        return (1..=total_pages).map(number).collect();
    }

    let mut links = Vec::with_capacity(FULL_PAGER_MAX + 2);
    if page <= 4 {
        links.extend((1..=5).map(number));
        links.push(PageLink::Ellipsis);
        links.push(number(total_pages));
    } else if page + 3 >= total_pages {
        links.push(number(1));
        links.push(PageLink::Ellipsis);
        links.extend((total_pages - 4..=total_pages).map(number));
    } else {
        links.push(number(1));
        links.push(PageLink::Ellipsis);
        links.extend((page - 1..=page + 1).map(number));
        links.push(PageLink::Ellipsis);
        links.push(number(total_pages));
    }
    links
}
