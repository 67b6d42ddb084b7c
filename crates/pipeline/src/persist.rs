//! Durable storage of generated images.
//!
//! Each image is decoded, re-encoded as PNG and written under a name
//! built by [`comfymcp_core::naming`]. A `.txt` sidecar with the same
//! stem records the prompt. Existing files are never overwritten: a
//! taken name gets the job's correlation id appended.

use std::fs::OpenOptions;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use comfymcp_core::naming;

use crate::error::GenerationError;

/// How many numbered variants to try after the correlation-id suffix.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Length of the correlation-id prefix used to disambiguate names.
const CLIENT_ID_SUFFIX_LEN: usize = 8;

/// The persisted result of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub filename: String,
    pub path: PathBuf,
    /// `None` when the prompt sidecar could not be written.
    pub sidecar_path: Option<PathBuf>,
    /// Markdown image link for the calling protocol.
    pub reference: String,
}

/// Output directory plus the URL under which its files are served.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    base_url: String,
}

/// Per-call values that end up in names and sidecars.
#[derive(Debug, Clone, Copy)]
pub struct SaveRequest<'a> {
    pub title: &'a str,
    pub prompt: &'a str,
    pub workflow: &'a str,
    pub client_id: &'a str,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            base_url: base_url.into(),
        }
    }

    /// Persist `bytes` stamped with the current local time.
    ///
    /// Blocking: decodes, encodes and writes synchronously.
    pub fn save(
        &self,
        bytes: &[u8],
        request: SaveRequest<'_>,
    ) -> Result<GeneratedImage, GenerationError> {
        self.save_at(bytes, request, &Local::now())
    }

    /// Persist `bytes` stamped with `timestamp`.
    pub fn save_at<Tz>(
        &self,
        bytes: &[u8],
        request: SaveRequest<'_>,
        timestamp: &DateTime<Tz>,
    ) -> Result<GeneratedImage, GenerationError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let png = reencode_png(bytes)?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            GenerationError::Persistence(format!(
                "cannot create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let base_name = naming::image_filename(timestamp, request.title, request.workflow);
        let (filename, path) = self.write_unique(&base_name, request.client_id, &png)?;

        let sidecar_path = self.write_sidecar(&filename, request.prompt);
        let reference = naming::markdown_reference(request.title, &self.base_url, &filename);

        tracing::info!(
            filename = %filename,
            bytes = png.len(),
            sidecar = sidecar_path.is_some(),
            "Image saved",
        );

        Ok(GeneratedImage {
            filename,
            path,
            sidecar_path,
            reference,
        })
    }

    /// Write `data` under the first free name derived from `base_name`.
    fn write_unique(
        &self,
        base_name: &str,
        client_id: &str,
        data: &[u8],
    ) -> Result<(String, PathBuf), GenerationError> {
        let short_id = client_id.get(..CLIENT_ID_SUFFIX_LEN).unwrap_or(client_id);

        let candidates = std::iter::once(base_name.to_string())
            .chain(std::iter::once(naming::disambiguate(base_name, short_id)))
            .chain(
                (2..=MAX_NAME_ATTEMPTS)
                    .map(|n| naming::disambiguate(base_name, &format!("{short_id}-{n}"))),
            );

        for name in candidates {
            let path = self.output_dir.join(&name);
            match write_new(&path, data) {
                Ok(()) => return Ok((name, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(filename = %name, "Filename taken, trying another");
                }
                Err(e) => {
                    return Err(GenerationError::Persistence(format!(
                        "cannot write {}: {e}",
                        path.display()
                    )));
                }
            }
        }

        Err(GenerationError::Persistence(format!(
            "no free filename for {base_name}"
        )))
    }

    /// Best effort: a failure is logged and reported as `None`.
    ///
    /// Like the image, an existing file under the sidecar name is left
    /// untouched.
    fn write_sidecar(&self, image_filename: &str, prompt: &str) -> Option<PathBuf> {
        let path = self
            .output_dir
            .join(naming::sidecar_filename(image_filename));
        match write_new(&path, prompt.as_bytes()) {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write prompt sidecar");
                None
            }
        }
    }
}

/// Decode any supported image format and encode it as PNG.
fn reencode_png(bytes: &[u8]) -> Result<Vec<u8>, GenerationError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| GenerationError::Persistence(format!("cannot decode image: {e}")))?;

    let mut out = Cursor::new(Vec::with_capacity(bytes.len()));
    decoded
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| GenerationError::Persistence(format!("cannot encode PNG: {e}")))?;
    Ok(out.into_inner())
}

/// Create `path` exclusively and write `data`; removes a partial file.
fn write_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let written = file.write_all(data).and_then(|()| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}
