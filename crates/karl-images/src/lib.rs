//! Image-Citation Sink (C8, file side): decodes crawler-submitted image
//! bytes, measures their geometry, and persists the original plus a
//! 150x150 thumbnail under stable filenames keyed by `ImageCitationId`.
//!
//! Every write goes through a temp-file-then-rename so a reader never
//! observes a partially-written file; the facade additionally orders
//! "insert citation row, write both files, then point the product at it"
//! so a visible `image_citation` reference always has both files on disk.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageFormat;
use karl_core::ImageCitationId;

/// Thumbnail edge length in pixels, per the component design.
pub const THUMBNAIL_SIZE: u32 = 150;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("filesystem error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> ImageError {
    ImageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Decodes `bytes` and returns `(width, height)`.
///
/// # Errors
///
/// Returns [`ImageError::Decode`] if the bytes are not a supported format.
pub fn measure(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
    let img = image::load_from_memory(bytes)?;
    Ok((img.width(), img.height()))
}

/// Decodes `bytes` and re-encodes a `THUMBNAIL_SIZE`x`THUMBNAIL_SIZE` PNG
/// thumbnail, preserving aspect ratio within that bounding box.
///
/// # Errors
///
/// Returns [`ImageError::Decode`] if decoding or re-encoding fails.
pub fn make_thumbnail(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory(bytes)?;
    let thumb = img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);

    let mut buf = Vec::new();
    thumb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Filenames are not configurable: `<ic_id>_orig.png` for the decoded
/// original, `<ic_id>.png` for the thumbnail.
#[must_use]
pub fn original_path(dir: &Path, id: ImageCitationId) -> PathBuf {
    dir.join(format!("{}_orig.png", id.unseal()))
}

#[must_use]
pub fn thumbnail_path(dir: &Path, id: ImageCitationId) -> PathBuf {
    dir.join(format!("{}.png", id.unseal()))
}

/// Writes `bytes` to `path` via a sibling `.tmp` file plus rename, so a
/// concurrent reader never observes a partial write.
///
/// # Errors
///
/// Returns [`ImageError::Io`] if either the write or the rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ImageError> {
    let mut tmp_name = path.file_name().map(std::ffi::OsStr::to_owned).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, bytes).map_err(|e| io_err(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Decodes `bytes`, writes the re-encoded original PNG and its thumbnail
/// under `dir`, and returns the original's `(width, height)`. Does not
/// touch the database; the facade persists the `ImageCitation` row and
/// product reference around this call.
///
/// # Errors
///
/// Returns [`ImageError::Decode`] if `bytes` cannot be decoded, or
/// [`ImageError::Io`] if either file cannot be written.
pub fn persist(dir: &Path, id: ImageCitationId, bytes: &[u8]) -> Result<(u32, u32), ImageError> {
    let img = image::load_from_memory(bytes)?;
    let dims = (img.width(), img.height());

    let mut original_png = Vec::new();
    img.write_to(&mut Cursor::new(&mut original_png), ImageFormat::Png)?;

    let thumb = img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
    let mut thumbnail_png = Vec::new();
    thumb.write_to(&mut Cursor::new(&mut thumbnail_png), ImageFormat::Png)?;

    write_atomic(&original_path(dir, id), &original_png)?;
    write_atomic(&thumbnail_path(dir, id), &thumbnail_png)?;

    tracing::info!(image_citation_id = %id, width = dims.0, height = dims.1, "persisted image citation files");
    Ok(dims)
}
