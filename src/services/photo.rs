//! Photo storage for checklist items.
//!
//! Photos are written to `PHOTO_DIR/<check_id>/<photo_id>.<ext>` and served
//! statically under `/photos/`. The URL stored on the item is the only link
//! between the checklist and the file, so URL parsing is strict: anything
//! that does not map back to `<uuid>/<uuid>.<known ext>` is rejected.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const PHOTO_URL_PREFIX: &str = "/photos";

const ALLOWED: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
];

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("unsupported photo type: {0}")]
    UnsupportedType(String),
    #[error("photo is empty")]
    Empty,
    #[error("photo too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("photo storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// File extension for an accepted `Content-Type`, ignoring parameters and case.
#[must_use]
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    ALLOWED
        .iter()
        .find(|(allowed, _)| *allowed == mime)
        .map(|(_, ext)| *ext)
}

/// Check type and size before touching the disk.
///
/// # Errors
///
/// `UnsupportedType`, `Empty` or `TooLarge`.
pub fn validate_upload(content_type: &str, size: usize, max: usize) -> Result<&'static str, PhotoError> {
    let ext = extension_for(content_type).ok_or_else(|| PhotoError::UnsupportedType(content_type.to_owned()))?;
    if size == 0 {
        return Err(PhotoError::Empty);
    }
    if size > max {
        return Err(PhotoError::TooLarge { size, max });
    }
    Ok(ext)
}

#[must_use]
pub fn photo_url(check_id: Uuid, photo_id: Uuid, ext: &str) -> String {
    format!("{PHOTO_URL_PREFIX}/{check_id}/{photo_id}.{ext}")
}

/// Map a stored photo URL back to its file under `dir`.
#[must_use]
pub fn path_for_url(dir: &Path, url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix(PHOTO_URL_PREFIX)?.strip_prefix('/')?;
    let (check_part, file_part) = rest.split_once('/')?;
    let check_id = Uuid::parse_str(check_part).ok()?;
    let (stem, ext) = file_part.rsplit_once('.')?;
    let photo_id = Uuid::parse_str(stem).ok()?;
    if !ALLOWED.iter().any(|(_, allowed)| *allowed == ext) {
        return None;
    }
    Some(dir.join(check_id.to_string()).join(format!("{photo_id}.{ext}")))
}

/// Validate and write one photo. Returns the new photo id and its public URL.
///
/// # Errors
///
/// Validation errors from `validate_upload`, or `Io` if the write fails.
pub async fn store_photo(
    dir: &Path,
    check_id: Uuid,
    content_type: &str,
    bytes: &[u8],
    max: usize,
) -> Result<(Uuid, String), PhotoError> {
    let ext = validate_upload(content_type, bytes.len(), max)?;
    let photo_id = Uuid::new_v4();
    let check_dir = dir.join(check_id.to_string());
    tokio::fs::create_dir_all(&check_dir).await?;
    tokio::fs::write(check_dir.join(format!("{photo_id}.{ext}")), bytes).await?;
    tracing::debug!(%check_id, %photo_id, size = bytes.len(), "photo stored");
    Ok((photo_id, photo_url(check_id, photo_id, ext)))
}

/// Remove the file behind `url`. Already-missing files are not an error.
///
/// # Errors
///
/// `Io` for failures other than not-found.
pub async fn delete_photo_file(dir: &Path, url: &str) -> Result<(), PhotoError> {
    let Some(path) = path_for_url(dir, url) else {
        tracing::warn!(%url, "photo url does not map to storage; skipping delete");
        return Ok(());
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove every photo stored for a check.
///
/// # Errors
///
/// `Io` for failures other than not-found.
pub async fn delete_check_photos(dir: &Path, check_id: Uuid) -> Result<(), PhotoError> {
    match tokio::fs::remove_dir_all(dir.join(check_id.to_string())).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "photo_test.rs"]
mod tests;
