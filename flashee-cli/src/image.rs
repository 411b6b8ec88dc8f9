//! Flash image files
//!
//! An image is the raw content of a flash device stored as a file. Its length
//! must be a multiple of the page size; the page count follows from it.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use flashee::RamFlash;

/// Create an erased image of `page_count` pages.
pub fn create(path: &Path, page_size: u32, page_count: u32, force: bool) -> Result<RamFlash> {
    if path.exists() && !force {
        anyhow::bail!("Image '{}' already exists. Use --force to overwrite it.", path.display());
    }
    if page_size == 0 || page_count == 0 {
        anyhow::bail!("Page size and page count must be non-zero");
    }
    let flash = RamFlash::new(page_count, page_size);
    save(path, &flash)?;
    log::info!(
        "created {} with {} pages of {} bytes",
        path.display(),
        page_count,
        page_size
    );
    Ok(flash)
}

/// Load an image as a RAM flash device.
pub fn load(path: &Path, page_size: u32) -> Result<RamFlash> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    let len = data.len();
    let flash = RamFlash::from_bytes(data, page_size).with_context(|| {
        format!(
            "Image '{}' ({} bytes) is not a whole number of {}-byte pages",
            path.display(),
            len,
            page_size
        )
    })?;
    log::debug!("loaded {} ({} bytes)", path.display(), len);
    Ok(flash)
}

/// Replace the image file with the content of `flash`.
///
/// The data goes to a temporary file next to the image first, so an
/// interrupted save leaves the old image in place.
pub fn save(path: &Path, flash: &RamFlash) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(flash.as_bytes())
        .context("Failed to write image data")?;
    file.persist(path)
        .with_context(|| format!("Failed to save image: {}", path.display()))?;
    log::debug!("saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashee::FlashDevice;

    #[test]
    fn test_create_load_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flash.img");

        let flash = create(&path, 256, 4, false).unwrap();
        assert_eq!(flash.length(), 1024);
        assert!(create(&path, 256, 4, false).is_err());

        let mut flash = load(&path, 256).unwrap();
        flash.write_page(10, &[0x12]).unwrap();
        save(&path, &flash).unwrap();

        let mut flash = load(&path, 256).unwrap();
        assert_eq!(flash.read_byte(10).unwrap(), 0x12);
        assert_eq!(flash.page_count(), 4);
    }

    #[test]
    fn test_load_rejects_partial_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.img");
        std::fs::write(&path, [0xFF; 300]).unwrap();
        let err = load(&path, 256).unwrap_err();
        assert!(format!("{:#}", err).contains("whole number"));
    }
}
