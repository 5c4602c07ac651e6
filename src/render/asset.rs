//! Static images looked up by key.

use crate::error::Result;
use crate::model::Resource;
use std::path::{Path, PathBuf};

/// Source of the pictures referenced by the content catalog.
pub trait AssetSource: Send + Sync {
    /// Load the image stored under `key`; `Ok(None)` when there is none.
    fn load(&self, key: &str) -> Result<Option<Resource>>;
}

/// Extensions tried, in order.
const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Images stored as `<key>.png`, `<key>.jpg` or `<key>.jpeg` in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory searched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, key: &str) -> Option<PathBuf> {
        let lower = key.to_lowercase();
        let mut stems = vec![key];
        if lower != key {
            stems.push(&lower);
        }
        stems.into_iter().find_map(|stem| {
            EXTENSIONS
                .iter()
                .map(|ext| self.root.join(format!("{}.{}", stem, ext)))
                .find(|p| p.is_file())
        })
    }
}

impl AssetSource for DirectoryAssets {
    fn load(&self, key: &str) -> Result<Option<Resource>> {
        if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
            log::warn!("invalid asset key '{}'", key);
            return Ok(None);
        }

        let Some(path) = self.find(key) else {
            log::debug!("no asset for '{}' in {}", key, self.root.display());
            return Ok(None);
        };

        let data = std::fs::read(&path)?;
        let (width, height) = image::image_dimensions(&path)?;
        Ok(Some(Resource::sniff(data).with_dimensions(width, height)))
    }
}

/// Asset source that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetSource for NoAssets {
    fn load(&self, _key: &str) -> Result<Option<Resource>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    #[test]
    fn test_directory_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("logo.png"), 8, 4);

        let assets = DirectoryAssets::new(dir.path());
        let res = assets.load("LOGO").unwrap().unwrap();
        assert_eq!(res.mime_type, "image/png");
        assert_eq!(res.width, Some(8));
        assert_eq!(res.aspect_ratio(), Some(0.5));

        assert!(assets.load("missing").unwrap().is_none());
        assert!(assets.load("../logo").unwrap().is_none());
    }

    #[test]
    fn test_no_assets() {
        assert!(NoAssets.load("LOGO").unwrap().is_none());
    }
}
