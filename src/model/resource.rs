//! Embedded raster images (charts, logos, catalog pictures).

use serde::{Deserialize, Serialize};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Image bytes destined for `word/media/`.
///
/// Pixel dimensions, when known, drive the displayed height of images
/// placed at a fixed width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Encoded image, never dumped to JSON
    #[serde(skip_serializing, default)]
    pub data: Vec<u8>,

    /// MIME type, `image/png` or `image/jpeg`
    pub mime_type: String,

    /// Width in pixels
    pub width: Option<u32>,

    /// Height in pixels
    pub height: Option<u32>,
}

impl Resource {
    pub fn image(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            width: None,
            height: None,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::image(data, "image/png")
    }

    pub fn jpeg(data: Vec<u8>) -> Self {
        Self::image(data, "image/jpeg")
    }

    /// PNG when the bytes carry the PNG signature, JPEG otherwise.
    pub fn sniff(data: Vec<u8>) -> Self {
        if data.starts_with(PNG_SIGNATURE) {
            Self::png(data)
        } else {
            Self::jpeg(data)
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Height over width, when both dimensions are known.
    pub fn aspect_ratio(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 => Some(h as f64 / w as f64),
            _ => None,
        }
    }

    /// Extension of the media part name.
    pub fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpeg",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        let png = Resource::sniff(b"\x89PNG\r\n\x1a\n\0\0".to_vec()).with_dimensions(800, 600);
        assert_eq!(png.mime_type, "image/png");
        assert_eq!(png.extension(), "png");
        assert_eq!(png.aspect_ratio(), Some(0.75));

        let jpeg = Resource::sniff(vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(jpeg.extension(), "jpeg");
        assert_eq!(jpeg.aspect_ratio(), None);
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(Resource::image(Vec::new(), "image/tiff").extension(), "bin");
    }
}
