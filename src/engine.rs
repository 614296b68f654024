// Image engine module
// Decoding, encoding and describing raster images via the image crate

use anyhow::{Context, Result};
use image::{ColorType, DynamicImage, ImageFormat};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// The engine the session controller drives to load and persist images.
///
/// Methods report failures as `anyhow` errors; the controller wraps them into
/// its typed error kinds.
pub trait ImageEngine {
    type Bitmap;

    /// Decode the file at `path` into an in-memory bitmap
    fn decode(&self, path: &Path) -> Result<Self::Bitmap>;

    /// Persist `bitmap` to `path`
    fn encode(&self, bitmap: &Self::Bitmap, path: &Path) -> Result<()>;

    /// Ordered property-name/value pairs describing `bitmap`
    fn describe(&self, bitmap: &Self::Bitmap) -> Vec<(String, String)>;

    /// Identifier string for the about dialog
    fn version(&self) -> String;
}

/// A decoded in-memory image plus the metadata captured at decode time
#[derive(Debug)]
pub struct Bitmap {
    /// Decoded pixel data
    pub image: DynamicImage,
    /// Format detected from the file content, if decoded from a file
    pub format: Option<ImageFormat>,
    /// Size of the source file in bytes
    pub file_size: u64,
}

impl Bitmap {
    /// Pixels converted to the BGRA layout Wayland shm buffers expect
    pub fn bgra_pixels(&self) -> (u32, u32, Vec<u8>) {
        let rgba = self.image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut data = rgba.into_raw();
        for pixel in data.chunks_exact_mut(4) {
            pixel.swap(0, 2); // Swap R and B
        }
        (width, height, data)
    }
}

/// Image engine backed by the `image` crate
pub struct PhotoEngine;

impl PhotoEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ImageEngine for PhotoEngine {
    type Bitmap = Bitmap;

    fn decode(&self, path: &Path) -> Result<Bitmap> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;

        // Detect the format from the content rather than the extension
        let format = image::guess_format(&data).context("Failed to detect image format")?;
        let image = image::load(Cursor::new(&data), format).context("Failed to decode image")?;

        Ok(Bitmap {
            image,
            format: Some(format),
            file_size: data.len() as u64,
        })
    }

    fn encode(&self, bitmap: &Bitmap, path: &Path) -> Result<()> {
        // The target format follows from the extension of the path
        bitmap
            .image
            .save(path)
            .with_context(|| format!("Failed to write image file: {}", path.display()))
    }

    fn describe(&self, bitmap: &Bitmap) -> Vec<(String, String)> {
        let format = match bitmap.format {
            Some(f) => format!("{f:?}"),
            None => "unknown".to_string(),
        };
        vec![
            (
                "dimensions".to_string(),
                format!("{} x {}", bitmap.image.width(), bitmap.image.height()),
            ),
            ("mode".to_string(), color_name(bitmap.image.color())),
            ("format".to_string(), format),
            ("file size".to_string(), format!("{} bytes", bitmap.file_size)),
        ]
    }

    fn version(&self) -> String {
        format!("rfoto image engine {} (image-rs)", env!("CARGO_PKG_VERSION"))
    }
}

fn color_name(color: ColorType) -> String {
    format!("{color:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::io::Write;
    use tempfile::tempdir;

    fn test_bitmap() -> Bitmap {
        let image = RgbImage::from_fn(4, 3, |x, y| image::Rgb([x as u8 * 40, y as u8 * 70, 200]));
        Bitmap {
            image: DynamicImage::ImageRgb8(image),
            format: None,
            file_size: 0,
        }
    }

    #[test]
    fn decode_rejects_missing_file() {
        let engine = PhotoEngine::new();
        let err = engine.decode(Path::new("/no/such/file.jpg")).unwrap_err();
        assert!(err.to_string().contains("Failed to read image file"));
    }

    #[test]
    fn decode_rejects_non_image_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.jpg");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"this is not an image").unwrap();

        let engine = PhotoEngine::new();
        assert!(engine.decode(&path).is_err());
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.png");
        let engine = PhotoEngine::new();
        let bitmap = test_bitmap();

        engine.encode(&bitmap, &path).unwrap();
        let reloaded = engine.decode(&path).unwrap();

        assert_eq!(reloaded.image.width(), 4);
        assert_eq!(reloaded.image.height(), 3);
        assert_eq!(reloaded.format, Some(ImageFormat::Png));
        // PNG is lossless, the pixels must come back unchanged
        assert_eq!(reloaded.image.to_rgb8().as_raw(), bitmap.image.to_rgb8().as_raw());
    }

    #[test]
    fn describe_reports_dimensions_and_mode() {
        let engine = PhotoEngine::new();
        let props = engine.describe(&test_bitmap());
        assert!(props.contains(&("dimensions".to_string(), "4 x 3".to_string())));
        assert!(props.contains(&("mode".to_string(), "Rgb8".to_string())));
    }

    #[test]
    fn bgra_pixels_swaps_channels() {
        let bitmap = test_bitmap();
        let (width, height, data) = bitmap.bgra_pixels();
        assert_eq!((width, height), (4, 3));
        assert_eq!(data.len(), 4 * 3 * 4);
        // pixel (1, 0) is Rgb(40, 0, 200) -> BGRA (200, 0, 40, 255)
        assert_eq!(&data[4..8], &[200, 0, 40, 255]);
    }
}
