use crate::config::{IMAGE_JPEG_QUALITY, IMAGE_MAX_EDGE};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageResult;
use tracing::{debug, warn};

/// Converts an image to RGB JPEG with the longest edge capped at
/// `IMAGE_MAX_EDGE` pixels.
///
/// Returns the original bytes if decoding or encoding fails.
#[must_use]
pub fn preprocess_image(image_bytes: Vec<u8>) -> Vec<u8> {
    match normalize(&image_bytes) {
        Ok(processed) => {
            debug!(
                "Preprocessed image: {} -> {} bytes",
                image_bytes.len(),
                processed.len()
            );
            processed
        }
        Err(e) => {
            warn!("Image preprocessing failed, using original bytes: {e}");
            image_bytes
        }
    }
}

fn normalize(image_bytes: &[u8]) -> ImageResult<Vec<u8>> {
    let mut image = image::load_from_memory(image_bytes)?;

    if image.width().max(image.height()) > IMAGE_MAX_EDGE {
        // `resize` keeps the aspect ratio within the bounding box
        image = image.resize(IMAGE_MAX_EDGE, IMAGE_MAX_EDGE, FilterType::Lanczos3);
    }

    let rgb = image.to_rgb8();
    let mut output = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(
        &mut output,
        IMAGE_JPEG_QUALITY,
    ))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 128]));
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encodes");
        buf
    }

    #[test]
    fn test_large_image_is_downscaled_to_jpeg() {
        let processed = preprocess_image(png_bytes(3840, 1000));

        assert_eq!(
            image::guess_format(&processed).expect("known format"),
            ImageFormat::Jpeg
        );
        let decoded = image::load_from_memory(&processed).expect("decodes");
        assert_eq!(decoded.width(), 1920);
        assert_eq!(decoded.height(), 500);
    }

    #[test]
    fn test_small_image_keeps_dimensions() {
        let processed = preprocess_image(png_bytes(64, 32));
        let decoded = image::load_from_memory(&processed).expect("decodes");
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }

    #[test]
    fn test_invalid_bytes_returned_unchanged() {
        let garbage = vec![0u8, 1, 2, 3, 4];
        assert_eq!(preprocess_image(garbage.clone()), garbage);
    }
}
