//! Raster tile decoding via the `image` crate.

use image::{Rgba, RgbaImage};

use super::{DecodeError, Decoder};

/// Whether this build can hand out premultiplied-alpha images.
///
/// Resolved at compile time; hosts check it once at startup instead of
/// probing the decoder per tile.
pub const PREMULTIPLIED_ALPHA_SUPPORTED: bool = true;

/// Decodes PNG/JPEG/WebP tiles into RGBA8 images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder {
    premultiply: bool,
}

impl ImageDecoder {
    /// Creates a decoder producing straight (non-premultiplied) alpha.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests premultiplied alpha output.
    ///
    /// Ignored when [`PREMULTIPLIED_ALPHA_SUPPORTED`] is false.
    pub fn with_premultiplied_alpha(mut self, enabled: bool) -> Self {
        self.premultiply = enabled && PREMULTIPLIED_ALPHA_SUPPORTED;
        self
    }

    /// Returns true if decoded images have premultiplied alpha.
    pub fn premultiplied(&self) -> bool {
        self.premultiply
    }

    /// Builds a solid-colour tile, used as the fallback for undecodable data.
    pub fn blank(size: u32, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(size, size, color)
    }
}

fn premultiply(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = u16::from(pixel[3]);
        for channel in 0..3 {
            pixel[channel] = ((u16::from(pixel[channel]) * alpha + 127) / 255) as u8;
        }
    }
}

impl Decoder for ImageDecoder {
    type Payload = RgbaImage;

    fn decode(&self, data: &[u8]) -> Result<RgbaImage, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut image = image::load_from_memory(data)
            .map_err(|e| DecodeError::Image(e.to_string()))?
            .to_rgba8();

        if self.premultiply {
            premultiply(&mut image);
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_png(image: &RgbaImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .expect("encode png");
        buffer.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let source = ImageDecoder::blank(4, Rgba([10, 20, 30, 255]));
        let decoded = ImageDecoder::new().decode(&encode_png(&source)).unwrap();

        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_decode_premultiplied() {
        let source = ImageDecoder::blank(2, Rgba([200, 100, 0, 128]));
        let decoder = ImageDecoder::new().with_premultiplied_alpha(true);
        assert!(decoder.premultiplied());

        let decoded = decoder.decode(&encode_png(&source)).unwrap();
        // 200 * 128 / 255 rounds to 100
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([100, 50, 0, 128]));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = ImageDecoder::new().decode(b"definitely not an image");
        assert!(matches!(result, Err(DecodeError::Image(_))));
    }

    #[test]
    fn test_decode_empty_fails() {
        assert_eq!(ImageDecoder::new().decode(&[]), Err(DecodeError::Empty));
    }
}
