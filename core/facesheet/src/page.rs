use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::error::FaceSheetError;

/// A decoded page from the input archive.
///
/// The raster is never modified after decoding; every derived image
/// (grayscale, binarized, cropped) is a fresh buffer.
#[derive(Debug, Clone)]
pub struct PageImage {
    index: usize,
    name: String,
    image: RgbImage,
}

impl PageImage {
    /// Wrap an already decoded RGB raster.
    pub fn new(index: usize, name: impl Into<String>, image: RgbImage) -> Result<Self, FaceSheetError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FaceSheetError::ZeroDimensions);
        }
        Ok(Self {
            index,
            name: name.into(),
            image,
        })
    }

    /// Decode raw entry bytes (PNG, JPEG, or WebP) into an RGB page.
    pub fn decode(index: usize, name: impl Into<String>, bytes: &[u8]) -> Result<Self, FaceSheetError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| FaceSheetError::DecodeError(e.to_string()))?;
        let rgb = if decoded.color().has_alpha() {
            flatten_alpha(&decoded)
        } else {
            decoded.to_rgb8()
        };
        Self::new(index, name, rgb)
    }

    /// Zero-based position of the page in the archive.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Archive entry name, used verbatim in reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Page width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Page height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The decoded raster.
    pub fn rgb(&self) -> &RgbImage {
        &self.image
    }

    /// Single-channel luma copy of the page.
    pub fn to_grayscale(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}

/// Flatten alpha channel by compositing onto a white background.
pub(crate) fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    let rgba: RgbaImage = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }

    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageEncoder;

    fn encode_png(img: &DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
        encoder
            .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())
            .unwrap();
        buffer
    }

    #[test]
    fn decode_png_keeps_dimensions_and_name() {
        let png = encode_png(&DynamicImage::ImageRgb8(RgbImage::new(40, 30)));
        let page = PageImage::decode(2, "page.png", &png).unwrap();
        assert_eq!(page.index(), 2);
        assert_eq!(page.name(), "page.png");
        assert_eq!((page.width(), page.height()), (40, 30));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = PageImage::decode(0, "notes.txt", b"not an image");
        assert!(matches!(result, Err(FaceSheetError::DecodeError(_))));
    }

    #[test]
    fn transparent_pixels_become_white() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([255, 0, 0, 0]));
        let png = encode_png(&DynamicImage::ImageRgba8(rgba));
        let page = PageImage::decode(0, "alpha.png", &png).unwrap();
        assert_eq!(page.rgb().get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn flatten_alpha_preserves_opaque() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([100, 150, 200, 255]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([100, 150, 200]));
    }

    #[test]
    fn zero_sized_raster_is_rejected() {
        let result = PageImage::new(0, "empty", RgbImage::new(0, 10));
        assert!(matches!(result, Err(FaceSheetError::ZeroDimensions)));
    }

    #[test]
    fn grayscale_is_a_copy() {
        let mut rgb = RgbImage::new(2, 2);
        rgb.put_pixel(0, 0, image::Rgb([255, 255, 255]));
        let page = PageImage::new(0, "p", rgb).unwrap();
        let gray = page.to_grayscale();
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(page.rgb().get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }
}
