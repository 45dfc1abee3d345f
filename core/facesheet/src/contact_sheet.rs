use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::debug;

use crate::error::FaceSheetError;
use crate::face_detector::BoundingBox;
use crate::page::PageImage;

/// Side length of one square thumbnail cell (pixels).
pub const THUMBNAIL_SIZE: u32 = 100;

/// Number of thumbnail columns in every contact sheet.
pub const SHEET_COLUMNS: u32 = 5;

/// Grid rows needed for `count` thumbnails.
pub fn sheet_rows(count: usize) -> u32 {
    count.div_ceil(SHEET_COLUMNS as usize) as u32
}

/// Top-left pixel of thumbnail `i` (row-major).
pub fn cell_origin(i: usize) -> (u32, u32) {
    let i = i as u32;
    (
        (i % SHEET_COLUMNS) * THUMBNAIL_SIZE,
        (i / SHEET_COLUMNS) * THUMBNAIL_SIZE,
    )
}

/// Face thumbnails tiled into a fixed five-column grid.
#[derive(Debug, Clone)]
pub struct ContactSheet {
    image: RgbImage,
    face_count: usize,
}

impl ContactSheet {
    /// The tiled sheet.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Take the tiled sheet out.
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Number of thumbnails on the sheet.
    pub fn face_count(&self) -> usize {
        self.face_count
    }

    /// Always `5 * THUMBNAIL_SIZE`.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// One thumbnail height per row.
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Crops faces out of a page and lays them out on a contact sheet.
#[derive(Debug, Clone)]
pub struct ContactSheetBuilder {
    filter: FilterType,
    background: Rgb<u8>,
}

impl Default for ContactSheetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactSheetBuilder {
    /// Catmull-Rom thumbnails on a black background.
    pub fn new() -> Self {
        Self {
            filter: FilterType::CatmullRom,
            background: Rgb([0, 0, 0]),
        }
    }

    /// Resampling filter for thumbnails (default: bicubic Catmull-Rom).
    pub fn filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Fill color for unused cells (default: black).
    pub fn background(mut self, color: Rgb<u8>) -> Self {
        self.background = color;
        self
    }

    /// Crop `bbox` out of `page` into a new buffer and resize it to a
    /// square thumbnail, ignoring the box's aspect ratio.
    pub fn thumbnail(&self, page: &PageImage, bbox: &BoundingBox) -> Result<RgbImage, FaceSheetError> {
        if !bbox.fits_within(page.width(), page.height()) {
            return Err(FaceSheetError::InvalidBox {
                x: bbox.x,
                y: bbox.y,
                width: bbox.width,
                height: bbox.height,
                image_width: page.width(),
                image_height: page.height(),
            });
        }
        let face = imageops::crop_imm(page.rgb(), bbox.x, bbox.y, bbox.width, bbox.height).to_image();
        Ok(imageops::resize(&face, THUMBNAIL_SIZE, THUMBNAIL_SIZE, self.filter))
    }

    /// Build the sheet for `boxes`, in input order. At least one box is
    /// required.
    pub fn build(&self, page: &PageImage, boxes: &[BoundingBox]) -> Result<ContactSheet, FaceSheetError> {
        if boxes.is_empty() {
            return Err(FaceSheetError::EmptyFaceSet);
        }

        let rows = sheet_rows(boxes.len());
        let mut canvas = RgbImage::from_pixel(SHEET_COLUMNS * THUMBNAIL_SIZE, rows * THUMBNAIL_SIZE, self.background);

        for (i, bbox) in boxes.iter().enumerate() {
            let thumb = self.thumbnail(page, bbox)?;
            let (x, y) = cell_origin(i);
            imageops::replace(&mut canvas, &thumb, x as i64, y as i64);
        }

        debug!(
            page = page.name(),
            faces = boxes.len(),
            width = canvas.width(),
            height = canvas.height(),
            "built contact sheet"
        );

        Ok(ContactSheet {
            image: canvas,
            face_count: boxes.len(),
        })
    }
}
