use tracing::debug;

use crate::error::FaceSheetError;
use crate::page::PageImage;

/// Axis-aligned face rectangle in page pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner (pixels).
    pub x: u32,
    /// Y coordinate of the top-left corner (pixels).
    pub y: u32,
    /// Width of the box (pixels).
    pub width: u32,
    /// Height of the box (pixels).
    pub height: u32,
}

impl BoundingBox {
    /// Box with top-left corner `(x, y)` and the given size.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the box has area and lies entirely inside a
    /// `image_width` × `image_height` raster.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= image_width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= image_height)
    }
}

/// Raw detector output. Backends may report boxes that hang off the
/// image edge; [`FaceLocator`] clips them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBounds {
    /// Left edge (pixels, may be negative).
    pub x: f64,
    /// Top edge (pixels, may be negative).
    pub y: f64,
    /// Width (pixels).
    pub width: f64,
    /// Height (pixels).
    pub height: f64,
    /// Detection confidence score, if the backend reports one.
    pub confidence: f64,
}

impl FaceBounds {
    /// Clip to the image rectangle. Returns `None` when nothing with
    /// positive area is left.
    pub fn clip(&self, image_width: u32, image_height: u32) -> Option<BoundingBox> {
        if !(self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()) {
            return None;
        }
        let left = self.x.round().clamp(0.0, image_width as f64);
        let top = self.y.round().clamp(0.0, image_height as f64);
        let right = (self.x + self.width).round().clamp(0.0, image_width as f64);
        let bottom = (self.y + self.height).round().clamp(0.0, image_height as f64);

        if right <= left || bottom <= top {
            return None;
        }
        Some(BoundingBox::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// Multi-scale sliding-window parameters for cascade detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    /// Ratio between consecutive pyramid scales (> 1.0).
    pub scale_factor: f64,
    /// Overlapping raw hits required to keep a detection.
    pub min_neighbors: u32,
    /// Smallest face side length searched for, in pixels.
    pub min_size: u32,
}

impl Default for CascadeParams {
    /// Tuned for scanned pages: high neighbor count and minimum size keep
    /// printed-texture false positives out.
    fn default() -> Self {
        Self {
            scale_factor: 1.15,
            min_neighbors: 11,
            min_size: 45,
        }
    }
}

impl CascadeParams {
    /// Reject settings no multi-scale search can run with.
    pub fn validate(&self) -> Result<(), FaceSheetError> {
        if !(self.scale_factor.is_finite() && self.scale_factor > 1.0) {
            return Err(FaceSheetError::InvalidParams(format!(
                "scale factor must be > 1.0, got {}",
                self.scale_factor
            )));
        }
        if self.min_size == 0 {
            return Err(FaceSheetError::InvalidParams("minimum face size must be > 0".into()));
        }
        Ok(())
    }
}

/// Pluggable face detection backend.
///
/// Implement this trait to provide a custom face detector (OpenCV bindings,
/// ONNX, etc.) and pass it to [`crate::PageProcessor::new`].
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    ///
    /// `params` are the search settings for this call. A backend that cannot
    /// honour one of them should say so in its logs, not silently drop it.
    fn detect(&self, gray: &[u8], width: u32, height: u32, params: &CascadeParams) -> Vec<FaceBounds>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for &D {
    fn detect(&self, gray: &[u8], width: u32, height: u32, params: &CascadeParams) -> Vec<FaceBounds> {
        (**self).detect(gray, width, height, params)
    }
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&self, gray: &[u8], width: u32, height: u32, params: &CascadeParams) -> Vec<FaceBounds> {
        (**self).detect(gray, width, height, params)
    }
}

/// Runs a [`FaceDetector`] over a page with fixed [`CascadeParams`].
pub struct FaceLocator<D> {
    detector: D,
    params: CascadeParams,
}

impl<D: FaceDetector> FaceLocator<D> {
    /// Locator using the default parameters (1.15 / 11 / 45).
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            params: CascadeParams::default(),
        }
    }

    /// Replace the search parameters after checking them.
    pub fn params(mut self, params: CascadeParams) -> Result<Self, FaceSheetError> {
        params.validate()?;
        self.params = params;
        Ok(self)
    }

    /// Parameters handed to the detector on every page.
    pub fn cascade_params(&self) -> &CascadeParams {
        &self.params
    }

    /// The wrapped backend.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Face boxes in detector order. Boxes are clipped to the page;
    /// any that fall completely outside it are dropped.
    pub fn locate(&self, page: &PageImage) -> Vec<BoundingBox> {
        let gray = page.to_grayscale();
        let (width, height) = (gray.width(), gray.height());
        let raw = self.detector.detect(gray.as_raw(), width, height, &self.params);
        let raw_count = raw.len();

        let boxes: Vec<BoundingBox> = raw.iter().filter_map(|f| f.clip(width, height)).collect();
        debug!(page = page.name(), raw = raw_count, kept = boxes.len(), "located faces");
        boxes
    }
}
