use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::FaceSheetError;
use crate::face_detector::{CascadeParams, FaceBounds, FaceDetector};

/// Minimum face size the SeetaFace funnel cascade supports.
const RUSTFACE_MIN_FACE_SIZE: u32 = 20;

/// Face detector backed by the `rustface` crate (SeetaFace funnel cascade).
///
/// The model file is read once on construction and cloned into a fresh
/// detector per page. `scale_factor` and `min_size` map onto the pyramid
/// settings. The funnel cascade merges overlapping windows itself and has
/// no neighbor count, so `min_neighbors` is stood in for by the score
/// threshold and a warning is logged the first time it is seen.
pub struct RustfaceDetector {
    model: rustface::Model,
    score_thresh: f64,
    neighbors_warned: AtomicBool,
}

impl RustfaceDetector {
    /// Load a SeetaFace frontal model (e.g. `seeta_fd_frontal_v1.0.bin`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FaceSheetError> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| FaceSheetError::ClassifierLoadError(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&data)
    }

    /// Load a model from memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FaceSheetError> {
        let model = rustface::read_model(std::io::Cursor::new(data))
            .map_err(|e| FaceSheetError::ClassifierLoadError(e.to_string()))?;
        Ok(Self {
            model,
            score_thresh: 2.0,
            neighbors_warned: AtomicBool::new(false),
        })
    }

    /// Classifier score a window must reach to count as a face (default: 2.0).
    pub fn score_thresh(mut self, thresh: f64) -> Self {
        self.score_thresh = thresh;
        self
    }

    fn warn_min_neighbors(&self, params: &CascadeParams) {
        if params.min_neighbors > 0 && !self.neighbors_warned.swap(true, Ordering::Relaxed) {
            warn!(
                min_neighbors = params.min_neighbors,
                score_thresh = self.score_thresh,
                "rustface has no neighbor grouping, filtering by score threshold instead"
            );
        }
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, gray: &[u8], width: u32, height: u32, params: &CascadeParams) -> Vec<FaceBounds> {
        self.warn_min_neighbors(params);

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(params.min_size.max(RUSTFACE_MIN_FACE_SIZE));
        detector.set_score_thresh(self.score_thresh);
        // rustface shrinks the image per pyramid level, so it wants the inverse
        detector.set_pyramid_scale_factor((1.0 / params.scale_factor) as f32);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));
        debug!(count = faces.len(), "rustface detection finished");

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBounds {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                    confidence: face.score(),
                }
            })
            .collect()
    }
}
