use thiserror::Error;

/// Everything that can go wrong while scanning an archive.
#[derive(Debug, Error)]
pub enum FaceSheetError {
    /// The archive itself cannot be opened or listed.
    #[error("failed to read archive: {0}")]
    Archive(String),

    /// One entry is not a readable image.
    #[error("failed to decode image: {0}")]
    DecodeError(String),

    /// An image has no pixels.
    #[error("image dimensions are zero")]
    ZeroDimensions,

    /// The face model could not be loaded.
    #[error("failed to load face classifier: {0}")]
    ClassifierLoadError(String),

    /// Face search parameters no detector can use.
    #[error("invalid detection parameters: {0}")]
    InvalidParams(String),

    /// The OCR engine failed on a page.
    #[error("text recognition failed: {0}")]
    OcrFailure(String),

    /// The search word is empty or contains whitespace.
    #[error("search word must be a single non-empty token, got {0:?}")]
    InvalidQuery(String),

    /// A face box reaches outside its page.
    #[error("bounding box ({x}, {y}, {width}x{height}) does not fit inside a {image_width}x{image_height} image")]
    InvalidBox {
        /// Left edge of the box.
        x: u32,
        /// Top edge of the box.
        y: u32,
        /// Box width.
        width: u32,
        /// Box height.
        height: u32,
        /// Page width.
        image_width: u32,
        /// Page height.
        image_height: u32,
    },

    /// A contact sheet was requested for zero faces.
    #[error("contact sheet needs at least one face")]
    EmptyFaceSet,

    /// A sheet could not be encoded.
    #[error("failed to encode image: {0}")]
    EncodeError(String),

    /// Filesystem or pipe failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
