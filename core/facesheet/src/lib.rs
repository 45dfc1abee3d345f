//! Search scanned document pages for a word and build a contact sheet of
//! the faces on every page that contains it.
//!
//! # Example
//!
//! ```no_run
//! use facesheet::{
//!     DirectorySink, ImageSource, PageProcessor, RustfaceDetector, SearchTerm, TesseractRecognizer,
//! };
//!
//! let source = ImageSource::open("images.zip").unwrap();
//! let detector = RustfaceDetector::from_path("seeta_fd_frontal_v1.0.bin").unwrap();
//! let processor = PageProcessor::new(TesseractRecognizer::new(), detector);
//! let sink = DirectorySink::new("contact_sheets").unwrap();
//!
//! let query = SearchTerm::new("Christopher").unwrap();
//! processor.run_with(source.into_entries(), &query, sink, |report| {
//!     println!("{report}");
//! });
//! ```

#![warn(missing_docs)]

/// Zip archive reading.
pub mod archive;
/// Face thumbnail grid layout.
pub mod contact_sheet;
mod error;
/// Face detection traits and data types.
pub mod face_detector;
mod page;
/// Per-page orchestration.
pub mod pipeline;
#[cfg(feature = "rustface")]
/// Built-in SeetaFace-based face detector backend.
pub mod rustface_backend;
/// Contact sheet destinations.
pub mod sink;
#[cfg(feature = "tesseract")]
/// OCR through the tesseract executable.
pub mod tesseract_backend;
/// OCR-backed word search.
pub mod text_matcher;

pub use archive::{ArchiveEntry, ImageSource, MAX_ENTRY_BYTES};
pub use contact_sheet::{ContactSheet, ContactSheetBuilder, SHEET_COLUMNS, THUMBNAIL_SIZE};
/// Error type returned by facesheet operations.
pub use error::FaceSheetError;
pub use face_detector::{BoundingBox, CascadeParams, FaceBounds, FaceDetector, FaceLocator};
/// Decoded archive page.
pub use page::PageImage;
pub use pipeline::{CancelToken, PageOutcome, PageProcessor, PageReport, PageResult, RunSummary};
#[cfg(feature = "rustface")]
pub use rustface_backend::RustfaceDetector;
pub use sink::{ContactSheetSink, DirectorySink, DiscardSink, OutputFormat};
#[cfg(feature = "tesseract")]
pub use tesseract_backend::TesseractRecognizer;
pub use text_matcher::{NoopRecognizer, SearchTerm, TextMatcher, TextRecognizer};
