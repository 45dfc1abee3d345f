use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbImage};
use tracing::info;

use crate::contact_sheet::ContactSheet;
use crate::error::FaceSheetError;

/// Output image format for saved contact sheets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossless PNG.
    #[default]
    Png,

    /// JPEG at the configured quality.
    Jpeg,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// Destination for finished contact sheets.
pub trait ContactSheetSink {
    /// Receive the sheet built for the archive entry `page_name`.
    fn deliver(&mut self, page_name: &str, sheet: &ContactSheet) -> Result<(), FaceSheetError>;
}

impl<S: ContactSheetSink + ?Sized> ContactSheetSink for &mut S {
    fn deliver(&mut self, page_name: &str, sheet: &ContactSheet) -> Result<(), FaceSheetError> {
        (**self).deliver(page_name, sheet)
    }
}

impl<S: ContactSheetSink + ?Sized> ContactSheetSink for Box<S> {
    fn deliver(&mut self, page_name: &str, sheet: &ContactSheet) -> Result<(), FaceSheetError> {
        (**self).deliver(page_name, sheet)
    }
}

/// Drops every sheet. Used when output is suppressed.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl ContactSheetSink for DiscardSink {
    fn deliver(&mut self, _page_name: &str, _sheet: &ContactSheet) -> Result<(), FaceSheetError> {
        Ok(())
    }
}

/// Writes each sheet to `<dir>/<entry stem>_faces.<ext>`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    format: OutputFormat,
    quality: u8,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FaceSheetError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            format: OutputFormat::default(),
            quality: 90,
            written: Vec::new(),
        })
    }

    /// Set the output format (default: `OutputFormat::Png`).
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// JPEG quality from 1 to 100 (default: 90). Ignored for PNG.
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Files written so far, in delivery order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Output path for an archive entry. Directory components of the
    /// entry name are dropped.
    pub fn path_for(&self, page_name: &str) -> PathBuf {
        let stem = Path::new(page_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "page".to_string());
        self.dir.join(format!("{stem}_faces.{}", self.format.extension()))
    }
}

impl ContactSheetSink for DirectorySink {
    fn deliver(&mut self, page_name: &str, sheet: &ContactSheet) -> Result<(), FaceSheetError> {
        let data = encode_image(sheet.image(), self.format, self.quality)?;
        let path = self.path_for(page_name);
        std::fs::write(&path, data)?;
        info!(page = page_name, path = %path.display(), "saved contact sheet");
        self.written.push(path);
        Ok(())
    }
}

/// Encode an RGB image to the specified format.
pub fn encode_image(image: &RgbImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, FaceSheetError> {
    let mut buffer = Vec::new();

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buffer)
                .write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgb8)
                .map_err(|e| FaceSheetError::EncodeError(e.to_string()))?;
        }
        OutputFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut buffer, quality)
                .write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgb8)
                .map_err(|e| FaceSheetError::EncodeError(e.to_string()))?;
        }
    }

    Ok(buffer)
}
