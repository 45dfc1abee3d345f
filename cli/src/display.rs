use facesheet::{ContactSheet, ContactSheetSink, FaceSheetError};
use viuer::{print, Config};

/// Draws contact sheets inline in the terminal (kitty, iTerm, sixel or
/// half-block fallback, whichever viuer detects).
pub struct TerminalSink {
    config: Config,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            config: Config {
                // Sheets are opaque RGB
                transparent: false,
                absolute_offset: false,
                restore_cursor: false,
                truecolor: true,
                use_kitty: true,
                use_iterm: true,
                ..Default::default()
            },
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactSheetSink for TerminalSink {
    fn deliver(&mut self, page_name: &str, sheet: &ContactSheet) -> Result<(), FaceSheetError> {
        // viuer is built against image 0.24, so hand it the raw pixels
        let rgb = sheet.image();
        let buffer = image_0_24::RgbImage::from_raw(rgb.width(), rgb.height(), rgb.as_raw().clone())
            .ok_or_else(|| FaceSheetError::EncodeError(format!("{page_name}: pixel buffer size mismatch")))?;
        let dynamic = image_0_24::DynamicImage::ImageRgb8(buffer);

        println!("faces on {page_name}:");
        print(&dynamic, &self.config)
            .map_err(|e| FaceSheetError::Io(std::io::Error::other(e.to_string())))?;
        Ok(())
    }
}
