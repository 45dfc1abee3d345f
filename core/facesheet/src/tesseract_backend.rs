use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::{GrayImage, ImageFormat};
use tracing::debug;

use crate::error::FaceSheetError;
use crate::text_matcher::TextRecognizer;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// OCR through the `tesseract` command-line program.
///
/// Each page is written to a temporary PNG and recognized with
/// `tesseract <page> stdout -l <language>`.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    language: String,
    timeout: Option<Duration>,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseractRecognizer {
    /// `tesseract` from `PATH`, English, no timeout.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            timeout: None,
        }
    }

    /// Path or name of the tesseract executable (default: `tesseract`).
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Tesseract language pack (default: `eng`).
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Kill recognition that runs longer than `timeout`. No limit by default.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, input: &std::path::Path) -> Result<String, FaceSheetError> {
        let mut child = Command::new(&self.binary)
            .arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FaceSheetError::OcrFailure(format!("{}: {e}", self.binary.display())))?;

        // Drain pipes on their own threads so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(|mut out| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                out.read_to_end(&mut buf).map(|_| buf)
            })
        });
        let stderr = child.stderr.take().map(|mut err| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf);
                buf
            })
        });

        let status = match self.timeout {
            None => child.wait()?,
            Some(limit) => {
                let deadline = Instant::now() + limit;
                loop {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(FaceSheetError::OcrFailure(format!(
                            "timed out after {:.1}s",
                            limit.as_secs_f64()
                        )));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let output = match stdout {
            Some(handle) => handle
                .join()
                .map_err(|_| FaceSheetError::OcrFailure("stdout reader panicked".into()))??,
            None => Vec::new(),
        };
        let errors = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

        if !status.success() {
            return Err(FaceSheetError::OcrFailure(format!(
                "{} exited with {status}: {}",
                self.binary.display(),
                String::from_utf8_lossy(&errors).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, binary: &GrayImage) -> Result<String, FaceSheetError> {
        let file = tempfile::Builder::new()
            .prefix("facesheet-page-")
            .suffix(".png")
            .tempfile()?;
        binary
            .save_with_format(file.path(), ImageFormat::Png)
            .map_err(|e| FaceSheetError::EncodeError(e.to_string()))?;

        let started = Instant::now();
        let text = self.run(file.path())?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "tesseract finished"
        );
        Ok(text)
    }
}
