use std::collections::HashSet;
use std::fmt;

use image::GrayImage;
use tracing::{debug, warn};

use crate::error::FaceSheetError;
use crate::page::PageImage;

/// Luma cutoff used when binarizing pages for OCR.
pub const DEFAULT_BINARIZE_THRESHOLD: u8 = 128;

/// A single case-folded search word.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerm(String);

impl SearchTerm {
    /// Trim and lowercase `raw`. Empty input and input with inner
    /// whitespace are rejected: matching is single-token only.
    pub fn new(raw: &str) -> Result<Self, FaceSheetError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.split_whitespace().nth(1).is_some() {
            return Err(FaceSheetError::InvalidQuery(raw.to_string()));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// The normalized word.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Common interface for OCR engines.
pub trait TextRecognizer: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Recognize all text on a two-tone page (0 = ink, 255 = paper).
    fn recognize(&self, binary: &GrayImage) -> Result<String, FaceSheetError>;
}

impl<R: TextRecognizer + ?Sized> TextRecognizer for &R {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn recognize(&self, binary: &GrayImage) -> Result<String, FaceSheetError> {
        (**self).recognize(binary)
    }
}

impl<R: TextRecognizer + ?Sized> TextRecognizer for Box<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn recognize(&self, binary: &GrayImage) -> Result<String, FaceSheetError> {
        (**self).recognize(binary)
    }
}

/// Recognizer that never finds any text.
#[derive(Debug, Default)]
pub struct NoopRecognizer;

impl TextRecognizer for NoopRecognizer {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn recognize(&self, _: &GrayImage) -> Result<String, FaceSheetError> {
        Ok(String::new())
    }
}

/// Threshold a page to pure black and white.
pub fn binarize(page: &PageImage, threshold: u8) -> GrayImage {
    let mut gray = page.to_grayscale();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] >= threshold { 255 } else { 0 };
    }
    gray
}

/// Lowercased, whitespace-split, deduplicated words of `text`.
pub fn vocabulary(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

/// Decides whether a page contains a search word.
pub struct TextMatcher<R> {
    recognizer: R,
    threshold: u8,
}

impl<R: TextRecognizer> TextMatcher<R> {
    /// Matcher binarizing at the default threshold.
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer,
            threshold: DEFAULT_BINARIZE_THRESHOLD,
        }
    }

    /// Set the binarization cutoff (default: 128).
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// The wrapped OCR engine.
    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Exact-token membership test. OCR failures are logged and count as
    /// no match.
    pub fn matches(&self, page: &PageImage, query: &SearchTerm) -> bool {
        let binary = binarize(page, self.threshold);
        let text = match self.recognizer.recognize(&binary) {
            Ok(text) => text,
            Err(e) => {
                warn!(page = page.name(), engine = self.recognizer.name(), error = %e, "OCR failed, treating page as no match");
                return false;
            }
        };

        let words = vocabulary(&text);
        let found = words.contains(query.as_str());
        debug!(page = page.name(), words = words.len(), found, "matched page text");
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn recognize(&self, binary: &GrayImage) -> Result<String, FaceSheetError> {
            assert!(binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
            Ok(self.0.to_string())
        }
    }

    struct Failing(AtomicUsize);

    impl TextRecognizer for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn recognize(&self, _: &GrayImage) -> Result<String, FaceSheetError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(FaceSheetError::OcrFailure("engine crashed".into()))
        }
    }

    fn gradient_page() -> PageImage {
        let mut img = RgbImage::new(16, 4);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            let v = (x * 16) as u8;
            *pixel = image::Rgb([v, v, v]);
        }
        PageImage::new(0, "page.png", img).unwrap()
    }

    fn term(raw: &str) -> SearchTerm {
        SearchTerm::new(raw).unwrap()
    }

    #[test]
    fn search_term_is_case_folded_and_trimmed() {
        assert_eq!(term("  Ring\n").as_str(), "ring");
    }

    #[test]
    fn search_term_rejects_empty_and_multiword() {
        assert!(matches!(SearchTerm::new("   "), Err(FaceSheetError::InvalidQuery(_))));
        assert!(matches!(
            SearchTerm::new("wedding ring"),
            Err(FaceSheetError::InvalidQuery(_))
        ));
    }

    #[test]
    fn vocabulary_lowercases_and_dedupes() {
        let words = vocabulary("The ring\nTHE\tRing  mayor");
        assert_eq!(words.len(), 3);
        assert!(words.contains("the"));
        assert!(words.contains("ring"));
        assert!(words.contains("mayor"));
    }

    #[test]
    fn binarize_outputs_two_tones() {
        let binary = binarize(&gradient_page(), 128);
        assert_eq!(binary.get_pixel(7, 0).0[0], 0);
        assert_eq!(binary.get_pixel(8, 0).0[0], 255);
        assert!(binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn matches_exact_token_case_insensitively() {
        let matcher = TextMatcher::new(FixedText("Christopher RING was seen"));
        assert!(matcher.matches(&gradient_page(), &term("ring")));
        assert!(matcher.matches(&gradient_page(), &term("Christopher")));
    }

    #[test]
    fn substrings_do_not_match() {
        let matcher = TextMatcher::new(FixedText("rings ringing earring"));
        assert!(!matcher.matches(&gradient_page(), &term("ring")));
    }

    #[test]
    fn empty_text_never_matches() {
        let matcher = TextMatcher::new(NoopRecognizer);
        assert!(!matcher.matches(&gradient_page(), &term("ring")));
    }

    #[test]
    fn ocr_failure_is_no_match() {
        let matcher = TextMatcher::new(Failing(AtomicUsize::new(0)));
        assert!(!matcher.matches(&gradient_page(), &term("ring")));
        assert_eq!(matcher.recognizer().0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn matching_is_repeatable() {
        let matcher = TextMatcher::new(FixedText("mark ring"));
        let page = gradient_page();
        let first = matcher.matches(&page, &term("ring"));
        let second = matcher.matches(&page, &term("ring"));
        assert_eq!(first, second);
    }
}
