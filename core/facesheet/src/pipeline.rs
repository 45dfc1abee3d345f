use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::ArchiveEntry;
use crate::contact_sheet::{ContactSheet, ContactSheetBuilder};
use crate::error::FaceSheetError;
use crate::face_detector::{CascadeParams, FaceDetector, FaceLocator};
use crate::page::PageImage;
use crate::sink::ContactSheetSink;
use crate::text_matcher::{SearchTerm, TextMatcher, TextRecognizer};

/// Terminal state of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The search word is not on the page.
    Skipped,

    /// The word matched but no faces were found.
    MatchedNoFaces,

    /// The word matched and a contact sheet of `faces` thumbnails was built.
    MatchedWithFaces {
        /// Thumbnails on the sheet.
        faces: usize,
    },

    /// The page could not be processed.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

/// Per-page result line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    /// Position of the page in the archive.
    pub index: usize,
    /// Archive entry name.
    pub name: String,
    /// Where the page ended up.
    pub outcome: PageOutcome,
}

impl PageReport {
    /// Whether the search word was found on the page.
    pub fn is_match(&self) -> bool {
        matches!(
            self.outcome,
            PageOutcome::MatchedNoFaces | PageOutcome::MatchedWithFaces { .. }
        )
    }

    /// Faces on the page's contact sheet, 0 when there is none.
    pub fn face_count(&self) -> usize {
        match self.outcome {
            PageOutcome::MatchedWithFaces { faces } => faces,
            _ => 0,
        }
    }
}

impl fmt::Display for PageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PageOutcome::Skipped => write!(f, "no match in {}", self.name),
            PageOutcome::MatchedNoFaces => {
                write!(f, "match found in {}, but no faces were found", self.name)
            }
            PageOutcome::MatchedWithFaces { .. } => write!(f, "match found in {}", self.name),
            PageOutcome::Failed { reason } => write!(f, "failed to process {}: {reason}", self.name),
        }
    }
}

/// Everything one page produced. The sheet is only present for
/// [`PageOutcome::MatchedWithFaces`].
#[derive(Debug)]
pub struct PageResult {
    /// Outcome of the page.
    pub report: PageReport,
    /// Contact sheet of the faces found, if any.
    pub sheet: Option<ContactSheet>,
}

/// Cooperative stop flag checked between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every run holding a clone of this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Page counts by terminal state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages reported.
    pub pages: usize,
    /// Pages without the search word.
    pub skipped: usize,
    /// Matching pages with no faces.
    pub matched_no_faces: usize,
    /// Matching pages with a contact sheet.
    pub matched_with_faces: usize,
    /// Pages that could not be processed.
    pub failed: usize,
    /// Thumbnails across all sheets.
    pub faces: usize,
}

impl RunSummary {
    /// Tally a finished run.
    pub fn from_reports(reports: &[PageReport]) -> Self {
        let mut summary = Self {
            pages: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match &report.outcome {
                PageOutcome::Skipped => summary.skipped += 1,
                PageOutcome::MatchedNoFaces => summary.matched_no_faces += 1,
                PageOutcome::MatchedWithFaces { faces } => {
                    summary.matched_with_faces += 1;
                    summary.faces += faces;
                }
                PageOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

/// Searches pages for a word and builds contact sheets of the faces on
/// matching pages.
///
/// ```no_run
/// use facesheet::{DiscardSink, ImageSource, NoopRecognizer, PageProcessor, SearchTerm};
/// # use facesheet::{CascadeParams, FaceBounds, FaceDetector};
/// # struct MyDetector;
/// # impl FaceDetector for MyDetector {
/// #     fn detect(&self, _: &[u8], _: u32, _: u32, _: &CascadeParams) -> Vec<FaceBounds> { vec![] }
/// # }
///
/// let source = ImageSource::open("images.zip").unwrap();
/// let processor = PageProcessor::new(NoopRecognizer, MyDetector);
/// let query = SearchTerm::new("Mark").unwrap();
/// processor.run_with(source.into_entries(), &query, &mut DiscardSink, |report| {
///     println!("{report}");
/// });
/// ```
pub struct PageProcessor<R, D> {
    matcher: TextMatcher<R>,
    locator: FaceLocator<D>,
    sheets: ContactSheetBuilder,
    cancel: Option<CancelToken>,
}

impl<R: TextRecognizer, D: FaceDetector> PageProcessor<R, D> {
    /// Processor with default binarization, cascade and layout settings.
    pub fn new(recognizer: R, detector: D) -> Self {
        Self {
            matcher: TextMatcher::new(recognizer),
            locator: FaceLocator::new(detector),
            sheets: ContactSheetBuilder::new(),
            cancel: None,
        }
    }

    /// Set the luma cutoff used to binarize pages before OCR (default: 128).
    pub fn binarize_threshold(mut self, threshold: u8) -> Self {
        self.matcher = self.matcher.threshold(threshold);
        self
    }

    /// Replace the face search parameters (default: 1.15 / 11 / 45).
    pub fn cascade_params(mut self, params: CascadeParams) -> Result<Self, FaceSheetError> {
        self.locator = self.locator.params(params)?;
        Ok(self)
    }

    /// Replace the contact sheet layout settings.
    pub fn contact_sheet(mut self, builder: ContactSheetBuilder) -> Self {
        self.sheets = builder;
        self
    }

    /// Stop [`PageProcessor::run`] between pages once `token` is cancelled.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Take one page to its terminal state.
    pub fn process(&self, page: &PageImage, query: &SearchTerm) -> PageResult {
        let report = |outcome: PageOutcome| PageReport {
            index: page.index(),
            name: page.name().to_string(),
            outcome,
        };

        if !self.matcher.matches(page, query) {
            return PageResult {
                report: report(PageOutcome::Skipped),
                sheet: None,
            };
        }

        let boxes = self.locator.locate(page);
        if boxes.is_empty() {
            return PageResult {
                report: report(PageOutcome::MatchedNoFaces),
                sheet: None,
            };
        }

        match self.sheets.build(page, &boxes) {
            Ok(sheet) => PageResult {
                report: report(PageOutcome::MatchedWithFaces { faces: boxes.len() }),
                sheet: Some(sheet),
            },
            Err(e) => PageResult {
                report: report(PageOutcome::Failed {
                    reason: e.to_string(),
                }),
                sheet: None,
            },
        }
    }

    /// Process `entries` in order, handing every contact sheet to `sink`.
    ///
    /// Failures stay with their page: undecodable entries and sink errors
    /// produce a [`PageOutcome::Failed`] report and the run continues.
    pub fn run<S>(
        &self,
        entries: impl IntoIterator<Item = ArchiveEntry>,
        query: &SearchTerm,
        sink: S,
    ) -> Vec<PageReport>
    where
        S: ContactSheetSink,
    {
        self.run_with(entries, query, sink, |_| {})
    }

    /// Like [`PageProcessor::run`], calling `on_report` as each page
    /// finishes.
    ///
    /// A page's report is passed to `on_report` before its contact sheet
    /// goes to `sink`. If delivery then fails, `on_report` is called a
    /// second time with the page's [`PageOutcome::Failed`] report, which
    /// is also the one returned.
    pub fn run_with<S, F>(
        &self,
        entries: impl IntoIterator<Item = ArchiveEntry>,
        query: &SearchTerm,
        mut sink: S,
        mut on_report: F,
    ) -> Vec<PageReport>
    where
        S: ContactSheetSink,
        F: FnMut(&PageReport),
    {
        let mut reports = Vec::new();

        for entry in entries {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                info!(processed = reports.len(), "run cancelled");
                break;
            }

            let report = match entry.page {
                Ok(page) => {
                    let PageResult { mut report, sheet } = self.process(&page, query);
                    on_report(&report);
                    if let Some(sheet) = sheet {
                        if let Err(e) = sink.deliver(&report.name, &sheet) {
                            warn!(page = %report.name, error = %e, "failed to deliver contact sheet");
                            report.outcome = PageOutcome::Failed {
                                reason: e.to_string(),
                            };
                            on_report(&report);
                        }
                    }
                    report
                }
                Err(e) => {
                    warn!(page = %entry.name, error = %e, "skipping undecodable entry");
                    let report = PageReport {
                        index: entry.index,
                        name: entry.name,
                        outcome: PageOutcome::Failed {
                            reason: e.to_string(),
                        },
                    };
                    on_report(&report);
                    report
                }
            };

            debug!(index = report.index, outcome = ?report.outcome, "page done");
            reports.push(report);
        }

        let summary = RunSummary::from_reports(&reports);
        info!(
            pages = summary.pages,
            matched = summary.matched_no_faces + summary.matched_with_faces,
            faces = summary.faces,
            failed = summary.failed,
            "run finished"
        );
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detector::FaceBounds;
    use image::{GrayImage, RgbImage};
    use std::cell::RefCell;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn recognize(&self, _: &GrayImage) -> Result<String, FaceSheetError> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct CountingDetector {
        faces: Vec<FaceBounds>,
        calls: AtomicUsize,
        params: Mutex<Vec<CascadeParams>>,
    }

    impl FaceDetector for CountingDetector {
        fn detect(&self, _: &[u8], _: u32, _: u32, params: &CascadeParams) -> Vec<FaceBounds> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.params.lock().unwrap().push(*params);
            self.faces.clone()
        }
    }

    /// Shared log of reports and deliveries, in the order they happened.
    struct EventSink<'a>(&'a RefCell<Vec<String>>);

    impl ContactSheetSink for EventSink<'_> {
        fn deliver(&mut self, page_name: &str, _: &ContactSheet) -> Result<(), FaceSheetError> {
            self.0.borrow_mut().push(format!("sheet {page_name}"));
            Ok(())
        }
    }

    struct FailingSink;

    impl ContactSheetSink for FailingSink {
        fn deliver(&mut self, _: &str, _: &ContactSheet) -> Result<(), FaceSheetError> {
            Err(FaceSheetError::Io(std::io::Error::other("disk full")))
        }
    }

    fn face(x: f64) -> FaceBounds {
        FaceBounds {
            x,
            y: 0.0,
            width: 20.0,
            height: 20.0,
            confidence: 1.0,
        }
    }

    fn page(index: usize, name: &str) -> PageImage {
        PageImage::new(index, name, RgbImage::new(120, 60)).unwrap()
    }

    fn entry(index: usize, name: &str) -> ArchiveEntry {
        ArchiveEntry {
            index,
            name: name.to_string(),
            page: Ok(page(index, name)),
        }
    }

    fn query() -> SearchTerm {
        SearchTerm::new("ring").unwrap()
    }

    #[test]
    fn no_match_never_runs_the_detector() {
        let processor = PageProcessor::new(FixedText("nothing here"), CountingDetector::default());
        let result = processor.process(&page(0, "a.png"), &query());
        assert_eq!(result.report.outcome, PageOutcome::Skipped);
        assert!(result.sheet.is_none());
        assert_eq!(processor.locator_calls(), 0);
    }

    #[test]
    fn match_without_faces() {
        let processor = PageProcessor::new(FixedText("the ring"), CountingDetector::default());
        let result = processor.process(&page(0, "a.png"), &query());
        assert_eq!(result.report.outcome, PageOutcome::MatchedNoFaces);
        assert!(result.sheet.is_none());
        assert_eq!(processor.locator_calls(), 1);
        assert_eq!(
            result.report.to_string(),
            "match found in a.png, but no faces were found"
        );
    }

    #[test]
    fn match_with_faces_builds_sheet() {
        let detector = CountingDetector {
            faces: vec![face(0.0), face(30.0)],
            ..Default::default()
        };
        let processor = PageProcessor::new(FixedText("RING"), detector);
        let result = processor.process(&page(3, "b.png"), &query());
        assert_eq!(result.report.outcome, PageOutcome::MatchedWithFaces { faces: 2 });
        assert_eq!(result.report.index, 3);
        let sheet = result.sheet.unwrap();
        assert_eq!(sheet.image().dimensions(), (500, 100));
        assert_eq!(result.report.to_string(), "match found in b.png");
    }

    #[test]
    fn undecodable_entry_does_not_stop_run() {
        let processor = PageProcessor::new(FixedText("ring"), CountingDetector::default());
        let entries = vec![
            entry(0, "a.png"),
            ArchiveEntry {
                index: 1,
                name: "broken.png".to_string(),
                page: Err(FaceSheetError::DecodeError("bad header".into())),
            },
            entry(2, "c.png"),
        ];
        let reports = processor.run(entries, &query(), crate::sink::DiscardSink);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].outcome, PageOutcome::MatchedNoFaces);
        assert!(matches!(reports[1].outcome, PageOutcome::Failed { .. }));
        assert_eq!(reports[1].name, "broken.png");
        assert_eq!(reports[2].outcome, PageOutcome::MatchedNoFaces);
    }

    #[test]
    fn sink_failure_marks_page_failed() {
        let detector = CountingDetector {
            faces: vec![face(0.0)],
            ..Default::default()
        };
        let processor = PageProcessor::new(FixedText("ring"), detector);
        let reports = processor.run(vec![entry(0, "a.png"), entry(1, "b.png")], &query(), FailingSink);
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| matches!(r.outcome, PageOutcome::Failed { .. })));
    }

    #[test]
    fn sink_failure_is_reported_after_the_match() {
        let detector = CountingDetector {
            faces: vec![face(0.0)],
            ..Default::default()
        };
        let processor = PageProcessor::new(FixedText("ring"), detector);
        let mut seen = Vec::new();
        processor.run_with(vec![entry(0, "a.png")], &query(), FailingSink, |r| {
            seen.push(r.outcome.clone())
        });
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], PageOutcome::MatchedWithFaces { faces: 1 });
        assert!(matches!(seen[1], PageOutcome::Failed { .. }));
    }

    #[test]
    fn each_report_comes_before_its_sheet() {
        let detector = CountingDetector {
            faces: vec![face(0.0)],
            ..Default::default()
        };
        let processor = PageProcessor::new(FixedText("ring"), detector);
        let events = RefCell::new(Vec::new());
        let entries = vec![
            entry(0, "a.png"),
            ArchiveEntry {
                index: 1,
                name: "broken.png".to_string(),
                page: Err(FaceSheetError::DecodeError("bad header".into())),
            },
            entry(2, "c.png"),
        ];

        let reports = processor.run_with(entries, &query(), EventSink(&events), |r| {
            events.borrow_mut().push(format!("report {}", r.name))
        });

        assert_eq!(reports.len(), 3);
        assert_eq!(
            events.into_inner(),
            [
                "report a.png",
                "sheet a.png",
                "report broken.png",
                "report c.png",
                "sheet c.png",
            ]
        );
    }

    #[test]
    fn cascade_params_reach_the_detector() {
        let processor = PageProcessor::new(FixedText("ring"), CountingDetector::default());
        processor.run(vec![entry(0, "a.png")], &query(), crate::sink::DiscardSink);
        assert_eq!(
            processor.locator.detector().params.lock().unwrap().as_slice(),
            &[CascadeParams {
                scale_factor: 1.15,
                min_neighbors: 11,
                min_size: 45,
            }]
        );

        let bad = CascadeParams {
            scale_factor: 0.5,
            ..CascadeParams::default()
        };
        let result = PageProcessor::new(FixedText("ring"), CountingDetector::default()).cascade_params(bad);
        assert!(matches!(result, Err(FaceSheetError::InvalidParams(_))));
    }

    #[test]
    fn cancelled_run_stops_between_pages() {
        let token = CancelToken::new();
        token.cancel();
        let processor =
            PageProcessor::new(FixedText("ring"), CountingDetector::default()).cancel_token(token);
        let reports = processor.run(vec![entry(0, "a.png")], &query(), crate::sink::DiscardSink);
        assert!(reports.is_empty());
        assert_eq!(processor.locator_calls(), 0);
    }

    #[test]
    fn summary_counts_outcomes() {
        let reports = vec![
            PageReport {
                index: 0,
                name: "a".into(),
                outcome: PageOutcome::Skipped,
            },
            PageReport {
                index: 1,
                name: "b".into(),
                outcome: PageOutcome::MatchedWithFaces { faces: 7 },
            },
            PageReport {
                index: 2,
                name: "c".into(),
                outcome: PageOutcome::MatchedNoFaces,
            },
            PageReport {
                index: 3,
                name: "d".into(),
                outcome: PageOutcome::Failed {
                    reason: "bad".into(),
                },
            },
        ];
        let summary = RunSummary::from_reports(&reports);
        assert_eq!(
            summary,
            RunSummary {
                pages: 4,
                skipped: 1,
                matched_no_faces: 1,
                matched_with_faces: 1,
                failed: 1,
                faces: 7,
            }
        );
        assert_eq!(reports[1].face_count(), 7);
        assert!(reports[2].is_match());
        assert!(!reports[0].is_match());
    }

    impl<R: TextRecognizer> PageProcessor<R, CountingDetector> {
        fn locator_calls(&self) -> usize {
            self.locator.detector().calls.load(Ordering::SeqCst)
        }
    }
}
