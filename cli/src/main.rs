//! Search a zip archive of scanned pages for a word and show the faces on
//! every page that contains it.
//!
//! # Usage
//!
//! ```bash
//! facesheet images.zip -m seeta_fd_frontal_v1.0.bin -q Christopher
//! facesheet images.zip -m seeta_fd_frontal_v1.0.bin -o save --output-dir sheets
//! ```

mod display;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use facesheet::{
    ContactSheetSink, DirectorySink, DiscardSink, ImageSource, OutputFormat, PageOutcome,
    PageProcessor, RustfaceDetector, SearchTerm, TesseractRecognizer,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::display::TerminalSink;

/// Where contact sheets go.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Output {
    /// Draw each sheet in the terminal.
    Display,
    /// Write each sheet to the output directory.
    Save,
    /// Only print the report.
    None,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Png,
    Jpeg,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => OutputFormat::Png,
            Format::Jpeg => OutputFormat::Jpeg,
        }
    }
}

/// Command-line arguments
#[derive(Parser)]
#[command(name = "facesheet")]
#[command(about = "Find pages mentioning a word and build contact sheets of the faces on them")]
struct Args {
    /// Zip archive of page images
    archive: PathBuf,

    /// Word to search for (prompted for when omitted)
    #[arg(short, long)]
    query: Option<String>,

    /// SeetaFace frontal face model file
    #[arg(short, long)]
    model: PathBuf,

    /// Contact sheet destination
    #[arg(short, long, value_enum, default_value = "display")]
    output: Output,

    /// Directory for saved contact sheets
    #[arg(long, default_value = "contact_sheets")]
    output_dir: PathBuf,

    /// Image format for saved contact sheets
    #[arg(long, value_enum, default_value = "png")]
    format: Format,

    /// Tesseract executable
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    /// Tesseract language
    #[arg(short, long, default_value = "eng")]
    language: String,

    /// Give up on OCR for a page after this many seconds
    #[arg(long)]
    ocr_timeout_secs: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn prompt_query() -> Result<String> {
    print!("Enter search word: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read search word")?;
    Ok(line)
}

fn make_sink(args: &Args) -> Result<Box<dyn ContactSheetSink>> {
    Ok(match args.output {
        Output::Display => Box::new(TerminalSink::new()),
        Output::Save => Box::new(
            DirectorySink::new(&args.output_dir)
                .with_context(|| format!("failed to create {}", args.output_dir.display()))?
                .format(args.format.into()),
        ),
        Output::None => Box::new(DiscardSink),
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let detector = RustfaceDetector::from_path(&args.model)
        .with_context(|| format!("cannot use face model {}", args.model.display()))?;
    let source = ImageSource::open(&args.archive)
        .with_context(|| format!("cannot read archive {}", args.archive.display()))?;
    info!(pages = source.len(), archive = %args.archive.display(), "loaded archive");

    let raw_query = match &args.query {
        Some(query) => query.clone(),
        None => prompt_query()?,
    };
    let query = SearchTerm::new(&raw_query)?;

    let recognizer = TesseractRecognizer::new()
        .binary(&args.tesseract)
        .language(&args.language)
        .timeout(args.ocr_timeout_secs.map(Duration::from_secs));
    let processor = PageProcessor::new(recognizer, detector);
    let sink = make_sink(&args)?;

    // Each line is printed before its sheet is shown
    processor.run_with(source.into_entries(), &query, sink, |report| match report.outcome {
        PageOutcome::Skipped => debug!("{report}"),
        _ => println!("{report}"),
    });

    Ok(())
}
