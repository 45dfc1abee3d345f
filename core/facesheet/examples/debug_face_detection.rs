//! Run face detection on every page of an archive and print the boxes,
//! without any text matching.
//!
//! Usage:
//!   cargo run --example debug_face_detection -- images.zip seeta_fd_frontal_v1.0.bin

use facesheet::{ContactSheetBuilder, FaceLocator, ImageSource, RustfaceDetector};

fn main() {
    let mut args = std::env::args().skip(1);
    let (Some(archive), Some(model)) = (args.next(), args.next()) else {
        eprintln!("usage: debug_face_detection <archive.zip> <model.bin>");
        std::process::exit(2);
    };

    let detector = RustfaceDetector::from_path(&model).expect("failed to load model");
    let locator = FaceLocator::new(detector);
    let params = locator.cascade_params();
    println!(
        "scale_factor={} min_neighbors={} min_size={}",
        params.scale_factor, params.min_neighbors, params.min_size
    );
    let source = ImageSource::open(&archive).expect("failed to read archive");

    for entry in source.entries() {
        let page = match &entry.page {
            Ok(page) => page,
            Err(e) => {
                println!("=== {} - skipped: {e}", entry.name);
                continue;
            }
        };
        println!("=== {} ({}x{}) ===", entry.name, page.width(), page.height());

        let boxes = locator.locate(page);
        if boxes.is_empty() {
            println!("  NO FACES DETECTED");
            continue;
        }

        println!("  Found {} face(s):", boxes.len());
        for (i, bbox) in boxes.iter().enumerate() {
            println!(
                "    face {i}: ({}, {}, {}x{}), center=({}, {})",
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height,
                bbox.x + bbox.width / 2,
                bbox.y + bbox.height / 2,
            );
        }

        let sheet = ContactSheetBuilder::new().build(page, &boxes).expect("clipped boxes fit the page");
        println!("  -> contact sheet: {}x{}", sheet.width(), sheet.height());
        println!();
    }
}
