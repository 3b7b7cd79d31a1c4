//! Benchmark smoke tests for the throughput-sensitive paths.

use std::time::Instant;

use visionflow_core::Image;
use visionflow_detect::{ColorParams, EdgeMethod, EdgeParams, color_detect, edge_detect};
use visionflow_imgproc::split_hsv;

#[test]
fn benchmark_histogram_color_classification_is_single_pass() {
    // A full-frame tally must stay a vectorized single pass; a per-pixel
    // dictionary walk regresses this by an order of magnitude.
    let frame = Image::solid_rgb(640, 480, [200, 30, 30]).expect("frame builds");

    let start = Instant::now();
    let mut dominant_reds = 0;
    for _ in 0..10 {
        let detection = color_detect(&frame, None, &ColorParams::default()).expect("color runs");
        let dominant = detection.objects[0]
            .properties
            .get("dominant_color")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        if dominant.as_deref() == Some("red") {
            dominant_reds += 1;
        }
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_color_histogram_elapsed_ms={elapsed_ms}");
    assert_eq!(dominant_reds, 10);

    // Lightweight guardrail; strict NFR checks are environment-specific.
    assert!(
        elapsed_ms < 5_000,
        "histogram classification should stay bounded"
    );
}

#[test]
fn benchmark_hsv_split_stays_bounded() {
    let frame = Image::solid_rgb(640, 480, [10, 120, 240]).expect("frame builds");

    let start = Instant::now();
    let mut checksum = 0_u64;
    for _ in 0..10 {
        let (h, s, v) = split_hsv(&frame).expect("split runs");
        checksum += h[0] as u64 + s[0] as u64 + v[0] as u64;
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_hsv_split_elapsed_ms={elapsed_ms}");
    assert!(checksum > 0);
    assert!(elapsed_ms < 5_000, "hsv conversion should stay bounded");
}

#[test]
fn benchmark_edge_pipeline_smoke() {
    let mut frame = Image::filled(320, 240, visionflow_core::PixelFormat::Gray, 255)
        .expect("frame builds");
    for y in 60..180_u32 {
        for x in 80..240_u32 {
            let offset = frame.pixel_offset(x, y);
            frame.data_mut()[offset] = 0;
        }
    }

    let params = EdgeParams {
        method: EdgeMethod::Sobel,
        min_contour_area: 50.0,
        ..EdgeParams::default()
    };

    let start = Instant::now();
    let mut contours = 0;
    for _ in 0..5 {
        contours += edge_detect(&frame, &params).expect("edge runs").objects.len();
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_edge_pipeline_elapsed_ms={elapsed_ms}");
    assert_eq!(contours, 5);
    assert!(elapsed_ms < 10_000, "edge pipeline smoke should stay bounded");
}
