#![warn(missing_docs)]
//! # visionflow binary
//!
//! Startup wiring plus an end-to-end self-check: capture a synthetic
//! frame, store it, run edge detection through the full pipeline, and
//! print the resulting system status. The HTTP router mounts on
//! [`visionflow_app::AppState`] in deployment builds.

use visionflow_app::{AppState, Config, init_logging};
use visionflow_detect::EdgeParams;
use visionflow_service::EdgeDetectRequest;

fn main() {
    init_logging();

    let config = Config::from_env();
    let state = match AppState::initialize(config) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("failed to initialize visionflow: {error}");
            std::process::exit(1);
        }
    };

    println!("visionflow {}", visionflow_app::APP_VERSION);

    if let Err(error) = self_check(&state) {
        eprintln!("self-check failed: {error}");
        std::process::exit(1);
    }

    match state.system_status() {
        Ok(status) => match serde_json::to_string_pretty(&status) {
            Ok(rendered) => println!("{rendered}"),
            Err(error) => eprintln!("status serialization failed: {error}"),
        },
        Err(error) => eprintln!("status projection failed: {error}"),
    }
}

fn self_check(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let capture = state
        .service
        .capture_image(state.camera.as_ref(), "test", None)?;

    let response = state.service.edge_detect(&EdgeDetectRequest {
        image_id: capture.image_id.clone(),
        roi: None,
        params: EdgeParams::default(),
        record_history: true,
    })?;

    println!(
        "self-check: image {} -> {} contours in {}ms",
        capture.image_id,
        response.objects.len(),
        response.processing_time_ms
    );
    Ok(())
}
