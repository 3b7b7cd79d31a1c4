//! Validates the vision response contract against its frozen JSON schema,
//! both for a static fixture and for a response produced by the live
//! pipeline.

use std::sync::Arc;

use jsonschema::JSONSchema;
use serde_json::{Map, Value};
use visionflow_core::Image;
use visionflow_detect::ColorParams;
use visionflow_history::HistoryRing;
use visionflow_service::{ColorDetectRequest, VisionService};
use visionflow_store::{ImageStore, ImageStoreConfig};
use visionflow_templates::TemplateStore;

fn load_json(path: &str) -> Value {
    let raw = std::fs::read_to_string(path).expect("json file should be readable");
    serde_json::from_str(&raw).expect("json file should be valid")
}

fn compile_validator() -> JSONSchema {
    let schema = load_json(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../contracts/vision-response.schema.json"
    ));
    JSONSchema::compile(&schema).expect("schema should compile")
}

#[test]
fn vision_response_fixture_matches_schema() {
    let validator = compile_validator();
    let fixture = load_json(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../contracts/fixtures/vision-response.valid.json"
    ));
    assert!(
        validator.is_valid(&fixture),
        "vision response fixture should validate against schema"
    );
}

#[test]
fn live_pipeline_response_matches_schema() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = VisionService::new(
        Arc::new(ImageStore::new(ImageStoreConfig {
            max_images: 8,
            max_bytes: 16 * 1024 * 1024,
        })),
        Arc::new(TemplateStore::open(dir.path()).expect("template store opens")),
        Arc::new(HistoryRing::new(8)),
        320,
    );

    let image = Image::solid_rgb(32, 32, [255, 0, 0]).expect("image builds");
    let image_id = service.images().put(image, Map::new()).expect("image stored");

    let response = service
        .color_detect(&ColorDetectRequest {
            image_id,
            roi: None,
            contour: None,
            params: ColorParams::default(),
            record_history: false,
        })
        .expect("color detect runs");

    let serialized = serde_json::to_value(&response).expect("response serializes");
    let validator = compile_validator();
    assert!(
        validator.is_valid(&serialized),
        "live response should validate against schema: {serialized}"
    );
}
