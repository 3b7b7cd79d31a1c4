//! Shared fixtures for service integration tests.

use std::path::Path;
use std::sync::Arc;

use visionflow_core::{Image, PixelFormat, Rect};
use visionflow_history::HistoryRing;
use visionflow_service::VisionService;
use visionflow_store::{ImageStore, ImageStoreConfig};
use visionflow_templates::TemplateStore;

/// Builds a service with generous store bounds and the given ring size.
#[allow(dead_code)]
pub fn service(template_dir: &Path, ring_capacity: usize) -> VisionService {
    VisionService::new(
        Arc::new(ImageStore::new(ImageStoreConfig {
            max_images: 64,
            max_bytes: 256 * 1024 * 1024,
        })),
        Arc::new(TemplateStore::open(template_dir).expect("template store opens")),
        Arc::new(HistoryRing::new(ring_capacity)),
        320,
    )
}

/// 640x480 black frame with a 50x50 white square at (100, 100).
#[allow(dead_code)]
pub fn black_frame_with_white_square() -> Image {
    let mut image = Image::filled(640, 480, PixelFormat::Gray, 0).expect("image builds");
    paint_gray(&mut image, Rect::new(100, 100, 50, 50), 255);
    image
}

/// Fills a rectangle of a grayscale image with one value.
#[allow(dead_code)]
pub fn paint_gray(image: &mut Image, rect: Rect, value: u8) {
    for y in rect.y..rect.y2() {
        for x in rect.x..rect.x2() {
            let offset = image.pixel_offset(x as u32, y as u32);
            image.data_mut()[offset] = value;
        }
    }
}
