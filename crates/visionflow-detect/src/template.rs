//! Template matching over a sliding window.

use serde_json::json;
use visionflow_core::{Image, ObjectKind, Point, Rect, VisionObject};
use visionflow_imgproc::to_gray;

use crate::{Detection, DetectError, TemplateMatchParams};

/// Slides `template` over `image` and reports the single best location.
///
/// Both buffers are converted to grayscale first. For the SQDIFF family
/// the best response is the minimum and the reported confidence is
/// `1 - min`; the other families accept on `max >= threshold` and report
/// the maximum itself. Confidence is clamped to 1.0 to absorb
/// floating-point drift on the normalized methods.
///
/// # Errors
/// Returns [`DetectError::TemplateTooLarge`] when the template exceeds the
/// search image, [`DetectError::InvalidParameter`] for a threshold outside
/// `[0, 1]`.
pub fn template_match(
    image: &Image,
    template: &Image,
    params: &TemplateMatchParams,
) -> Result<Detection, DetectError> {
    if !(0.0..=1.0).contains(&params.threshold) {
        return Err(DetectError::InvalidParameter {
            name: "threshold",
            value: params.threshold.to_string(),
        });
    }
    if template.width() > image.width() || template.height() > image.height() {
        return Err(DetectError::TemplateTooLarge {
            template_width: template.width(),
            template_height: template.height(),
            image_width: image.width(),
            image_height: image.height(),
        });
    }

    let search = to_gray(image)?;
    let needle = to_gray(template)?;
    let response = response_map(&search, &needle, params.method);

    let mut best_value = response.values[0];
    let mut best_index = 0;
    for (index, &value) in response.values.iter().enumerate() {
        let better = if params.method.lower_is_better() {
            value < best_value
        } else {
            value > best_value
        };
        if better {
            best_value = value;
            best_index = index;
        }
    }

    let (score, accepted) = if params.method.lower_is_better() {
        (1.0 - best_value, best_value <= 1.0 - params.threshold)
    } else {
        (best_value, best_value >= params.threshold)
    };

    let mut objects = Vec::new();
    if accepted {
        let x = (best_index % response.width) as i32;
        let y = (best_index / response.width) as i32;
        let w = template.width() as i32;
        let h = template.height() as i32;

        let mut object = VisionObject::new(
            "match_0",
            ObjectKind::TemplateMatch,
            Rect::new(x, y, w, h),
            Point::new((x + w / 2) as f64, (y + h / 2) as f64),
            score.min(1.0),
        );
        object.rotation_deg = Some(0.0);
        object.set_property("template_id", json!(params.template_id));
        object.set_property("method", json!(params.method.as_str()));
        object.set_property("scale", json!(1.0));
        object.set_property("raw_score", json!(score));
        objects.push(object);
    }

    Ok(Detection {
        objects,
        canvas: image.clone(),
    })
}

struct ResponseMap {
    width: usize,
    values: Vec<f64>,
}

// Window sums and squared sums come from integral images, so the sliding
// inner loop computes only the cross term; every method's value derives
// from (cross, window_sum, window_sq) and the fixed template statistics
// (sqdiff = window_sq - 2 cross + template_sq).
fn response_map(search: &Image, needle: &Image, method: crate::TemplateMatchMethod) -> ResponseMap {
    use crate::TemplateMatchMethod as M;

    let iw = search.width() as usize;
    let tw = needle.width() as usize;
    let th = needle.height() as usize;
    let out_w = iw - tw + 1;
    let out_h = search.height() as usize - th + 1;

    let image = search.data();
    let template = needle.data();
    let template_len = (tw * th) as f64;

    let template_mean = template.iter().map(|&v| v as f64).sum::<f64>() / template_len;
    let template_sq: f64 = template.iter().map(|&v| (v as f64) * (v as f64)).sum();
    let template_centered_sq: f64 = template
        .iter()
        .map(|&v| {
            let centered = v as f64 - template_mean;
            centered * centered
        })
        .sum();

    let (integral, integral_sq) = integral_images(image, iw, search.height() as usize);
    let window = |x: usize, y: usize, table: &[f64]| -> f64 {
        let stride = iw + 1;
        table[(y + th) * stride + (x + tw)] + table[y * stride + x]
            - table[y * stride + (x + tw)]
            - table[(y + th) * stride + x]
    };

    let mut values = Vec::with_capacity(out_w * out_h);

    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut cross = 0.0;
            for ty in 0..th {
                let image_row = (oy + ty) * iw + ox;
                let template_row = ty * tw;
                for tx in 0..tw {
                    cross += image[image_row + tx] as f64 * template[template_row + tx] as f64;
                }
            }

            let window_sum = window(ox, oy, &integral);
            let window_sq = window(ox, oy, &integral_sq);

            let value = match method {
                M::SqDiff => window_sq - 2.0 * cross + template_sq,
                M::SqDiffNormed => {
                    let sqdiff = window_sq - 2.0 * cross + template_sq;
                    let norm = (template_sq * window_sq).sqrt();
                    if norm > f64::EPSILON { sqdiff / norm } else { 0.0 }
                }
                M::CCorr => cross,
                M::CCorrNormed => {
                    let norm = (template_sq * window_sq).sqrt();
                    if norm > f64::EPSILON { cross / norm } else { 0.0 }
                }
                M::CCoeff => cross - window_sum * template_mean,
                M::CCoeffNormed => {
                    if template_centered_sq <= f64::EPSILON {
                        // Constant template: the coefficient is undefined, so
                        // degrade to normalized cross-correlation.
                        let norm = (template_sq * window_sq).sqrt();
                        if norm > f64::EPSILON { cross / norm } else { 0.0 }
                    } else {
                        let window_mean = window_sum / template_len;
                        let coeff = cross - window_sum * template_mean;
                        let window_centered_sq = window_sq - window_sum * window_mean;
                        let norm = (template_centered_sq * window_centered_sq).sqrt();
                        if norm > f64::EPSILON { coeff / norm } else { 0.0 }
                    }
                }
            };
            values.push(value);
        }
    }

    ResponseMap {
        width: out_w,
        values,
    }
}

// (width+1)x(height+1) summed-area tables of values and squared values.
fn integral_images(image: &[u8], width: usize, height: usize) -> (Vec<f64>, Vec<f64>) {
    let stride = width + 1;
    let mut sums = vec![0.0; stride * (height + 1)];
    let mut squares = vec![0.0; stride * (height + 1)];

    for y in 0..height {
        let mut row_sum = 0.0;
        let mut row_sq = 0.0;
        for x in 0..width {
            let sample = image[y * width + x] as f64;
            row_sum += sample;
            row_sq += sample * sample;
            sums[(y + 1) * stride + (x + 1)] = sums[y * stride + (x + 1)] + row_sum;
            squares[(y + 1) * stride + (x + 1)] = squares[y * stride + (x + 1)] + row_sq;
        }
    }

    (sums, squares)
}

#[cfg(test)]
mod tests {
    //! Unit tests for match acceptance and localization.

    use visionflow_core::PixelFormat;

    use super::*;
    use crate::TemplateMatchMethod;

    fn scene_with_square(square: Rect) -> Image {
        let mut scene = Image::filled(64, 48, PixelFormat::Gray, 0).expect("image should build");
        for y in square.y..square.y2() {
            for x in square.x..square.x2() {
                let offset = scene.pixel_offset(x as u32, y as u32);
                scene.data_mut()[offset] = 255;
            }
        }
        scene
    }

    fn params(method: TemplateMatchMethod, threshold: f64) -> TemplateMatchParams {
        TemplateMatchParams {
            template_id: "tmpl_fixture".to_string(),
            method,
            threshold,
        }
    }

    #[test]
    fn normalized_ccoeff_finds_exact_square() {
        let scene = scene_with_square(Rect::new(20, 12, 10, 10));
        let template = Image::filled(10, 10, PixelFormat::Gray, 255).expect("image should build");

        let detection = template_match(
            &scene,
            &template,
            &params(TemplateMatchMethod::CCoeffNormed, 0.8),
        )
        .expect("match runs");

        assert_eq!(detection.objects.len(), 1);
        let object = &detection.objects[0];
        assert_eq!(object.bounding_box, Rect::new(20, 12, 10, 10));
        assert_eq!(object.center, Point::new(25.0, 17.0));
        assert!(object.confidence >= 0.99);
        assert_eq!(
            object.properties.get("template_id").and_then(|v| v.as_str()),
            Some("tmpl_fixture")
        );
    }

    #[test]
    fn sqdiff_normed_inverts_score() {
        let scene = scene_with_square(Rect::new(5, 5, 8, 8));
        let template = Image::filled(8, 8, PixelFormat::Gray, 255).expect("image should build");

        let detection = template_match(
            &scene,
            &template,
            &params(TemplateMatchMethod::SqDiffNormed, 0.9),
        )
        .expect("match runs");

        assert_eq!(detection.objects.len(), 1);
        assert_eq!(detection.objects[0].bounding_box.x, 5);
        assert!(detection.objects[0].confidence >= 0.99);
    }

    #[test]
    fn below_threshold_emits_no_objects() {
        // Flat scene, structured template: nothing correlates.
        let scene = Image::filled(32, 32, PixelFormat::Gray, 10).expect("image should build");
        let mut template = Image::filled(8, 8, PixelFormat::Gray, 0).expect("image should build");
        for y in 0..4 {
            for x in 0..8 {
                let offset = template.pixel_offset(x, y);
                template.data_mut()[offset] = 250;
            }
        }

        let detection = template_match(
            &scene,
            &template,
            &params(TemplateMatchMethod::CCoeffNormed, 0.8),
        )
        .expect("match runs");
        assert!(detection.objects.is_empty());
    }

    #[test]
    fn zero_threshold_always_accepts_best_location() {
        let scene = scene_with_square(Rect::new(3, 3, 6, 6));
        let template = Image::filled(6, 6, PixelFormat::Gray, 255).expect("image should build");

        for method in [
            TemplateMatchMethod::SqDiff,
            TemplateMatchMethod::SqDiffNormed,
            TemplateMatchMethod::CCorrNormed,
            TemplateMatchMethod::CCoeffNormed,
        ] {
            let detection =
                template_match(&scene, &template, &params(method, 0.0)).expect("match runs");
            assert_eq!(
                detection.objects.len(),
                1,
                "threshold 0 must accept for {method:?}"
            );
        }
    }

    #[test]
    fn oversized_template_is_rejected() {
        let scene = Image::filled(8, 8, PixelFormat::Gray, 0).expect("image should build");
        let template = Image::filled(16, 16, PixelFormat::Gray, 0).expect("image should build");
        assert!(matches!(
            template_match(&scene, &template, &params(TemplateMatchMethod::CCorr, 0.5)),
            Err(DetectError::TemplateTooLarge { .. })
        ));
    }

    #[test]
    fn confidence_is_clamped_to_one() {
        let scene = scene_with_square(Rect::new(2, 2, 5, 5));
        let template = Image::filled(5, 5, PixelFormat::Gray, 255).expect("image should build");

        let detection = template_match(
            &scene,
            &template,
            &params(TemplateMatchMethod::CCorrNormed, 0.5),
        )
        .expect("match runs");
        assert!(detection.objects[0].confidence <= 1.0);
    }
}
