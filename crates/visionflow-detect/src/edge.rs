//! Edge detection: preprocessing, operator, contour extraction, filtering.

use serde_json::json;
use visionflow_core::{Image, ObjectKind, Point, VisionObject};
use visionflow_imgproc::{
    GradientKernel, MorphOp, approx_poly_dp, bilateral_filter, canny, contour_stats, equalize_hist,
    find_external_contours, gaussian_blur, gradient_magnitude, laplacian, morphology,
    threshold_binary, to_gray,
};

use crate::{Detection, DetectError, EdgeMethod, EdgeParams, MorphologyOperation, PreprocessParams};

/// Runs the edge pipeline and emits one `edge_contour` object per
/// surviving contour, sorted by area descending.
///
/// The returned canvas is the preprocessed image, so overlays sit on what
/// the operator actually saw.
///
/// # Errors
/// Returns [`DetectError::InvalidParameter`] for bad kernel or threshold
/// settings surfaced by the underlying primitives.
pub fn edge_detect(image: &Image, params: &EdgeParams) -> Result<Detection, DetectError> {
    let processed = preprocess(image, &params.preprocessing)?;
    let gray = to_gray(&processed)?;
    let edges = apply_operator(&gray, params)?;

    let contours = find_external_contours(&edges)?;
    let mut survivors = Vec::new();

    for contour in contours {
        let stats = contour_stats(&contour);

        if stats.area < params.min_contour_area {
            continue;
        }
        if params
            .max_contour_area
            .is_some_and(|max| stats.area > max)
        {
            continue;
        }
        if stats.perimeter < params.min_contour_perimeter {
            continue;
        }
        if params
            .max_contour_perimeter
            .is_some_and(|max| stats.perimeter > max)
        {
            continue;
        }

        let approx = approx_poly_dp(&contour, 0.02 * stats.perimeter);
        survivors.push((contour, stats, approx.len()));
    }

    survivors.sort_by(|a, b| b.1.area.total_cmp(&a.1.area));
    survivors.truncate(params.max_contours);

    let objects = survivors
        .into_iter()
        .enumerate()
        .map(|(index, (contour, stats, vertex_count))| {
            let mut object = VisionObject::new(
                format!("contour_{index}"),
                ObjectKind::EdgeContour,
                stats.bounding_box,
                Point::new(stats.centroid.0 as f64, stats.centroid.1 as f64),
                1.0,
            );
            object.area = Some(stats.area);
            object.perimeter = Some(stats.perimeter);
            object.set_property("method", json!(params.method.as_str()));
            object.set_property("vertex_count", json!(vertex_count));
            object.set_property("is_closed", json!(true));
            object.contour = Some(contour);
            object
        })
        .collect();

    Ok(Detection {
        objects,
        canvas: processed,
    })
}

// Fixed stage order: blur, bilateral, morphology, equalize.
fn preprocess(image: &Image, params: &PreprocessParams) -> Result<Image, DetectError> {
    let mut result = image.clone();

    if params.blur_enabled {
        let kernel = force_odd(params.blur_kernel);
        result = gaussian_blur(&result, kernel, 0.0)?;
    }

    if params.bilateral_enabled {
        result = bilateral_filter(
            &result,
            force_odd(params.bilateral_d),
            params.bilateral_sigma_color,
            params.bilateral_sigma_space,
        )?;
    }

    if params.morphology_enabled {
        let op = match params.morphology_operation {
            MorphologyOperation::Close => MorphOp::Close,
            MorphologyOperation::Open => MorphOp::Open,
            MorphologyOperation::Gradient => MorphOp::Gradient,
        };
        result = morphology(&result, op, force_odd(params.morphology_kernel))?;
    }

    if params.equalize_enabled {
        result = equalize_hist(&result)?;
    }

    Ok(result)
}

fn force_odd(size: u32) -> u32 {
    if size % 2 == 0 { size + 1 } else { size }
}

fn apply_operator(gray: &Image, params: &EdgeParams) -> Result<Image, DetectError> {
    let binary = match params.method {
        EdgeMethod::Canny => canny(
            gray,
            params.canny_low,
            params.canny_high,
            params.canny_aperture,
            params.canny_l2_gradient,
        )?,
        EdgeMethod::Sobel => {
            let magnitude = gradient_magnitude(gray, GradientKernel::Sobel)?;
            threshold_binary(gray.width(), gray.height(), &magnitude, params.sobel_threshold)?
        }
        EdgeMethod::Scharr => {
            let magnitude = gradient_magnitude(gray, GradientKernel::Scharr)?;
            threshold_binary(gray.width(), gray.height(), &magnitude, params.scharr_threshold)?
        }
        EdgeMethod::Prewitt => {
            let magnitude = gradient_magnitude(gray, GradientKernel::Prewitt)?;
            threshold_binary(
                gray.width(),
                gray.height(),
                &magnitude,
                params.prewitt_threshold,
            )?
        }
        EdgeMethod::Laplacian => {
            let response = laplacian(gray)?;
            threshold_binary(
                gray.width(),
                gray.height(),
                &response,
                params.laplacian_threshold,
            )?
        }
        EdgeMethod::MorphologicalGradient => {
            let gradient = morphology(gray, MorphOp::Gradient, force_odd(params.morph_kernel))?;
            let response: Vec<f64> = gradient.data().iter().map(|&v| v as f64).collect();
            threshold_binary(gray.width(), gray.height(), &response, params.morph_threshold)?
        }
    };

    Ok(binary)
}
