//! Square fiducial marker detection and decoding.
//!
//! Pipeline: binarize (Otsu, dark-as-foreground), trace external contours,
//! keep convex quadrilaterals, perspective-sample the cell grid for each of
//! the four corner orders, verify the dark border, and look the inner bits
//! up in the selected dictionary. The corner order that decodes is the
//! marker's canonical top-left/top-right/bottom-right/bottom-left order.
//!
//! Dictionaries are generated deterministically per name (seeded, with
//! rotation-ambiguity and minimum-distance constraints), so markers
//! rendered by [`synthesize_marker`] round-trip exactly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::json;
use visionflow_core::{Image, ObjectKind, PixelFormat, Point, Rect, VisionObject};
use visionflow_imgproc::{
    approx_poly_dp, contour_stats, find_external_contours, otsu_threshold, to_gray,
};

use crate::{ArucoParams, Detection, DetectError, params::ArucoDictionary};

/// Smallest accepted candidate quad area, in pixels.
const MIN_QUAD_AREA: f64 = 100.0;

struct Dictionary {
    bits: usize,
    lookup: HashMap<u64, u16>,
}

fn dictionary(kind: ArucoDictionary) -> Arc<Dictionary> {
    static CACHE: OnceLock<Mutex<HashMap<ArucoDictionary, Arc<Dictionary>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    let mut cache = match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    cache
        .entry(kind)
        .or_insert_with(|| Arc::new(generate_dictionary(kind)))
        .clone()
}

fn generate_dictionary(kind: ArucoDictionary) -> Dictionary {
    let bits = kind.marker_bits();
    let count = kind.marker_count();
    let code_bits = bits * bits;
    let mask = if code_bits == 64 {
        u64::MAX
    } else {
        (1_u64 << code_bits) - 1
    };

    let mut rng = StdRng::seed_from_u64(0x5eed_a9c0 ^ ((bits as u64) << 32) ^ count as u64);
    let mut min_distance = (code_bits / 10).max(1) as u32;
    let mut codes: Vec<u64> = Vec::with_capacity(count);
    let mut rotations: Vec<u64> = Vec::new();
    let mut attempts = 0_u64;

    while codes.len() < count {
        attempts += 1;
        if attempts % 200_000 == 0 && min_distance > 1 {
            // The packing got too tight for this distance; relax it so
            // generation stays deterministic and terminating.
            min_distance -= 1;
        }

        let candidate: u64 = rng.random::<u64>() & mask;
        let candidate_rotations = [
            candidate,
            rotate_code(candidate, bits, 1),
            rotate_code(candidate, bits, 2),
            rotate_code(candidate, bits, 3),
        ];

        // Orientation must be decidable: all four rotations distinct.
        let mut ambiguous = false;
        for i in 0..4 {
            for j in (i + 1)..4 {
                if candidate_rotations[i] == candidate_rotations[j] {
                    ambiguous = true;
                }
            }
        }
        if ambiguous {
            continue;
        }

        let too_close = candidate_rotations.iter().any(|&rotated| {
            rotations
                .iter()
                .any(|&existing| (rotated ^ existing).count_ones() < min_distance)
        });
        if too_close {
            continue;
        }

        rotations.extend_from_slice(&candidate_rotations);
        codes.push(candidate);
    }

    let lookup = codes
        .into_iter()
        .enumerate()
        .map(|(id, code)| (code, id as u16))
        .collect();

    Dictionary { bits, lookup }
}

// Rotates a row-major packed bit grid clockwise `turns` times.
fn rotate_code(code: u64, bits: usize, turns: usize) -> u64 {
    let mut current = code;
    for _ in 0..turns {
        let mut rotated = 0_u64;
        for row in 0..bits {
            for col in 0..bits {
                let source = (bits - 1 - col) * bits + row;
                if current & (1 << source) != 0 {
                    rotated |= 1 << (row * bits + col);
                }
            }
        }
        current = rotated;
    }
    current
}

/// Detects and decodes fiducial markers against one dictionary.
///
/// Each decoded marker contributes one `aruco_marker` object carrying the
/// canonical corner order, decoded id, axis-aligned hull box, corner-mean
/// center, and the top-edge rotation angle in `[0, 360)`.
///
/// # Errors
/// Returns [`DetectError::Imgproc`] when binarization or contour tracing
/// fails on the input buffer.
pub fn aruco_detect(image: &Image, params: &ArucoParams) -> Result<Detection, DetectError> {
    let dict = dictionary(params.dictionary);
    let gray = to_gray(image)?;
    let (threshold, _) = otsu_threshold(&gray)?;

    // Markers are dark on light; trace the dark regions.
    let inverted_data: Vec<u8> = gray
        .data()
        .iter()
        .map(|&v| if v <= threshold { 255 } else { 0 })
        .collect();
    let inverted = Image::new(gray.width(), gray.height(), PixelFormat::Gray, inverted_data)?;

    let contours = find_external_contours(&inverted)?;
    let mut objects = Vec::new();

    for contour in contours {
        let stats = contour_stats(&contour);
        if stats.area < MIN_QUAD_AREA {
            continue;
        }

        let approx = approx_poly_dp(&contour, 0.05 * stats.perimeter);
        if approx.len() != 4 {
            continue;
        }

        let corners = order_clockwise(&approx);
        if !is_convex(&corners) {
            continue;
        }

        if let Some((id, canonical)) = decode_quad(&gray, threshold, &corners, &dict) {
            let index = objects.len();
            objects.push(marker_object(id, &canonical, index, params.dictionary));
        }
    }

    Ok(Detection {
        objects,
        canvas: image.clone(),
    })
}

fn order_clockwise(quad: &[[i32; 2]]) -> [(f64, f64); 4] {
    let cx = quad.iter().map(|p| p[0] as f64).sum::<f64>() / 4.0;
    let cy = quad.iter().map(|p| p[1] as f64).sum::<f64>() / 4.0;

    let mut corners: Vec<(f64, f64)> = quad.iter().map(|p| (p[0] as f64, p[1] as f64)).collect();
    // Ascending angle around the centroid is visual clockwise with y down,
    // starting in the top-left quadrant.
    corners.sort_by(|a, b| {
        let angle_a = (a.1 - cy).atan2(a.0 - cx);
        let angle_b = (b.1 - cy).atan2(b.0 - cx);
        angle_a.total_cmp(&angle_b)
    });
    [corners[0], corners[1], corners[2], corners[3]]
}

fn is_convex(corners: &[(f64, f64); 4]) -> bool {
    let mut sign = 0.0_f64;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let c = corners[(i + 2) % 4];
        let cross = (b.0 - a.0) * (c.1 - b.1) - (b.1 - a.1) * (c.0 - b.0);
        if cross.abs() < f64::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

fn decode_quad(
    gray: &Image,
    threshold: u8,
    corners: &[(f64, f64); 4],
    dict: &Dictionary,
) -> Option<(u16, [(f64, f64); 4])> {
    for start in 0..4 {
        let ordered = [
            corners[start],
            corners[(start + 1) % 4],
            corners[(start + 2) % 4],
            corners[(start + 3) % 4],
        ];

        if let Some(code) = sample_grid(gray, threshold, &ordered, dict.bits) {
            if let Some(&id) = dict.lookup.get(&code) {
                return Some((id, ordered));
            }
        }
    }
    None
}

// Samples the (bits + 2)^2 cell grid through the quad's perspective map.
// Returns the packed inner bits, or None when the border is not all dark.
fn sample_grid(
    gray: &Image,
    threshold: u8,
    corners: &[(f64, f64); 4],
    bits: usize,
) -> Option<u64> {
    let cells = bits + 2;
    let map = Homography::unit_square_to(corners);
    let mut code = 0_u64;

    for row in 0..cells {
        for col in 0..cells {
            let u = (col as f64 + 0.5) / cells as f64;
            let v = (row as f64 + 0.5) / cells as f64;
            let (x, y) = map.apply(u, v);
            let dark = sample_bilinear(gray, x, y) < threshold as f64;

            let border = row == 0 || col == 0 || row == cells - 1 || col == cells - 1;
            if border {
                if !dark {
                    return None;
                }
            } else if dark {
                code |= 1 << ((row - 1) * bits + (col - 1));
            }
        }
    }

    Some(code)
}

struct Homography {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    g: f64,
    h: f64,
}

impl Homography {
    // Projective map taking the unit square (0,0),(1,0),(1,1),(0,1) onto
    // the quad corners in TL,TR,BR,BL order (Heckbert's formulation).
    fn unit_square_to(corners: &[(f64, f64); 4]) -> Homography {
        let (x0, y0) = corners[0];
        let (x1, y1) = corners[1];
        let (x2, y2) = corners[2];
        let (x3, y3) = corners[3];

        let sx = (x0 - x1) + (x2 - x3);
        let sy = (y0 - y1) + (y2 - y3);

        if sx.abs() < 1e-12 && sy.abs() < 1e-12 {
            return Homography {
                a: x1 - x0,
                b: x2 - x1,
                c: x0,
                d: y1 - y0,
                e: y2 - y1,
                f: y0,
                g: 0.0,
                h: 0.0,
            };
        }

        let dx1 = x1 - x2;
        let dy1 = y1 - y2;
        let dx2 = x3 - x2;
        let dy2 = y3 - y2;
        let det = dx1 * dy2 - dx2 * dy1;
        let g = (sx * dy2 - sy * dx2) / det;
        let h = (dx1 * sy - dy1 * sx) / det;

        Homography {
            a: x1 - x0 + g * x1,
            b: x3 - x0 + h * x3,
            c: x0,
            d: y1 - y0 + g * y1,
            e: y3 - y0 + h * y3,
            f: y0,
            g,
            h,
        }
    }

    fn apply(&self, u: f64, v: f64) -> (f64, f64) {
        let w = self.g * u + self.h * v + 1.0;
        (
            (self.a * u + self.b * v + self.c) / w,
            (self.d * u + self.e * v + self.f) / w,
        )
    }
}

fn sample_bilinear(gray: &Image, x: f64, y: f64) -> f64 {
    let max_x = gray.width() as f64 - 1.0;
    let max_y = gray.height() as f64 - 1.0;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(max_x as usize);
    let y1 = (y0 + 1).min(max_y as usize);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let width = gray.width() as usize;
    let data = gray.data();
    let p00 = data[y0 * width + x0] as f64;
    let p01 = data[y0 * width + x1] as f64;
    let p10 = data[y1 * width + x0] as f64;
    let p11 = data[y1 * width + x1] as f64;

    let top = p00 + (p01 - p00) * fx;
    let bottom = p10 + (p11 - p10) * fx;
    top + (bottom - top) * fy
}

fn marker_object(
    id: u16,
    corners: &[(f64, f64); 4],
    index: usize,
    dictionary: ArucoDictionary,
) -> VisionObject {
    let xs: Vec<f64> = corners.iter().map(|c| c.0).collect();
    let ys: Vec<f64> = corners.iter().map(|c| c.1).collect();
    let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let center = Point::new(xs.iter().sum::<f64>() / 4.0, ys.iter().sum::<f64>() / 4.0);

    // Top edge direction gives the marker rotation.
    let (tl, tr) = (corners[0], corners[1]);
    let mut angle = (tr.1 - tl.1).atan2(tr.0 - tl.0).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }

    // Shoelace area and closed perimeter of the corner polygon.
    let mut area = 0.0;
    let mut perimeter = 0.0;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        area += a.0 * b.1 - b.0 * a.1;
        perimeter += ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
    }
    area = area.abs() / 2.0;

    let mut object = VisionObject::new(
        format!("aruco_{id}"),
        ObjectKind::ArucoMarker,
        Rect::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x) as i32,
            (max_y - min_y) as i32,
        ),
        center,
        1.0,
    );
    object.area = Some(area);
    object.perimeter = Some(perimeter);
    object.rotation_deg = Some(angle);
    object.set_property("marker_id", json!(id));
    object.set_property(
        "corners",
        json!(corners.iter().map(|c| [c.0, c.1]).collect::<Vec<_>>()),
    );
    object.set_property("index", json!(index));
    object.set_property("dictionary", json!(dictionary.as_str()));
    object
}

/// Renders a marker from the dictionary as a grayscale image: white quiet
/// zone, dark border, and the id's bit pattern at `cell_px` pixels per
/// cell.
///
/// # Errors
/// Returns [`DetectError::InvalidParameter`] for an id outside the
/// dictionary or a zero cell size.
pub fn synthesize_marker(
    kind: ArucoDictionary,
    id: u16,
    cell_px: u32,
) -> Result<Image, DetectError> {
    if cell_px == 0 {
        return Err(DetectError::InvalidParameter {
            name: "cell_px",
            value: "0".to_string(),
        });
    }
    if id as usize >= kind.marker_count() {
        return Err(DetectError::InvalidParameter {
            name: "marker_id",
            value: id.to_string(),
        });
    }

    let dict = dictionary(kind);
    let code = dict
        .lookup
        .iter()
        .find(|&(_, &mapped)| mapped == id)
        .map(|(&code, _)| code)
        .ok_or(DetectError::InvalidParameter {
            name: "marker_id",
            value: id.to_string(),
        })?;

    let bits = kind.marker_bits();
    let cells = bits + 2;
    let margin = cell_px;
    let side = cells as u32 * cell_px + 2 * margin;
    let mut image = Image::filled(side, side, PixelFormat::Gray, 255)?;

    for row in 0..cells {
        for col in 0..cells {
            let border = row == 0 || col == 0 || row == cells - 1 || col == cells - 1;
            let dark = if border {
                true
            } else {
                code & (1 << ((row - 1) * bits + (col - 1))) != 0
            };
            if !dark {
                continue;
            }

            for y in 0..cell_px {
                for x in 0..cell_px {
                    let px = margin + col as u32 * cell_px + x;
                    let py = margin + row as u32 * cell_px + y;
                    let offset = image.pixel_offset(px, py);
                    image.data_mut()[offset] = 0;
                }
            }
        }
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    //! Unit tests for dictionary generation and the decode round trip.

    use super::*;

    #[test]
    fn dictionary_codes_are_rotation_unambiguous() {
        let dict = dictionary(ArucoDictionary::Dict4x4_50);
        assert_eq!(dict.lookup.len(), 50);

        for &code in dict.lookup.keys() {
            let rotations = [
                rotate_code(code, 4, 1),
                rotate_code(code, 4, 2),
                rotate_code(code, 4, 3),
            ];
            for rotated in rotations {
                assert_ne!(rotated, code, "self-symmetric code in dictionary");
            }
        }
    }

    #[test]
    fn rotate_code_four_times_is_identity() {
        let code = 0b1010_0110_0001_1100;
        assert_eq!(rotate_code(code, 4, 4), code);
    }

    #[test]
    fn synthesized_marker_round_trips() {
        let params = ArucoParams {
            dictionary: ArucoDictionary::Dict4x4_50,
        };
        let marker = synthesize_marker(params.dictionary, 7, 10).expect("marker renders");

        let detection = aruco_detect(&marker, &params).expect("detect runs");
        assert_eq!(detection.objects.len(), 1);

        let object = &detection.objects[0];
        assert_eq!(
            object.properties.get("marker_id").and_then(|v| v.as_u64()),
            Some(7)
        );
        assert_eq!(object.confidence, 1.0);

        // Unrotated marker reports an angle near 0 (or wrapped near 360).
        let angle = object.rotation_deg.expect("rotation set");
        assert!(angle < 5.0 || angle > 355.0, "angle {angle}");
    }

    #[test]
    fn rotated_marker_decodes_with_rotation_angle() {
        let params = ArucoParams {
            dictionary: ArucoDictionary::Dict4x4_50,
        };
        let marker = synthesize_marker(params.dictionary, 3, 10).expect("marker renders");

        // 180-degree rotation is a buffer reversal for grayscale.
        let mut data = marker.data().to_vec();
        data.reverse();
        let rotated = Image::new(marker.width(), marker.height(), PixelFormat::Gray, data)
            .expect("image builds");

        let detection = aruco_detect(&rotated, &params).expect("detect runs");
        assert_eq!(detection.objects.len(), 1);

        let object = &detection.objects[0];
        assert_eq!(
            object.properties.get("marker_id").and_then(|v| v.as_u64()),
            Some(3)
        );
        let angle = object.rotation_deg.expect("rotation set");
        assert!((angle - 180.0).abs() < 5.0, "angle {angle}");
    }

    #[test]
    fn marker_corners_and_box_agree() {
        let params = ArucoParams {
            dictionary: ArucoDictionary::Dict5x5_100,
        };
        let marker = synthesize_marker(params.dictionary, 42, 8).expect("marker renders");
        let detection = aruco_detect(&marker, &params).expect("detect runs");
        assert_eq!(detection.objects.len(), 1);

        let object = &detection.objects[0];
        let corners = object
            .properties
            .get("corners")
            .and_then(|v| v.as_array())
            .expect("corners present");
        assert_eq!(corners.len(), 4);

        // Center is the corner mean and sits inside the bounding box.
        let bbox = object.bounding_box;
        assert!(bbox.contains_point(object.center.x as i32, object.center.y as i32));
        assert!(object.area.expect("area") > 0.0);
    }

    #[test]
    fn plain_image_has_no_markers() {
        let params = ArucoParams::default();
        let blank = Image::filled(64, 64, PixelFormat::Gray, 255).expect("image builds");
        let detection = aruco_detect(&blank, &params).expect("detect runs");
        assert!(detection.objects.is_empty());
    }

    #[test]
    fn synthesize_rejects_out_of_range_id() {
        assert!(matches!(
            synthesize_marker(ArucoDictionary::Dict4x4_50, 50, 8),
            Err(DetectError::InvalidParameter { .. })
        ));
    }
}
