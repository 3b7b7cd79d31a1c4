//! Dominant-color detection over an HSV color table.

use log::warn;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Map, Value, json};
use visionflow_core::{Image, ObjectKind, Point, Rect, VisionObject};
use visionflow_imgproc::{fill_polygon_mask, split_hsv};

use crate::{ColorMethod, ColorName, ColorParams, Detection, DetectError};

/// Number of k-means clusters for the kmeans method.
const KMEANS_CLUSTERS: usize = 3;
/// Fixed seed so kmeans results are reproducible run to run.
const KMEANS_SEED: u64 = 42;

struct ColorDef {
    name: ColorName,
    // None marks achromatic colors; hue is ignored for them.
    hue_ranges: Option<&'static [(u8, u8)]>,
    sat: (u8, u8),
    val: (u8, u8),
}

// HSV ranges in OpenCV scale (H 0..=179). Red wraps the hue circle.
const DEFINITIONS: [ColorDef; 10] = [
    ColorDef {
        name: ColorName::Red,
        hue_ranges: Some(&[(0, 15), (165, 179)]),
        sat: (100, 255),
        val: (80, 255),
    },
    ColorDef {
        name: ColorName::Orange,
        hue_ranges: Some(&[(16, 30)]),
        sat: (100, 255),
        val: (80, 255),
    },
    ColorDef {
        name: ColorName::Yellow,
        hue_ranges: Some(&[(31, 45)]),
        sat: (100, 255),
        val: (100, 255),
    },
    ColorDef {
        name: ColorName::Green,
        hue_ranges: Some(&[(46, 90)]),
        sat: (100, 255),
        val: (80, 255),
    },
    ColorDef {
        name: ColorName::Cyan,
        hue_ranges: Some(&[(91, 110)]),
        sat: (100, 255),
        val: (80, 255),
    },
    ColorDef {
        name: ColorName::Blue,
        hue_ranges: Some(&[(111, 140)]),
        sat: (100, 255),
        val: (80, 255),
    },
    ColorDef {
        name: ColorName::Purple,
        hue_ranges: Some(&[(141, 164)]),
        sat: (100, 255),
        val: (80, 255),
    },
    ColorDef {
        name: ColorName::White,
        hue_ranges: None,
        sat: (0, 30),
        val: (200, 255),
    },
    ColorDef {
        name: ColorName::Black,
        hue_ranges: None,
        sat: (0, 50),
        val: (0, 50),
    },
    ColorDef {
        name: ColorName::Gray,
        hue_ranges: None,
        sat: (0, 30),
        val: (51, 199),
    },
];

// Classification order: achromatic first, then chromatic in table order.
const CLASSIFY_ORDER: [usize; 10] = [7, 8, 9, 0, 1, 2, 3, 4, 5, 6];

fn matches(def: &ColorDef, h: u8, s: u8, v: u8) -> bool {
    if s < def.sat.0 || s > def.sat.1 || v < def.val.0 || v > def.val.1 {
        return false;
    }
    match def.hue_ranges {
        None => true,
        Some(ranges) => ranges.iter().any(|&(lo, hi)| lo <= h && h <= hi),
    }
}

/// Maps one HSV pixel to the first matching named color.
///
/// Achromatic colors are checked before chromatic ones; pixels matching no
/// definition return `None`.
pub fn classify_hsv(h: u8, s: u8, v: u8) -> Option<ColorName> {
    CLASSIFY_ORDER
        .iter()
        .map(|&index| &DEFINITIONS[index])
        .find(|def| matches(def, h, s, v))
        .map(|def| def.name)
}

/// Analyzes the dominant color of a region.
///
/// The region is the working buffer handed over by the orchestrator (the
/// full image or an extracted ROI); coordinates in the emitted object are
/// region-local. An optional contour (region-local points) restricts the
/// tally to pixels inside the polygon when `use_contour_mask` is set.
///
/// # Errors
/// Returns [`DetectError::Imgproc`] when mask rasterization fails.
pub fn color_detect(
    region: &Image,
    contour: Option<&[[i32; 2]]>,
    params: &ColorParams,
) -> Result<Detection, DetectError> {
    let (h, s, v) = split_hsv(region)?;

    let mask = match (params.use_contour_mask, contour) {
        (true, Some(points)) if points.len() >= 3 => {
            let mask = fill_polygon_mask(region.width(), region.height(), points)?;
            let nonzero = mask.data().iter().filter(|&&m| m > 0).count();
            if nonzero == 0 {
                warn!("contour mask is empty, falling back to full region");
                None
            } else {
                Some(mask)
            }
        }
        (true, Some(points)) => {
            warn!("contour with {} points cannot mask, using full region", points.len());
            None
        }
        _ => None,
    };

    let analysis = match params.method {
        ColorMethod::Histogram => histogram_analysis(&h, &s, &v, mask.as_ref()),
        ColorMethod::Kmeans => kmeans_analysis(&h, &s, &v, mask.as_ref()),
    };

    let dominant_pct = analysis.percentages[dominant_index(&analysis.percentages)];
    let dominant = index_name(dominant_index(&analysis.percentages));

    let matched = params.expected_color.is_some_and(|expected| {
        dominant == expected && dominant_pct >= params.min_percentage
    });

    let width = region.width() as i32;
    let height = region.height() as i32;
    let mut object = VisionObject::new(
        "color_0",
        ObjectKind::ColorRegion,
        Rect::new(0, 0, width, height),
        Point::new(width as f64 / 2.0, height as f64 / 2.0),
        dominant_pct / 100.0,
    );
    object.area = Some(analysis.analyzed_pixels as f64);
    object.set_property("dominant_color", json!(dominant.as_str()));
    object.set_property("color_percentages", Value::Object(rounded_map(&analysis)));
    object.set_property("hsv_mean", json!(analysis.hsv_mean));
    object.set_property(
        "expected_color",
        match params.expected_color {
            Some(expected) => json!(expected.as_str()),
            None => Value::Null,
        },
    );
    object.set_property("match", json!(matched));
    object.set_property(
        "method",
        json!(match params.method {
            ColorMethod::Histogram => "histogram",
            ColorMethod::Kmeans => "kmeans",
        }),
    );

    Ok(Detection {
        objects: vec![object],
        canvas: region.clone(),
    })
}

struct ColorAnalysis {
    // Index-aligned with DEFINITIONS, plus a trailing slot for unknown.
    percentages: [f64; 11],
    analyzed_pixels: usize,
    hsv_mean: [i64; 3],
}

fn index_name(index: usize) -> ColorName {
    if index < DEFINITIONS.len() {
        DEFINITIONS[index].name
    } else {
        ColorName::Unknown
    }
}

fn name_index(name: ColorName) -> usize {
    DEFINITIONS
        .iter()
        .position(|def| def.name == name)
        .unwrap_or(DEFINITIONS.len())
}

// First-wins argmax in table order, mirroring the dict-ordered max of the
// reference implementation.
fn dominant_index(percentages: &[f64; 11]) -> usize {
    let mut best = 0;
    for (index, &pct) in percentages.iter().enumerate() {
        if pct > percentages[best] {
            best = index;
        }
    }
    best
}

fn rounded_map(analysis: &ColorAnalysis) -> Map<String, Value> {
    let mut map = Map::new();
    for (index, &pct) in analysis.percentages.iter().enumerate() {
        let rounded = (pct * 10.0).round() / 10.0;
        if rounded > 0.0 {
            map.insert(index_name(index).as_str().to_string(), json!(rounded));
        }
    }
    map
}

fn masked_indices(mask: Option<&Image>, len: usize) -> Vec<usize> {
    match mask {
        Some(mask) => mask
            .data()
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m > 0)
            .map(|(i, _)| i)
            .collect(),
        None => (0..len).collect(),
    }
}

fn histogram_analysis(h: &[u8], s: &[u8], v: &[u8], mask: Option<&Image>) -> ColorAnalysis {
    let mut counts = [0_u64; 11];
    let mut sums = [0_u64; 3];
    let mut analyzed = 0_usize;

    // Single pass over the planes; this is the vectorized tally the
    // throughput guardrail in the benchmarks crate watches.
    match mask {
        None => {
            for ((&ph, &ps), &pv) in h.iter().zip(s).zip(v) {
                tally(&mut counts, &mut sums, ph, ps, pv);
            }
            analyzed = h.len();
        }
        Some(mask) => {
            for (index, &m) in mask.data().iter().enumerate() {
                if m > 0 {
                    tally(&mut counts, &mut sums, h[index], s[index], v[index]);
                    analyzed += 1;
                }
            }
        }
    }

    finish_analysis(counts, sums, analyzed)
}

#[inline]
fn tally(counts: &mut [u64; 11], sums: &mut [u64; 3], h: u8, s: u8, v: u8) {
    if let Some(name) = classify_hsv(h, s, v) {
        counts[name_index(name)] += 1;
    }
    sums[0] += h as u64;
    sums[1] += s as u64;
    sums[2] += v as u64;
}

fn finish_analysis(counts: [u64; 11], sums: [u64; 3], analyzed: usize) -> ColorAnalysis {
    let total = analyzed.max(1) as f64;
    let mut percentages = [0.0; 11];
    for (slot, &count) in percentages.iter_mut().zip(&counts) {
        *slot = count as f64 / total * 100.0;
    }

    ColorAnalysis {
        percentages,
        analyzed_pixels: analyzed,
        hsv_mean: [
            (sums[0] as f64 / total) as i64,
            (sums[1] as f64 / total) as i64,
            (sums[2] as f64 / total) as i64,
        ],
    }
}

fn kmeans_analysis(h: &[u8], s: &[u8], v: &[u8], mask: Option<&Image>) -> ColorAnalysis {
    let indices = masked_indices(mask, h.len());
    let pixels: Vec<[f64; 3]> = indices
        .iter()
        .map(|&i| [h[i] as f64, s[i] as f64, v[i] as f64])
        .collect();

    if pixels.is_empty() {
        return finish_analysis([0; 11], [0; 3], 0);
    }

    let k = KMEANS_CLUSTERS.min(pixels.len());
    let (centers, labels) = lloyd_kmeans(&pixels, k);

    // Aggregate cluster shares by mapped color name.
    let mut percentages = [0.0; 11];
    let mut cluster_sizes = vec![0_usize; k];
    for &label in &labels {
        cluster_sizes[label] += 1;
    }
    for (cluster, center) in centers.iter().enumerate() {
        let name = classify_hsv(
            center[0].round().clamp(0.0, 179.0) as u8,
            center[1].round().clamp(0.0, 255.0) as u8,
            center[2].round().clamp(0.0, 255.0) as u8,
        )
        .unwrap_or(ColorName::Unknown);
        percentages[name_index(name)] +=
            cluster_sizes[cluster] as f64 / pixels.len() as f64 * 100.0;
    }

    let mut sums = [0_u64; 3];
    for &index in &indices {
        sums[0] += h[index] as u64;
        sums[1] += s[index] as u64;
        sums[2] += v[index] as u64;
    }

    let mut analysis = finish_analysis([0; 11], sums, pixels.len());
    analysis.percentages = percentages;
    analysis
}

fn lloyd_kmeans(pixels: &[[f64; 3]], k: usize) -> (Vec<[f64; 3]>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(KMEANS_SEED);

    // kmeans++ seeding.
    let mut centers: Vec<[f64; 3]> = vec![pixels[rng.random_range(0..pixels.len())]];
    while centers.len() < k {
        let distances: Vec<f64> = pixels
            .iter()
            .map(|p| {
                centers
                    .iter()
                    .map(|c| squared_distance(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();
        if total <= f64::EPSILON {
            centers.push(pixels[rng.random_range(0..pixels.len())]);
            continue;
        }
        let mut pick = rng.random_range(0.0..total);
        let mut chosen = pixels.len() - 1;
        for (index, &distance) in distances.iter().enumerate() {
            if pick <= distance {
                chosen = index;
                break;
            }
            pick -= distance;
        }
        centers.push(pixels[chosen]);
    }

    let mut labels = vec![0_usize; pixels.len()];
    for _ in 0..100 {
        // Assign.
        for (label, pixel) in labels.iter_mut().zip(pixels) {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (index, center) in centers.iter().enumerate() {
                let distance = squared_distance(pixel, center);
                if distance < best_distance {
                    best_distance = distance;
                    best = index;
                }
            }
            *label = best;
        }

        // Update.
        let mut sums = vec![[0.0_f64; 3]; k];
        let mut counts = vec![0_usize; k];
        for (&label, pixel) in labels.iter().zip(pixels) {
            counts[label] += 1;
            for channel in 0..3 {
                sums[label][channel] += pixel[channel];
            }
        }

        let mut movement = 0.0;
        for (index, center) in centers.iter_mut().enumerate() {
            if counts[index] == 0 {
                continue;
            }
            let mut updated = [0.0; 3];
            for channel in 0..3 {
                updated[channel] = sums[index][channel] / counts[index] as f64;
            }
            movement += squared_distance(center, &updated);
            *center = updated;
        }

        if movement < 1e-6 {
            break;
        }
    }

    (centers, labels)
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}
