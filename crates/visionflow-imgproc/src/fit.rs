//! Geometric fits over point sets: convex hull, minimum-area rectangle,
//! equivalent-ellipse orientation, and principal-component orientation.

use crate::ImgprocError;

/// Minimum-area enclosing rectangle of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinAreaRect {
    /// Rectangle center.
    pub center: (f64, f64),
    /// Extents along the fitted edge direction and its normal.
    pub size: (f64, f64),
    /// Angle of the `size.0` side against the horizontal, degrees in
    /// `[-90, 90)`.
    pub angle_deg: f64,
}

/// Principal-component orientation of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcaOrientation {
    /// Angle of the principal eigenvector, degrees in `[0, 360)`.
    pub angle_deg: f64,
    /// Point-set mean.
    pub center: (f64, f64),
    /// Eigenvalue ratio `lambda1 / lambda2`; infinite for collinear sets.
    pub elongation: f64,
}

/// Fits the minimum-area enclosing rectangle via rotating calipers over the
/// convex hull.
///
/// # Errors
/// Returns [`ImgprocError::TooFewPoints`] for fewer than 3 points.
pub fn min_area_rect(points: &[[i32; 2]]) -> Result<MinAreaRect, ImgprocError> {
    if points.len() < 3 {
        return Err(ImgprocError::TooFewPoints {
            operation: "min_area_rect",
            required: 3,
            actual: points.len(),
        });
    }

    let hull = convex_hull(points);
    if hull.len() == 1 {
        return Ok(MinAreaRect {
            center: (hull[0].0, hull[0].1),
            size: (0.0, 0.0),
            angle_deg: 0.0,
        });
    }

    let mut best: Option<MinAreaRect> = None;
    let edges = if hull.len() == 2 { 1 } else { hull.len() };

    for i in 0..edges {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % hull.len()];
        let edge_len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if edge_len <= f64::EPSILON {
            continue;
        }

        // Unit edge direction and its normal.
        let ux = (x1 - x0) / edge_len;
        let uy = (y1 - y0) / edge_len;

        let mut min_u = f64::INFINITY;
        let mut max_u = f64::NEG_INFINITY;
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;

        for &(px, py) in &hull {
            let u = px * ux + py * uy;
            let v = -px * uy + py * ux;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;

        let replace = match &best {
            Some(current) => area < current.size.0 * current.size.1,
            None => true,
        };
        if replace {
            let cu = (min_u + max_u) / 2.0;
            let cv = (min_v + max_v) / 2.0;
            let center = (cu * ux - cv * uy, cu * uy + cv * ux);

            let mut angle = uy.atan2(ux).to_degrees();
            while angle >= 90.0 {
                angle -= 180.0;
            }
            while angle < -90.0 {
                angle += 180.0;
            }

            best = Some(MinAreaRect {
                center,
                size: (width, height),
                angle_deg: angle,
            });
        }
    }

    best.ok_or(ImgprocError::TooFewPoints {
        operation: "min_area_rect",
        required: 3,
        actual: points.len(),
    })
}

/// Major-axis orientation of the equivalent ellipse (second-order central
/// moments), degrees in `[0, 180)`.
///
/// # Errors
/// Returns [`ImgprocError::TooFewPoints`] for fewer than 5 points.
pub fn ellipse_orientation(points: &[[i32; 2]]) -> Result<(f64, (f64, f64)), ImgprocError> {
    if points.len() < 5 {
        return Err(ImgprocError::TooFewPoints {
            operation: "ellipse_fit",
            required: 5,
            actual: points.len(),
        });
    }

    let (mu20, mu02, mu11, center) = central_moments(points);
    let mut angle = (0.5 * (2.0 * mu11).atan2(mu20 - mu02)).to_degrees();
    if angle < 0.0 {
        angle += 180.0;
    }

    Ok((angle, center))
}

/// Principal-component orientation with elongation-based confidence input.
///
/// # Errors
/// Returns [`ImgprocError::TooFewPoints`] for fewer than 3 points.
pub fn pca_orientation(points: &[[i32; 2]]) -> Result<PcaOrientation, ImgprocError> {
    if points.len() < 3 {
        return Err(ImgprocError::TooFewPoints {
            operation: "pca",
            required: 3,
            actual: points.len(),
        });
    }

    let (mu20, mu02, mu11, center) = central_moments(points);

    // Eigen decomposition of the symmetric 2x2 covariance matrix.
    let trace = mu20 + mu02;
    let det = mu20 * mu02 - mu11 * mu11;
    let gap = (trace * trace / 4.0 - det).max(0.0).sqrt();
    let lambda1 = trace / 2.0 + gap;
    let lambda2 = trace / 2.0 - gap;

    let (vx, vy) = if mu11.abs() > f64::EPSILON {
        (mu11, lambda1 - mu20)
    } else if mu20 >= mu02 {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    let mut angle = vy.atan2(vx).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }

    let elongation = if lambda2 > f64::EPSILON {
        lambda1 / lambda2
    } else {
        f64::INFINITY
    };

    Ok(PcaOrientation {
        angle_deg: angle,
        center,
        elongation,
    })
}

fn central_moments(points: &[[i32; 2]]) -> (f64, f64, f64, (f64, f64)) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p[0] as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p[1] as f64).sum::<f64>() / n;

    let mut mu20 = 0.0;
    let mut mu02 = 0.0;
    let mut mu11 = 0.0;
    for point in points {
        let dx = point[0] as f64 - mean_x;
        let dy = point[1] as f64 - mean_y;
        mu20 += dx * dx;
        mu02 += dy * dy;
        mu11 += dx * dy;
    }

    (mu20 / n, mu02 / n, mu11 / n, (mean_x, mean_y))
}

/// Andrew monotone-chain convex hull; output is counter-clockwise without
/// repetition of the first point.
pub(crate) fn convex_hull(points: &[[i32; 2]]) -> Vec<(f64, f64)> {
    let mut sorted: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (p[0] as f64, p[1] as f64))
        .collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();

    if sorted.len() <= 2 {
        return sorted;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    if lower.is_empty() {
        // All input points collinear; keep the two extremes.
        vec![sorted[0], sorted[sorted.len() - 1]]
    } else {
        lower
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for geometric fits.

    use super::*;

    fn axis_aligned_rect_points() -> Vec<[i32; 2]> {
        let mut points = Vec::new();
        for x in 0..20 {
            points.push([x, 0]);
            points.push([x, 9]);
        }
        for y in 0..10 {
            points.push([0, y]);
            points.push([19, y]);
        }
        points
    }

    #[test]
    fn min_area_rect_recovers_axis_aligned_extent() {
        let rect = min_area_rect(&axis_aligned_rect_points()).expect("fit runs");
        let (a, b) = rect.size;
        let (long, short) = (a.max(b), a.min(b));
        assert!((long - 19.0).abs() < 1e-6);
        assert!((short - 9.0).abs() < 1e-6);
        assert!((rect.center.0 - 9.5).abs() < 1e-6);
        assert!((rect.center.1 - 4.5).abs() < 1e-6);
    }

    #[test]
    fn min_area_rect_on_diagonal_line_is_tilted() {
        let points: Vec<[i32; 2]> = (0..20).map(|i| [i, i]).collect();
        let rect = min_area_rect(&points).expect("fit runs");
        let (a, b) = rect.size;
        assert!(a.min(b) < 1e-6);
        let folded = ((rect.angle_deg % 90.0) + 90.0) % 90.0;
        assert!((folded - 45.0).abs() < 1e-6);
    }

    #[test]
    fn min_area_rect_rejects_two_points() {
        assert!(min_area_rect(&[[0, 0], [5, 5]]).is_err());
    }

    #[test]
    fn pca_on_diagonal_line_reports_45_degrees() {
        let points: Vec<[i32; 2]> = (0..50).map(|i| [i, i]).collect();
        let pca = pca_orientation(&points).expect("fit runs");
        let folded = pca.angle_deg % 180.0;
        assert!((folded - 45.0).abs() < 1e-9);
        assert!(pca.elongation.is_infinite());
    }

    #[test]
    fn pca_center_is_point_mean() {
        let points = vec![[0, 0], [10, 0], [0, 10], [10, 10]];
        let pca = pca_orientation(&points).expect("fit runs");
        assert!((pca.center.0 - 5.0).abs() < 1e-9);
        assert!((pca.center.1 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn ellipse_orientation_follows_elongated_axis() {
        // Points stretched along x.
        let mut points = Vec::new();
        for x in -20..=20 {
            points.push([x, -2]);
            points.push([x, 2]);
        }
        let (angle, center) = ellipse_orientation(&points).expect("fit runs");
        assert!(angle < 1e-6 || (angle - 180.0).abs() < 1e-6);
        assert!((center.0 - 0.0).abs() < 1e-9);
    }

    #[test]
    fn ellipse_orientation_requires_five_points() {
        assert!(ellipse_orientation(&[[0, 0], [1, 1], [2, 2], [3, 3]]).is_err());
    }
}
