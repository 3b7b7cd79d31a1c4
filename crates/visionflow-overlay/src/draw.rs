//! Pixel-level drawing primitives over RGB buffers.

use visionflow_core::{Image, PixelFormat};

use crate::font;

/// RGB drawing color.
pub type Rgb = [u8; 3];

/// Success / primary annotation color.
pub const GREEN: Rgb = [0, 255, 0];
/// Failure annotation color.
pub const RED: Rgb = [255, 0, 0];
/// Bounding-box accent color.
pub const BLUE: Rgb = [0, 0, 255];
/// Secondary contour color.
pub const YELLOW: Rgb = [255, 255, 0];
/// Mask/contour accent color.
pub const CYAN: Rgb = [0, 255, 255];
/// Banner text color.
pub const WHITE: Rgb = [255, 255, 255];
/// Rotation arrow color.
pub const ORANGE: Rgb = [255, 165, 0];

/// Sets one pixel, ignoring out-of-bounds coordinates.
pub fn put_pixel(canvas: &mut Image, x: i32, y: i32, color: Rgb) {
    debug_assert_eq!(canvas.format(), PixelFormat::Rgb);
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    let offset = canvas.pixel_offset(x as u32, y as u32);
    canvas.data_mut()[offset..offset + 3].copy_from_slice(&color);
}

/// Axis-aligned rectangle outline with the given stroke thickness.
pub fn draw_rect(canvas: &mut Image, x: i32, y: i32, width: i32, height: i32, color: Rgb, thickness: i32) {
    for t in 0..thickness {
        let (left, top) = (x + t, y + t);
        let (right, bottom) = (x + width - 1 - t, y + height - 1 - t);
        if right < left || bottom < top {
            break;
        }
        for px in left..=right {
            put_pixel(canvas, px, top, color);
            put_pixel(canvas, px, bottom, color);
        }
        for py in top..=bottom {
            put_pixel(canvas, left, py, color);
            put_pixel(canvas, right, py, color);
        }
    }
}

/// Bresenham line with square-brush thickness.
pub fn draw_line(canvas: &mut Image, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb, thickness: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    let half = thickness / 2;

    loop {
        for oy in -half..=half {
            for ox in -half..=half {
                put_pixel(canvas, x + ox, y + oy, color);
            }
        }
        if x == x1 && y == y1 {
            break;
        }
        let doubled = 2 * err;
        if doubled >= dy {
            err += dy;
            x += sx;
        }
        if doubled <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Closed or open polyline through integer points.
pub fn draw_polyline(canvas: &mut Image, points: &[[i32; 2]], closed: bool, color: Rgb, thickness: i32) {
    if points.len() < 2 {
        if let Some(point) = points.first() {
            put_pixel(canvas, point[0], point[1], color);
        }
        return;
    }

    for pair in points.windows(2) {
        draw_line(canvas, pair[0][0], pair[0][1], pair[1][0], pair[1][1], color, thickness);
    }
    if closed {
        let first = points[0];
        let last = points[points.len() - 1];
        draw_line(canvas, last[0], last[1], first[0], first[1], color, thickness);
    }
}

/// Filled polygon via even-odd scanline filling.
pub fn draw_filled_polygon(canvas: &mut Image, points: &[[i32; 2]], color: Rgb) {
    if points.len() < 3 {
        return;
    }

    let min_y = points.iter().map(|p| p[1]).min().unwrap_or(0).max(0);
    let max_y = points
        .iter()
        .map(|p| p[1])
        .max()
        .unwrap_or(0)
        .min(canvas.height() as i32 - 1);

    for y in min_y..=max_y {
        let mut crossings = Vec::new();
        for i in 0..points.len() {
            let [x0, y0] = points[i];
            let [x1, y1] = points[(i + 1) % points.len()];
            if (y0 <= y && y < y1) || (y1 <= y && y < y0) {
                let t = (y - y0) as f64 / (y1 - y0) as f64;
                crossings.push(x0 as f64 + t * (x1 - x0) as f64);
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        for pair in crossings.chunks_exact(2) {
            let start = pair[0].ceil() as i32;
            let end = pair[1].floor() as i32;
            for x in start..=end {
                put_pixel(canvas, x, y, color);
            }
        }
    }
}

/// Filled circle.
pub fn draw_circle(canvas: &mut Image, cx: i32, cy: i32, radius: i32, color: Rgb) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(canvas, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Arrowed line whose head length is a fraction of the shaft.
pub fn draw_arrow(
    canvas: &mut Image,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    color: Rgb,
    thickness: i32,
    tip_fraction: f64,
) {
    draw_line(canvas, x0, y0, x1, y1, color, thickness);

    let dx = (x1 - x0) as f64;
    let dy = (y1 - y0) as f64;
    let length = (dx * dx + dy * dy).sqrt();
    if length < 1.0 {
        return;
    }

    let tip = length * tip_fraction;
    let angle = dy.atan2(dx);
    for side in [-1.0, 1.0] {
        let branch = angle + std::f64::consts::PI - side * 0.5;
        let bx = x1 + (tip * branch.cos()) as i32;
        let by = y1 + (tip * branch.sin()) as i32;
        draw_line(canvas, x1, y1, bx, by, color, thickness);
    }
}

/// Draws text at an integer scale; `(x, y)` is the text baseline's
/// top-left corner. An optional filled background improves contrast on
/// busy frames.
pub fn draw_text(
    canvas: &mut Image,
    text: &str,
    x: i32,
    y: i32,
    color: Rgb,
    scale: u32,
    background: Option<Rgb>,
) {
    let scale = scale.max(1);

    if let Some(fill) = background {
        let width = font::text_width(text, scale) as i32;
        let height = (font::GLYPH_HEIGHT * scale) as i32;
        for py in y - 1..y + height + 1 {
            for px in x - 1..x + width + 1 {
                put_pixel(canvas, px, py, fill);
            }
        }
    }

    let mut cursor = x;
    for character in text.chars() {
        let glyph = font::glyph(character);
        for (column, bits) in glyph.iter().enumerate() {
            for row in 0..font::GLYPH_HEIGHT {
                if bits & (1 << row) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        put_pixel(
                            canvas,
                            cursor + (column as u32 * scale + sx) as i32,
                            y + (row * scale + sy) as i32,
                            color,
                        );
                    }
                }
            }
        }
        cursor += (font::GLYPH_ADVANCE * scale) as i32;
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the drawing primitives.

    use super::*;

    fn canvas(side: u32) -> Image {
        Image::filled(side, side, PixelFormat::Rgb, 0).expect("canvas builds")
    }

    fn pixel(canvas: &Image, x: u32, y: u32) -> Rgb {
        let offset = canvas.pixel_offset(x, y);
        [
            canvas.data()[offset],
            canvas.data()[offset + 1],
            canvas.data()[offset + 2],
        ]
    }

    #[test]
    fn rect_outline_leaves_interior_untouched() {
        let mut image = canvas(20);
        draw_rect(&mut image, 2, 2, 10, 10, GREEN, 1);
        assert_eq!(pixel(&image, 2, 2), GREEN);
        assert_eq!(pixel(&image, 11, 11), GREEN);
        assert_eq!(pixel(&image, 6, 6), [0, 0, 0]);
    }

    #[test]
    fn out_of_bounds_drawing_is_ignored() {
        let mut image = canvas(8);
        draw_rect(&mut image, -5, -5, 30, 30, RED, 2);
        draw_circle(&mut image, 20, 20, 4, RED);
        // No panic and the buffer stays the right size.
        assert_eq!(image.byte_cost(), 8 * 8 * 3);
    }

    #[test]
    fn line_connects_endpoints() {
        let mut image = canvas(16);
        draw_line(&mut image, 0, 0, 15, 15, CYAN, 1);
        assert_eq!(pixel(&image, 0, 0), CYAN);
        assert_eq!(pixel(&image, 15, 15), CYAN);
        assert_eq!(pixel(&image, 8, 8), CYAN);
    }

    #[test]
    fn filled_polygon_covers_interior() {
        let mut image = canvas(20);
        draw_filled_polygon(&mut image, &[[2, 2], [17, 2], [17, 17], [2, 17]], YELLOW);
        assert_eq!(pixel(&image, 10, 10), YELLOW);
        assert_eq!(pixel(&image, 0, 0), [0, 0, 0]);
    }

    #[test]
    fn text_marks_pixels_and_background_fills() {
        let mut image = canvas(40);
        draw_text(&mut image, "OK", 4, 4, WHITE, 1, Some(BLUE));

        let lit = image
            .data()
            .chunks_exact(3)
            .filter(|p| *p == WHITE)
            .count();
        assert!(lit > 0, "glyphs should set pixels");
        assert_eq!(pixel(&image, 3, 3), BLUE);
    }

    #[test]
    fn arrow_draws_head_near_tip() {
        let mut image = canvas(32);
        draw_arrow(&mut image, 4, 16, 28, 16, ORANGE, 1, 0.3);
        assert_eq!(pixel(&image, 28, 16), ORANGE);
        // Head branches leave the shaft row.
        let above_shaft = (0..16)
            .flat_map(|y| (0..32).map(move |x| (x, y)))
            .filter(|&(x, y)| pixel(&image, x, y) == ORANGE)
            .count();
        assert!(above_shaft > 0);
    }
}
