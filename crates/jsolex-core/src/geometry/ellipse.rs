use ndarray::Array2;

use crate::consts::{ELLIPSE_AXIS_RATIO_MAX, ELLIPSE_AXIS_RATIO_MIN};
use crate::frame::{Ellipse, Frame};
use crate::geometry::components::connected_components;
use crate::geometry::morphology::morphological_opening;

/// Fit the solar disk's limb to an ellipse (§4.7 step 1).
///
/// Pipeline: Sobel-style gradient magnitude -> threshold -> morphological
/// opening (cleans single-pixel noise the way the sun-edge sweep's mask
/// cleanup does) -> largest connected component -> direct least-squares
/// conic fit over that component's pixels. Returns `None` when no
/// component survives thresholding or when the fit is rejected.
pub fn fit_ellipse(frame: &Frame) -> Option<Ellipse> {
    let edges = gradient_magnitude(&frame.data);
    let mask = threshold_mask(&edges);
    let cleaned = morphological_opening(&mask);

    let components = connected_components(&cleaned);
    let largest = components.first()?;

    let points: Vec<(f64, f64)> = {
        let (h, w) = cleaned.dim();
        let mut pts = Vec::new();
        for row in 0..h {
            for col in 0..w {
                if cleaned[[row, col]] {
                    pts.push((col as f64, row as f64));
                }
            }
        }
        pts
    };
    if points.len() < 6 || largest.area < 6 {
        return None;
    }

    let ellipse = fit_conic(&points)?;
    accept(&ellipse, frame.width(), frame.height())
}

/// §4.7's acceptance test: axis ratio within `[0.5, 2.0]` and the center
/// inside the image bounds.
fn accept(ellipse: &Ellipse, width: usize, height: usize) -> Option<Ellipse> {
    let ratio = ellipse.axis_ratio();
    if !(ELLIPSE_AXIS_RATIO_MIN..=ELLIPSE_AXIS_RATIO_MAX).contains(&ratio) {
        return None;
    }
    if ellipse.center_x < 0.0
        || ellipse.center_y < 0.0
        || ellipse.center_x >= width as f64
        || ellipse.center_y >= height as f64
    {
        return None;
    }
    Some(*ellipse)
}

/// Simple Sobel-magnitude gradient with clamped borders.
fn gradient_magnitude(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    let at = |r: i64, c: i64| -> f32 {
        let rr = r.clamp(0, h as i64 - 1) as usize;
        let cc = c.clamp(0, w as i64 - 1) as usize;
        data[[rr, cc]]
    };

    for row in 0..h as i64 {
        for col in 0..w as i64 {
            let gx = (at(row - 1, col + 1) + 2.0 * at(row, col + 1) + at(row + 1, col + 1))
                - (at(row - 1, col - 1) + 2.0 * at(row, col - 1) + at(row + 1, col - 1));
            let gy = (at(row + 1, col - 1) + 2.0 * at(row + 1, col) + at(row + 1, col + 1))
                - (at(row - 1, col - 1) + 2.0 * at(row - 1, col) + at(row - 1, col + 1));
            out[[row as usize, col as usize]] = (gx * gx + gy * gy).sqrt();
        }
    }
    out
}

/// Threshold at the mean plus one standard deviation, a cheap Canny-style
/// cutoff that avoids picking a fixed absolute magnitude.
fn threshold_mask(edges: &Array2<f32>) -> Array2<bool> {
    let n = edges.len() as f32;
    let mean = edges.iter().sum::<f32>() / n.max(1.0);
    let variance = edges.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / n.max(1.0);
    let cutoff = mean + variance.sqrt();
    edges.map(|&v| v > cutoff)
}

/// Direct least-squares conic fit (`Ax^2+Bxy+Cy^2+Dx+Ey=1`, origin at the
/// point cloud's centroid for numerical stability) via Gaussian elimination
/// on the 5x5 normal-equations matrix, matching the manual-linear-algebra
/// style used for the distortion polynomial fit.
fn fit_conic(points: &[(f64, f64)]) -> Option<Ellipse> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / n;

    let rows: Vec<[f64; 5]> = points
        .iter()
        .map(|&(x, y)| {
            let x = x - cx;
            let y = y - cy;
            [x * x, x * y, y * y, x, y]
        })
        .collect();

    let mut ata = [[0.0f64; 6]; 5];
    for row in &rows {
        for i in 0..5 {
            for j in 0..5 {
                ata[i][j] += row[i] * row[j];
            }
            ata[i][5] += row[i] * 1.0;
        }
    }

    let coeffs = solve_normal_equations(ata)?;
    let [a, b, c, d, e] = coeffs;
    let f = -1.0;

    let eta = b * b - 4.0 * a * c;
    if eta >= 0.0 {
        return None; // not an ellipse (parabola/hyperbola)
    }

    let center_x = (2.0 * c * d - b * e) / eta;
    let center_y = (2.0 * a * e - b * d) / eta;

    let inner = a * e * e + c * d * d + f * b * b - b * d * e - 4.0 * a * c * f;
    let root = ((a - c).powi(2) + b * b).sqrt();
    let axis1 = (2.0 * inner * ((a + c) + root)).max(0.0).sqrt() / (-eta);
    let axis2 = (2.0 * inner * ((a + c) - root)).max(0.0).sqrt() / (-eta);
    if axis1 < 1e-6 || axis2 < 1e-6 {
        return None;
    }

    let base_theta = 0.5 * b.atan2(a - c);
    let (semi_major, semi_minor, rotation) = if axis1 >= axis2 {
        (axis1, axis2, base_theta)
    } else {
        (axis2, axis1, base_theta + std::f64::consts::FRAC_PI_2)
    };

    Some(Ellipse {
        center_x: center_x + cx,
        center_y: center_y + cy,
        semi_major,
        semi_minor,
        rotation,
    })
}

/// Gaussian elimination with partial pivoting on a 5x6 augmented matrix.
fn solve_normal_equations(mut m: [[f64; 6]; 5]) -> Option<[f64; 5]> {
    for col in 0..5 {
        let mut pivot = col;
        for row in (col + 1)..5 {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);

        let p = m[col][col];
        for k in col..6 {
            m[col][k] /= p;
        }
        for row in 0..5 {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            for k in col..6 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }
    Some([m[0][5], m[1][5], m[2][5], m[3][5], m[4][5]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ellipse_points(cx: f64, cy: f64, a: f64, b: f64, n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                (cx + a * t.cos(), cy + b * t.sin())
            })
            .collect()
    }

    #[test]
    fn recovers_axis_aligned_ellipse_parameters() {
        let points = ellipse_points(100.0, 80.0, 50.0, 30.0, 64);
        let fitted = fit_conic(&points).expect("fit should succeed");
        assert!((fitted.center_x - 100.0).abs() < 1.0);
        assert!((fitted.center_y - 80.0).abs() < 1.0);
        assert!((fitted.semi_major - 50.0).abs() < 1.0);
        assert!((fitted.semi_minor - 30.0).abs() < 1.0);
    }

    #[test]
    fn accept_rejects_extreme_axis_ratio() {
        let squashed = Ellipse {
            center_x: 50.0,
            center_y: 50.0,
            semi_major: 100.0,
            semi_minor: 10.0,
            rotation: 0.0,
        };
        assert!(accept(&squashed, 200, 200).is_none());
    }

    #[test]
    fn accept_rejects_center_outside_image() {
        let outside = Ellipse {
            center_x: 500.0,
            center_y: 50.0,
            semi_major: 40.0,
            semi_minor: 30.0,
            rotation: 0.0,
        };
        assert!(accept(&outside, 200, 200).is_none());
    }

    #[test]
    fn accept_allows_reasonable_disk() {
        let disk = Ellipse {
            center_x: 100.0,
            center_y: 100.0,
            semi_major: 80.0,
            semi_minor: 70.0,
            rotation: 0.1,
        };
        assert!(accept(&disk, 200, 200).is_some());
    }
}
