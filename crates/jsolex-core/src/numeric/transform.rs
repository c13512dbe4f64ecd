use ndarray::Array2;

use super::bilinear::bilinear_sample;

/// Exact 90-degree clockwise rotation (transpose + column reverse).
pub fn rotate_right(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut out = Array2::<f32>::zeros((w, h));
    for row in 0..h {
        for col in 0..w {
            out[[col, h - 1 - row]] = data[[row, col]];
        }
    }
    out
}

/// Exact 90-degree counter-clockwise rotation, the inverse of [`rotate_right`].
pub fn rotate_left(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut out = Array2::<f32>::zeros((w, h));
    for row in 0..h {
        for col in 0..w {
            out[[w - 1 - col, row]] = data[[row, col]];
        }
    }
    out
}

pub fn flip_horizontal(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            out[[row, w - 1 - col]] = data[[row, col]];
        }
    }
    out
}

pub fn flip_vertical(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            out[[h - 1 - row, col]] = data[[row, col]];
        }
    }
    out
}

/// Rotate an image by an arbitrary angle (radians) about its center, using
/// bilinear sampling. Pixels that sample outside the source are zero.
pub fn rotate_by_angle(data: &Array2<f32>, angle_radians: f64) -> Array2<f32> {
    let (h, w) = data.dim();
    let cy = (h as f64 - 1.0) / 2.0;
    let cx = (w as f64 - 1.0) / 2.0;
    let cos_a = angle_radians.cos();
    let sin_a = angle_radians.sin();

    let mut out = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let dy = row as f64 - cy;
            let dx = col as f64 - cx;
            // Inverse-map the destination pixel back into source space.
            let src_y = cy + dx * sin_a + dy * cos_a;
            let src_x = cx + dx * cos_a - dy * sin_a;
            out[[row, col]] = bilinear_sample(data, src_y, src_x);
        }
    }
    out
}

/// Rescale one axis by `factor` (e.g. correcting the x/y ratio of an
/// ellipse into a circle), keeping the other axis unchanged. `factor > 1`
/// stretches; `factor < 1` compresses.
pub fn rescale_vertical(data: &Array2<f32>, factor: f64) -> Array2<f32> {
    let (h, w) = data.dim();
    if factor <= 0.0 || (factor - 1.0).abs() < f64::EPSILON {
        return data.clone();
    }
    let new_h = ((h as f64) * factor).round().max(1.0) as usize;
    let mut out = Array2::<f32>::zeros((new_h, w));
    for row in 0..new_h {
        let src_y = row as f64 / factor;
        for col in 0..w {
            out[[row, col]] = bilinear_sample(data, src_y, col as f64);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_right_then_left_is_identity() {
        let data = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let roundtrip = rotate_left(&rotate_right(&data));
        assert_eq!(roundtrip, data);
    }

    #[test]
    fn double_horizontal_flip_is_identity() {
        let data = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let roundtrip = flip_horizontal(&flip_horizontal(&data));
        assert_eq!(roundtrip, data);
    }

    #[test]
    fn double_vertical_flip_is_identity() {
        let data = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let roundtrip = flip_vertical(&flip_vertical(&data));
        assert_eq!(roundtrip, data);
    }
}
