use ndarray::Array2;

/// Bilinear sample of `data` at fractional position `(y, x)`. Positions
/// outside the array contribute zero rather than being clamped, matching
/// the "leave unsampled neighbours at zero" convention used throughout the
/// converter and reconstruction stages.
pub fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let sample = |r: i64, c: i64| -> f32 {
        if r >= 0 && r < h as i64 && c >= 0 && c < w as i64 {
            data[[r as usize, c as usize]]
        } else {
            0.0
        }
    };

    let v00 = sample(y0, x0);
    let v10 = sample(y0, x1);
    let v01 = sample(y1, x0);
    let v11 = sample(y1, x1);

    v00 * (1.0 - fx) * (1.0 - fy) + v10 * fx * (1.0 - fy) + v01 * (1.0 - fx) * fy + v11 * fx * fy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_exact_grid_points() {
        let data = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(bilinear_sample(&data, 0.0, 0.0), 1.0);
        assert_eq!(bilinear_sample(&data, 0.0, 1.0), 2.0);
        assert_eq!(bilinear_sample(&data, 1.0, 0.0), 3.0);
        assert_eq!(bilinear_sample(&data, 1.0, 1.0), 4.0);
    }

    #[test]
    fn out_of_bounds_contributes_zero() {
        let data = Array2::from_elem((2, 2), 5.0);
        let sampled = bilinear_sample(&data, -1.0, 0.0);
        assert!(sampled < 5.0);
    }
}
