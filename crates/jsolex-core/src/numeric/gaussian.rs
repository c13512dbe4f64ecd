use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Build a normalized 1D Gaussian kernel with radius `ceil(3*sigma)`.
pub fn make_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil().max(1.0) as usize;
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f32; size];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        *k = (-x * x / s2).exp();
        sum += *k;
    }
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Separable Gaussian blur (rows then columns), clamped border handling.
pub fn blur(data: &Array2<f32>, sigma: f32) -> Array2<f32> {
    let kernel = make_kernel(sigma);
    let rows = convolve_rows_clamped(data, &kernel);
    convolve_cols_clamped(&rows, &kernel)
}

pub fn convolve_rows_clamped(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;

    let compute_row = |row: usize| -> Vec<f32> {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let src_col =
                        (col as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                    sum += data[[row, src_col]] * kv;
                }
                sum
            })
            .collect()
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(compute_row).collect()
    } else {
        (0..h).map(compute_row).collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            result[[row, col]] = val;
        }
    }
    result
}

pub fn convolve_cols_clamped(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;

    let compute_row = |row: usize| -> Vec<f32> {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let src_row =
                        (row as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                    sum += data[[src_row, col]] * kv;
                }
                sum
            })
            .collect()
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(compute_row).collect()
    } else {
        (0..h).map(compute_row).collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            result[[row, col]] = val;
        }
    }
    result
}

/// 1D moving average with clamped borders, used by the banding corrector (§4.6).
pub fn moving_average(values: &[f32], window: usize) -> Vec<f32> {
    if values.is_empty() || window <= 1 {
        return values.to_vec();
    }
    let radius = window / 2;
    let n = values.len() as isize;
    (0..values.len())
        .map(|i| {
            let lo = (i as isize - radius as isize).max(0);
            let hi = (i as isize + radius as isize).min(n - 1);
            let count = (hi - lo + 1) as f32;
            let sum: f32 = values[lo as usize..=hi as usize].iter().sum();
            sum / count
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalized() {
        let kernel = make_kernel(1.5);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn blur_of_uniform_image_is_unchanged() {
        let data = Array2::<f32>::from_elem((10, 10), 42.0);
        let blurred = blur(&data, 1.0);
        for &v in blurred.iter() {
            assert!((v - 42.0).abs() < 1e-3);
        }
    }

    #[test]
    fn moving_average_smooths_spike() {
        let mut values = vec![0.0f32; 11];
        values[5] = 11.0;
        let smoothed = moving_average(&values, 5);
        assert!(smoothed[5] < values[5]);
        assert!(smoothed[5] > 0.0);
    }
}
