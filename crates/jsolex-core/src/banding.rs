use crate::consts::{DEFAULT_BANDING_PASSES, DEFAULT_BANDING_WIDTH, SAMPLE_MAX, SAMPLE_MIN};
use crate::frame::{Ellipse, Frame};
use crate::numeric::gaussian::moving_average;

/// Row-wise de-banding (§4.6): for each row, average the pixels outside the
/// solar disk (or the whole row when no ellipse is known), smooth that
/// per-row offset with a moving average over `band_width` rows to isolate
/// the low-frequency background trend, and subtract the *residual* — the
/// gap between the row's own background mean and that smoothed trend —
/// from every pixel in the row. Repeated `passes` times; operates in-place.
///
/// The moving average is the background's slowly-varying component, not
/// the stripe artifact itself; subtracting the smoothed value directly
/// would remove the background and leave the row-to-row stripes in place.
/// Subtracting `row_means[row] - smoothed[row]` removes exactly the
/// high-frequency deviation a row's background has from its neighbors.
///
/// Adapted from the separable-convolution style of [`crate::numeric::gaussian`]
/// but collapsed to one dimension: banding is a row artifact, not a 2D blur.
pub fn correct_banding(image: &mut Frame, ellipse: Option<&Ellipse>, band_width: usize, passes: usize) {
    let (h, w) = image.data.dim();
    if h == 0 || w == 0 {
        return;
    }

    for _ in 0..passes.max(1) {
        let row_means: Vec<f32> = (0..h)
            .map(|row| row_background_mean(image, row, w, ellipse))
            .collect();
        let smoothed = moving_average(&row_means, band_width);

        for row in 0..h {
            let offset = row_means[row] - smoothed[row];
            for col in 0..w {
                let corrected = (image.data[[row, col]] - offset).clamp(SAMPLE_MIN, SAMPLE_MAX);
                image.data[[row, col]] = corrected;
            }
        }
    }
}

pub fn correct_banding_default(image: &mut Frame, ellipse: Option<&Ellipse>) {
    correct_banding(image, ellipse, DEFAULT_BANDING_WIDTH, DEFAULT_BANDING_PASSES);
}

fn row_background_mean(image: &Frame, row: usize, width: usize, ellipse: Option<&Ellipse>) -> f32 {
    let Some(e) = ellipse else {
        let sum: f32 = (0..width).map(|col| image.data[[row, col]]).sum();
        return sum / width as f32;
    };

    let mut sum = 0.0f32;
    let mut count = 0u32;
    for col in 0..width {
        let dx = (col as f64 - e.center_x) / e.semi_major.max(1e-6);
        let dy = (row as f64 - e.center_y) / e.semi_minor.max(1e-6);
        if dx * dx + dy * dy > 1.0 {
            sum += image.data[[row, col]];
            count += 1;
        }
    }
    if count == 0 {
        let sum: f32 = (0..width).map(|col| image.data[[row, col]]).sum();
        sum / width as f32
    } else {
        sum / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn flattens_a_uniform_row_offset() {
        let mut data = Array2::<f32>::zeros((20, 10));
        for row in 0..20 {
            let band = if row % 2 == 0 { 200.0 } else { 0.0 };
            for col in 0..10 {
                data[[row, col]] = 500.0 + band;
            }
        }
        let mut frame = Frame::new(data);
        let before_variance = row_variance(&frame);
        correct_banding(&mut frame, None, 5, 3);
        let after_variance = row_variance(&frame);
        assert!(after_variance < before_variance);
    }

    /// Distinguishes the actual alternating stripe artifact from the
    /// background it rides on: a pass that only strips the smoothed
    /// background (bug) leaves the even/odd row gap at its full original
    /// size, while correctly subtracting the residual collapses it toward
    /// zero pass over pass.
    #[test]
    fn removes_the_alternating_stripe() {
        let (h, w) = (40, 10);
        let mut data = Array2::<f32>::zeros((h, w));
        for row in 0..h {
            let stripe = if row % 2 == 0 { 200.0 } else { 0.0 };
            for col in 0..w {
                data[[row, col]] = 500.0 + stripe;
            }
        }
        let mut frame = Frame::new(data);
        correct_banding(&mut frame, None, 9, 4);

        let means: Vec<f32> = (0..h)
            .map(|row| (0..w).map(|col| frame.data[[row, col]]).sum::<f32>() / w as f32)
            .collect();
        let mut max_adjacent_gap = 0.0f32;
        for row in 0..h - 1 {
            max_adjacent_gap = max_adjacent_gap.max((means[row] - means[row + 1]).abs());
        }
        // The buggy version (subtracting `smoothed` instead of the residual)
        // leaves the original ~200 gap essentially untouched; the fix drives
        // it down geometrically (~1/9 per pass over a window this size).
        assert!(max_adjacent_gap < 5.0, "stripe not removed: max adjacent gap {max_adjacent_gap}");
    }

    #[test]
    fn empty_frame_is_a_no_op() {
        let mut frame = Frame::zeros(0, 0);
        correct_banding(&mut frame, None, 25, 3);
        assert_eq!(frame.height(), 0);
    }

    fn row_variance(frame: &Frame) -> f32 {
        let (h, w) = frame.data.dim();
        let means: Vec<f32> = (0..h)
            .map(|row| (0..w).map(|col| frame.data[[row, col]]).sum::<f32>() / w as f32)
            .collect();
        let mean_of_means = means.iter().sum::<f32>() / h as f32;
        means.iter().map(|m| (m - mean_of_means).powi(2)).sum::<f32>() / h as f32
    }
}
