use tracing::{debug, warn};

use crate::consts::{
    DEFAULT_LINE_DETECTION_THRESHOLD, DEFAULT_LINE_MAGNITUDE_CEILING, LINE_THRESHOLD_MAX,
    LINE_THRESHOLD_STEP, POLYNOMIAL_RESIDUAL_TOLERANCE,
};
use crate::error::{JSolexError, Result};
use crate::frame::{DistortionPolynomial, Frame};
use crate::numeric::parabola::{fit_degree2, refine_peak, residual_variance};

/// Locate the spectral line's sub-pixel center in a single column.
///
/// The column's dynamic range defines a relative cutoff (`threshold` as a
/// fraction of `max - min`); among pixels at or below that cutoff and below
/// `ceiling`, the darkest contiguous run is taken as the absorption line and
/// its minimum is refined to sub-pixel precision by a 3-point parabolic fit.
fn find_column_center(column: &[f32], threshold: f64, ceiling: f32) -> Option<f64> {
    let height = column.len();
    if height < 3 {
        return None;
    }

    let min = column.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = column.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !(max > min) {
        return None;
    }
    let cutoff = min + (threshold as f32) * (max - min);

    let mut best_run: Option<(usize, usize, f32)> = None; // (start, end_inclusive, avg)
    let mut run_start: Option<usize> = None;

    let mut close_run = |start: usize, end: usize, best_run: &mut Option<(usize, usize, f32)>| {
        let avg: f32 = column[start..=end].iter().sum::<f32>() / (end - start + 1) as f32;
        if best_run.map(|(_, _, a)| avg < a).unwrap_or(true) {
            *best_run = Some((start, end, avg));
        }
    };

    for (y, &v) in column.iter().enumerate() {
        let candidate = v <= cutoff && v < ceiling;
        match (candidate, run_start) {
            (true, None) => run_start = Some(y),
            (false, Some(s)) => {
                close_run(s, y - 1, &mut best_run);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = run_start {
        close_run(s, height - 1, &mut best_run);
    }

    let (start, end, _) = best_run?;
    let local_min = (start..=end).min_by(|&a, &b| {
        column[a].partial_cmp(&column[b]).unwrap_or(std::cmp::Ordering::Equal)
    })?;

    if local_min == 0 || local_min == height - 1 {
        return Some(local_min as f64);
    }

    let offset = refine_peak(
        column[local_min - 1] as f64,
        column[local_min] as f64,
        column[local_min + 1] as f64,
    );
    Some(local_min as f64 + offset)
}

/// Fit the distortion polynomial `y = a*x^2 + b*x + c` over the average
/// image's column-wise absorption-line centers (§4.4), escalating the
/// detection threshold by [`LINE_THRESHOLD_STEP`] on each failed attempt up
/// to [`LINE_THRESHOLD_MAX`].
pub fn analyze(average: &Frame) -> Result<DistortionPolynomial> {
    analyze_with_ceiling(average, DEFAULT_LINE_MAGNITUDE_CEILING)
}

pub fn analyze_with_ceiling(average: &Frame, ceiling: f32) -> Result<DistortionPolynomial> {
    let (height, width) = average.data.dim();
    let mut threshold = DEFAULT_LINE_DETECTION_THRESHOLD;

    loop {
        let mut points = Vec::with_capacity(width);
        for x in 0..width {
            let column: Vec<f32> = (0..height).map(|y| average.data[[y, x]]).collect();
            if let Some(y) = find_column_center(&column, threshold, ceiling) {
                points.push((x as f64, y));
            }
        }

        if let Some((a, b, c)) = fit_degree2(&points) {
            let variance = residual_variance(&points, (a, b, c));
            debug!(threshold, columns = points.len(), variance, "polynomial fit attempt");
            if variance <= POLYNOMIAL_RESIDUAL_TOLERANCE {
                return Ok(DistortionPolynomial { a, b, c });
            }
        }

        threshold += LINE_THRESHOLD_STEP;
        if threshold > LINE_THRESHOLD_MAX {
            warn!(threshold, "spectral line not found after threshold escalation");
            return Err(JSolexError::SpectralLineNotFound(format!(
                "no polynomial fit within residual tolerance up to threshold {LINE_THRESHOLD_MAX}"
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Every frame has its darkest pixel in the center row; the fit should
    /// recover a≈0, b≈0, c≈center_row.
    #[test]
    fn recovers_flat_line_at_known_row() {
        let width = 32;
        let height = 32;
        let center = 15.0f32;
        let mut data = Array2::<f32>::from_elem((height, width), 40_000.0);
        for x in 0..width {
            data[[center as usize, x]] = 100.0;
            data[[center as usize - 1, x]] = 20_000.0;
            data[[center as usize + 1, x]] = 20_000.0;
        }
        let average = Frame::new(data);
        let poly = analyze(&average).unwrap();
        assert!(poly.a.abs() < 0.05);
        assert!(poly.b.abs() < 0.05);
        assert!((poly.c - center as f64).abs() < 0.5);
    }

    #[test]
    fn empty_image_fails_to_find_line() {
        let average = Frame::zeros(2, 2);
        assert!(matches!(analyze(&average), Err(JSolexError::SpectralLineNotFound(_))));
    }
}
