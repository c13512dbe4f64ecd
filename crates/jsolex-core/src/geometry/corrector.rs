use ndarray::Array2;

use crate::frame::{Ellipse, Frame, ImageStats};
use crate::geometry::ellipse::fit_ellipse;
use crate::numeric::transform::{flip_horizontal, flip_vertical, rescale_vertical, rotate_by_angle};

/// User-forced overrides for the geometry corrector (§4.7: "or user-forced
/// tilt", "or uses user-forced ratio"), plus the optional mirror flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrectionParams {
    pub forced_tilt: Option<f64>,
    pub forced_xy_ratio: Option<f64>,
    pub horizontal_mirror: bool,
    pub vertical_mirror: bool,
}

/// Result of geometry correction: the corrected image, the (corrected,
/// circularized) ellipse when a fit was available, the *raw* fitted ellipse
/// that actually drove the tilt/rescale (pre-circularization — real
/// `rotation` and `semi_major >= semi_minor`), the estimated blackpoint,
/// and the residual fit error.
#[derive(Clone, Debug)]
pub struct CorrectionResult {
    pub image: Frame,
    pub ellipse: Option<Ellipse>,
    pub raw_ellipse: Option<Ellipse>,
    pub black_point: f32,
    pub residual_error: f64,
}

/// Fit, tilt-correct, rescale and flip a reconstructed image (§4.7).
///
/// When the ellipse fit fails, correction continues uncorrected (no
/// rotation/rescale) with only the requested flips applied, an ellipse-less
/// result, and a blackpoint taken over the whole image — the caller is
/// expected to log a user suggestion for the failed fit (§4.9's failure
/// semantics table), which is outside this function's responsibility.
pub fn correct(image: &Frame, params: &CorrectionParams) -> CorrectionResult {
    let fitted = fit_ellipse(image);

    let tilt = params
        .forced_tilt
        .or_else(|| fitted.map(|e| e.rotation))
        .unwrap_or(0.0);
    let rotated = if tilt.abs() > f64::EPSILON {
        rotate_by_angle(&image.data, tilt)
    } else {
        image.data.clone()
    };

    let xy_ratio = params
        .forced_xy_ratio
        .or_else(|| fitted.map(|e| e.semi_major / e.semi_minor.max(1e-6)));
    let rescaled = match xy_ratio {
        Some(ratio) if (ratio - 1.0).abs() > f64::EPSILON => rescale_vertical(&rotated, ratio),
        _ => rotated,
    };

    let mut final_data = rescaled;
    if params.horizontal_mirror {
        final_data = flip_horizontal(&final_data);
    }
    if params.vertical_mirror {
        final_data = flip_vertical(&final_data);
    }

    let corrected_ellipse = fitted.map(|e| Ellipse {
        center_x: e.center_x,
        center_y: e.center_y,
        semi_major: e.semi_major.max(e.semi_minor),
        semi_minor: e.semi_major.max(e.semi_minor),
        rotation: 0.0,
    });

    let black_point = estimate_black_point(&final_data, corrected_ellipse.as_ref());
    let residual_error = fitted
        .map(|e| residual_fit_error(image, &e))
        .unwrap_or(f64::NAN);

    CorrectionResult {
        image: Frame::new(final_data),
        ellipse: corrected_ellipse,
        raw_ellipse: fitted,
        black_point,
        residual_error,
    }
}

/// Apply a tilt/rescale/flip transform already derived from a previously
/// fitted ellipse (e.g. a different shift's reconstruction) instead of
/// running the fit again. The pipeline uses this to keep every emitted
/// shift's geometry consistent with the shift that drove the fit (§4.7),
/// rather than re-fitting per shift.
///
/// `ellipse` must be the *raw* fitted ellipse (real `rotation` and
/// `semi_major`/`semi_minor`), not the circularized ellipse [`correct`]
/// returns in [`CorrectionResult::ellipse`] — that one has `rotation = 0`
/// and `semi_major == semi_minor` by construction, which would silently
/// turn this into a no-op tilt/rescale.
pub fn apply_known_correction(image: &Frame, ellipse: &Ellipse, params: &CorrectionParams) -> Frame {
    let tilt = params.forced_tilt.unwrap_or(ellipse.rotation);
    let rotated = if tilt.abs() > f64::EPSILON {
        rotate_by_angle(&image.data, tilt)
    } else {
        image.data.clone()
    };

    let xy_ratio = params
        .forced_xy_ratio
        .unwrap_or(ellipse.semi_major / ellipse.semi_minor.max(1e-6));
    let rescaled = if (xy_ratio - 1.0).abs() > f64::EPSILON {
        rescale_vertical(&rotated, xy_ratio)
    } else {
        rotated
    };

    let mut final_data = rescaled;
    if params.horizontal_mirror {
        final_data = flip_horizontal(&final_data);
    }
    if params.vertical_mirror {
        final_data = flip_vertical(&final_data);
    }
    Frame::new(final_data)
}

/// Median of the pixels lying outside the solar disk, or the median of the
/// whole frame when no ellipse is known (§4.7).
fn estimate_black_point(data: &Array2<f32>, ellipse: Option<&Ellipse>) -> f32 {
    let (h, w) = data.dim();
    let background: Vec<f32> = match ellipse {
        Some(e) => (0..h)
            .flat_map(|row| (0..w).map(move |col| (row, col)))
            .filter(|&(row, col)| !inside_ellipse(e, row as f64, col as f64))
            .map(|(row, col)| data[[row, col]])
            .collect(),
        None => data.iter().copied().collect(),
    };
    if background.is_empty() {
        return 0.0;
    }
    let as_array = Array2::from_shape_vec((1, background.len()), background).unwrap();
    ImageStats::compute(&as_array).median
}

fn inside_ellipse(e: &Ellipse, row: f64, col: f64) -> bool {
    let dx = (col - e.center_x) / e.semi_major.max(1e-6);
    let dy = (row - e.center_y) / e.semi_minor.max(1e-6);
    dx * dx + dy * dy <= 1.0
}

/// Mean squared distance of the fitted ellipse's implicit boundary value
/// from zero, evaluated at the original fit's own center/axes — a cheap
/// proxy for how tightly the conic matches a perfect ellipse, reported
/// alongside the fit for diagnostics (§4.7 "residual error").
fn residual_fit_error(image: &Frame, ellipse: &Ellipse) -> f64 {
    let (h, w) = image.data.dim();
    if h == 0 || w == 0 {
        return 0.0;
    }
    let mut sum_sq = 0.0;
    let mut count = 0.0;
    for row in (0..h).step_by((h / 32).max(1)) {
        for col in (0..w).step_by((w / 32).max(1)) {
            let dx = (col as f64 - ellipse.center_x) / ellipse.semi_major.max(1e-6);
            let dy = (row as f64 - ellipse.center_y) / ellipse.semi_minor.max(1e-6);
            let r = dx * dx + dy * dy;
            // Penalize samples near the nominal boundary that deviate from r=1.
            if (0.8..=1.2).contains(&r) {
                sum_sq += (r - 1.0).powi(2);
                count += 1.0;
            }
        }
    }
    if count == 0.0 {
        0.0
    } else {
        sum_sq / count
    }
}
