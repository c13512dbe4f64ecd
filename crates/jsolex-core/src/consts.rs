/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// B3 spline 1D kernel coefficients: [1, 4, 6, 4, 1] / 16.
pub const B3_KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Hard invariant: every reconstructed sample lives in this range (§3).
pub const SAMPLE_MIN: f32 = 0.0;
pub const SAMPLE_MAX: f32 = 65_535.0;

/// Edge-detector pad applied to the detected sweep range on each side (§4.3).
pub const EDGE_DETECTION_PAD: i64 = 40;

/// Default magnitude ceiling above which a column's absorption-line search
/// gives up (§4.4) — pixel values this bright are not part of the line.
pub const DEFAULT_LINE_MAGNITUDE_CEILING: f32 = 5000.0;

/// Starting relative threshold for line detection, as a fraction of the
/// column's dynamic range (§4.4).
pub const DEFAULT_LINE_DETECTION_THRESHOLD: f64 = 0.2;

/// Per-retry increment applied to the detection threshold on fit failure.
pub const LINE_THRESHOLD_STEP: f64 = 0.10;

/// Upper bound on the detection threshold before giving up (§4.4).
pub const LINE_THRESHOLD_MAX: f64 = 1.0;

/// Residual variance tolerance accepted for the parabolic fit (§4.4).
pub const POLYNOMIAL_RESIDUAL_TOLERANCE: f64 = 4.0;

/// Accepted semi-axis ratio range (b/a) for an ellipse fit to be trusted (§4.7).
pub const ELLIPSE_AXIS_RATIO_MIN: f64 = 0.5;
pub const ELLIPSE_AXIS_RATIO_MAX: f64 = 2.0;

/// ITU-R BT.601 luminance weights, used to collapse an RGB/debayered frame
/// into the single-channel float frame the analyzer and reconstruction
/// engine operate on (§4.2).
pub const LUMINANCE_R: f32 = 0.299;
pub const LUMINANCE_G: f32 = 0.587;
pub const LUMINANCE_B: f32 = 0.114;

/// Default row-window width for the banding corrector's moving average (§4.6).
pub const DEFAULT_BANDING_WIDTH: usize = 25;
pub const DEFAULT_BANDING_PASSES: usize = 3;

/// Default continuum shift sampled for off-line background (glossary).
pub const DEFAULT_CONTINUUM_SHIFT: f64 = 15.0;

/// Default per-frame brightness floor subtracted before summing a frame's
/// edge-detection magnitude (§4.3). Sensor bias this low never belongs to
/// the sun-edge sweep signal.
pub const DEFAULT_EDGE_MAGNITUDE_FLOOR: f32 = 1_000.0;

/// Default fraction of the peak per-frame magnitude a frame must reach to
/// be considered part of the sun's sweep across the slit (§4.3).
pub const DEFAULT_EDGE_RELATIVE_THRESHOLD: f64 = 0.2;
