use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{LUMINANCE_B, LUMINANCE_G, LUMINANCE_R, SAMPLE_MAX, SAMPLE_MIN};
use crate::frame::{ColorFrame, ColorMode, Frame};

/// Debayering (demosaicing) algorithm.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum DebayerMethod {
    /// Bilinear interpolation — the spec's required variant.
    #[default]
    Bilinear,
    /// Malvar-He-Cutler gradient-corrected — higher quality, moderate speed.
    MalvarHeCutler,
}

impl std::fmt::Display for DebayerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bilinear => write!(f, "Bilinear"),
            Self::MalvarHeCutler => write!(f, "Malvar-He-Cutler"),
        }
    }
}

/// Debayer a raw Bayer mosaic into a `ColorFrame`.
///
/// Returns `None` if `mode` is not a Bayer pattern. Per §4.2 the first/last
/// row and column are left at zero for every channel not directly sampled
/// by the sensor at that site — callers must accept zero borders.
pub fn debayer(raw: &Array2<f32>, mode: ColorMode, method: &DebayerMethod) -> Option<ColorFrame> {
    if !mode.is_bayer() {
        return None;
    }
    Some(match method {
        DebayerMethod::Bilinear => debayer_bilinear(raw, mode),
        DebayerMethod::MalvarHeCutler => debayer_mhc(raw, mode),
    })
}

/// Collapse a `ColorFrame` to a single channel using ITU-R BT.601 weights.
pub fn luminance(color: &ColorFrame) -> Frame {
    let (h, w) = color.red.data.dim();
    let mut data = Array2::<f32>::zeros((h, w));

    for row in 0..h {
        for col in 0..w {
            data[[row, col]] = LUMINANCE_R * color.red.data[[row, col]]
                + LUMINANCE_G * color.green.data[[row, col]]
                + LUMINANCE_B * color.blue.data[[row, col]];
        }
    }

    Frame::new(data)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Which color sits at position (0,0) in the 2x2 Bayer cell.
#[derive(Clone, Copy)]
#[allow(clippy::upper_case_acronyms)]
enum BayerPhase {
    RGGB,
    GRBG,
    GBRG,
    BGGR,
}

impl BayerPhase {
    fn from_color_mode(mode: ColorMode) -> Option<Self> {
        match mode {
            ColorMode::BayerRggb => Some(Self::RGGB),
            ColorMode::BayerGrbg => Some(Self::GRBG),
            ColorMode::BayerGbrg => Some(Self::GBRG),
            ColorMode::BayerBggr => Some(Self::BGGR),
            _ => None,
        }
    }

    /// Returns `(row_parity, col_parity)` of the red pixel within the 2x2 cell.
    fn red_position(self) -> (usize, usize) {
        match self {
            Self::RGGB => (0, 0),
            Self::GRBG => (0, 1),
            Self::GBRG => (1, 0),
            Self::BGGR => (1, 1),
        }
    }
}

#[inline]
fn px(raw: &Array2<f32>, row: isize, col: isize) -> f32 {
    raw[[row as usize, col as usize]]
}

// ---------------------------------------------------------------------------
// Bilinear demosaicing
// ---------------------------------------------------------------------------

fn debayer_bilinear(raw: &Array2<f32>, mode: ColorMode) -> ColorFrame {
    let phase = BayerPhase::from_color_mode(mode).expect("non-Bayer mode in debayer_bilinear");
    let (h, w) = raw.dim();
    let (r_row, r_col) = phase.red_position();

    let mut red = Array2::<f32>::zeros((h, w));
    let mut green = Array2::<f32>::zeros((h, w));
    let mut blue = Array2::<f32>::zeros((h, w));

    if h < 3 || w < 3 {
        return ColorFrame {
            red: Frame::new(red),
            green: Frame::new(green),
            blue: Frame::new(blue),
        };
    }

    // Interior only: row 0, row h-1, col 0, col w-1 stay zero-initialized.
    for row in 1..h - 1 {
        let ri = row as isize;
        let is_red_row = (row % 2) == r_row;
        for col in 1..w - 1 {
            let ci = col as isize;
            let is_red_col = (col % 2) == r_col;

            match (is_red_row, is_red_col) {
                (true, true) => {
                    red[[row, col]] = raw[[row, col]];
                    green[[row, col]] = avg_cross(raw, ri, ci);
                    blue[[row, col]] = avg_diagonal(raw, ri, ci);
                }
                (true, false) => {
                    red[[row, col]] = avg_horizontal(raw, ri, ci);
                    green[[row, col]] = raw[[row, col]];
                    blue[[row, col]] = avg_vertical(raw, ri, ci);
                }
                (false, true) => {
                    red[[row, col]] = avg_vertical(raw, ri, ci);
                    green[[row, col]] = raw[[row, col]];
                    blue[[row, col]] = avg_horizontal(raw, ri, ci);
                }
                (false, false) => {
                    red[[row, col]] = avg_diagonal(raw, ri, ci);
                    green[[row, col]] = avg_cross(raw, ri, ci);
                    blue[[row, col]] = raw[[row, col]];
                }
            }
        }
    }

    ColorFrame {
        red: Frame::new(red),
        green: Frame::new(green),
        blue: Frame::new(blue),
    }
}

/// Average of 4 cross (cardinal) neighbours. Only called on interior pixels.
#[inline]
fn avg_cross(raw: &Array2<f32>, r: isize, c: isize) -> f32 {
    (px(raw, r - 1, c) + px(raw, r + 1, c) + px(raw, r, c - 1) + px(raw, r, c + 1)) * 0.25
}

/// Average of 4 diagonal neighbours. Only called on interior pixels.
#[inline]
fn avg_diagonal(raw: &Array2<f32>, r: isize, c: isize) -> f32 {
    (px(raw, r - 1, c - 1) + px(raw, r - 1, c + 1) + px(raw, r + 1, c - 1) + px(raw, r + 1, c + 1))
        * 0.25
}

/// Average of left and right neighbours.
#[inline]
fn avg_horizontal(raw: &Array2<f32>, r: isize, c: isize) -> f32 {
    (px(raw, r, c - 1) + px(raw, r, c + 1)) * 0.5
}

/// Average of top and bottom neighbours.
#[inline]
fn avg_vertical(raw: &Array2<f32>, r: isize, c: isize) -> f32 {
    (px(raw, r - 1, c) + px(raw, r + 1, c)) * 0.5
}

// ---------------------------------------------------------------------------
// Malvar-He-Cutler (MHC) demosaicing
// ---------------------------------------------------------------------------
//
// Reference: "High-quality linear interpolation for demosaicing of
// Bayer-patterned color images" — Malvar, He, Cutler (2004). Kernels scaled
// by 2 from the paper values and divided by 16 to keep integer coefficients.

const MHC_G_AT_RB: [[i32; 5]; 5] = [
    [0, 0, -2, 0, 0],
    [0, 0, 4, 0, 0],
    [-2, 4, 8, 4, -2],
    [0, 0, 4, 0, 0],
    [0, 0, -2, 0, 0],
];

const MHC_RB_AT_G_SAME_ROW: [[i32; 5]; 5] = [
    [0, 0, 1, 0, 0],
    [0, -2, 0, -2, 0],
    [-2, 8, 10, 8, -2],
    [0, -2, 0, -2, 0],
    [0, 0, 1, 0, 0],
];

const MHC_RB_AT_G_DIFF_ROW: [[i32; 5]; 5] = [
    [0, 0, -2, 0, 0],
    [0, -2, 8, -2, 0],
    [1, 0, 10, 0, 1],
    [0, -2, 8, -2, 0],
    [0, 0, -2, 0, 0],
];

const MHC_RB_AT_BR: [[i32; 5]; 5] = [
    [0, 0, -3, 0, 0],
    [0, 4, 0, 4, 0],
    [-3, 0, 12, 0, -3],
    [0, 4, 0, 4, 0],
    [0, 0, -3, 0, 0],
];

/// Apply a 5x5 i32 kernel centred at (r,c); caller guarantees `r,c` are at
/// least 2 away from every border so no clamping is needed.
#[inline]
fn apply_kernel(raw: &Array2<f32>, r: isize, c: isize, kernel: &[[i32; 5]; 5], divisor: f32) -> f32 {
    let mut sum = 0.0_f32;
    for (kr, krow) in kernel.iter().enumerate() {
        for (kc, &kval) in krow.iter().enumerate() {
            if kval != 0 {
                sum += kval as f32 * px(raw, r + kr as isize - 2, c + kc as isize - 2);
            }
        }
    }
    (sum / divisor).clamp(SAMPLE_MIN, SAMPLE_MAX)
}

fn debayer_mhc(raw: &Array2<f32>, mode: ColorMode) -> ColorFrame {
    let phase = BayerPhase::from_color_mode(mode).expect("non-Bayer mode in debayer_mhc");
    let (h, w) = raw.dim();
    let (r_row, r_col) = phase.red_position();

    let mut red = Array2::<f32>::zeros((h, w));
    let mut green = Array2::<f32>::zeros((h, w));
    let mut blue = Array2::<f32>::zeros((h, w));

    // MHC kernels reach 2 pixels out; keep a 2-pixel margin so `apply_kernel`
    // never needs clamped indexing. Pixels inside [1, 2) fall back to the
    // bilinear estimate rather than staying zero, since only the outermost
    // ring is required to be zero by §4.2/§8.
    if h < 5 || w < 5 {
        return debayer_bilinear(raw, mode);
    }

    for row in 1..h - 1 {
        let ri = row as isize;
        let is_red_row = (row % 2) == r_row;
        let near_border = row < 2 || row >= h - 2;
        for col in 1..w - 1 {
            let ci = col as isize;
            let is_red_col = (col % 2) == r_col;

            if near_border || col < 2 || col >= w - 2 {
                match (is_red_row, is_red_col) {
                    (true, true) => {
                        red[[row, col]] = raw[[row, col]];
                        green[[row, col]] = avg_cross(raw, ri, ci);
                        blue[[row, col]] = avg_diagonal(raw, ri, ci);
                    }
                    (true, false) => {
                        red[[row, col]] = avg_horizontal(raw, ri, ci);
                        green[[row, col]] = raw[[row, col]];
                        blue[[row, col]] = avg_vertical(raw, ri, ci);
                    }
                    (false, true) => {
                        red[[row, col]] = avg_vertical(raw, ri, ci);
                        green[[row, col]] = raw[[row, col]];
                        blue[[row, col]] = avg_horizontal(raw, ri, ci);
                    }
                    (false, false) => {
                        red[[row, col]] = avg_diagonal(raw, ri, ci);
                        green[[row, col]] = avg_cross(raw, ri, ci);
                        blue[[row, col]] = raw[[row, col]];
                    }
                }
                continue;
            }

            const DIVISOR: f32 = 16.0;
            match (is_red_row, is_red_col) {
                (true, true) => {
                    red[[row, col]] = raw[[row, col]];
                    green[[row, col]] = apply_kernel(raw, ri, ci, &MHC_G_AT_RB, DIVISOR);
                    blue[[row, col]] = apply_kernel(raw, ri, ci, &MHC_RB_AT_BR, DIVISOR);
                }
                (true, false) => {
                    red[[row, col]] = apply_kernel(raw, ri, ci, &MHC_RB_AT_G_SAME_ROW, DIVISOR);
                    green[[row, col]] = raw[[row, col]];
                    blue[[row, col]] = apply_kernel(raw, ri, ci, &MHC_RB_AT_G_DIFF_ROW, DIVISOR);
                }
                (false, true) => {
                    red[[row, col]] = apply_kernel(raw, ri, ci, &MHC_RB_AT_G_DIFF_ROW, DIVISOR);
                    green[[row, col]] = raw[[row, col]];
                    blue[[row, col]] = apply_kernel(raw, ri, ci, &MHC_RB_AT_G_SAME_ROW, DIVISOR);
                }
                (false, false) => {
                    red[[row, col]] = apply_kernel(raw, ri, ci, &MHC_RB_AT_BR, DIVISOR);
                    green[[row, col]] = apply_kernel(raw, ri, ci, &MHC_G_AT_RB, DIVISOR);
                    blue[[row, col]] = raw[[row, col]];
                }
            }
        }
    }

    ColorFrame {
        red: Frame::new(red),
        green: Frame::new(green),
        blue: Frame::new(blue),
    }
}
