use std::collections::HashMap;
use std::path::PathBuf;

use ndarray::Array2;

use crate::consts::{SAMPLE_MAX, SAMPLE_MIN};

/// Color/Bayer mode of the source data (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColorMode {
    Mono,
    Rgb,
    BayerRggb,
    BayerBggr,
    BayerGbrg,
    BayerGrbg,
}

impl ColorMode {
    pub fn is_bayer(self) -> bool {
        matches!(
            self,
            ColorMode::BayerRggb | ColorMode::BayerBggr | ColorMode::BayerGbrg | ColorMode::BayerGrbg
        )
    }
}

/// Raw-frame geometry: how to interpret the opaque bytes of one SER frame (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
    pub bytes_per_pixel: usize,
    pub color_mode: ColorMode,
}

impl Geometry {
    pub fn frame_byte_size(&self) -> usize {
        self.width
            .checked_mul(self.height)
            .and_then(|px| px.checked_mul(self.bytes_per_pixel))
            .expect("frame byte size overflow")
    }
}

/// Opaque raw bytes for a single SER frame, immutable once read (§3).
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub index: usize,
    pub geometry: Geometry,
    pub bytes: Vec<u8>,
}

/// A single-channel floating-point image.
///
/// Pixel values are f32 in `[0.0, 65535.0]` — the hard range invariant every
/// reconstructed sample satisfies (§3). `Frame` is also the result of the
/// Bayer/mono converter (§4.2) before any reconstruction happens.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width).
    pub data: Array2<f32>,
}

impl Frame {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Debug-only check of the §3 pixel-range invariant. Called at the
    /// boundary of stages that are documented to uphold it; a violation is a
    /// programmer error and aborts the process (§7).
    pub fn assert_in_range(&self) {
        debug_assert!(
            self.data.iter().all(|&v| (SAMPLE_MIN..=SAMPLE_MAX).contains(&v)),
            "sample out of [0, 65535] range"
        );
    }
}

/// Color image composed of three aligned single-channel planes (§4.2).
#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub red: Frame,
    pub green: Frame,
    pub blue: Frame,
}

impl ColorFrame {
    pub fn width(&self) -> usize {
        self.red.width()
    }

    pub fn height(&self) -> usize {
        self.red.height()
    }
}

/// Metadata about the source SER file (observation details, §6).
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub filename: PathBuf,
    pub total_frames: usize,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_mode: ColorMode,
    pub observer: Option<String>,
    pub telescope: Option<String>,
    pub instrument: Option<String>,
}

/// Distortion polynomial `y(x) = a*x^2 + b*x + c` fit to the spectral line
/// (§3, §4.4). Exists only after analysis succeeds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistortionPolynomial {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl DistortionPolynomial {
    pub fn eval(&self, x: f64) -> f64 {
        self.a * x * x + self.b * x + self.c
    }
}

/// Ellipse fit to the reconstructed disk's edge (§3, §4.7). Semi-axes are
/// ordered `a >= b`; `rotation` is the tilt angle in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipse {
    pub center_x: f64,
    pub center_y: f64,
    pub semi_major: f64,
    pub semi_minor: f64,
    pub rotation: f64,
}

impl Ellipse {
    /// `b/a` as used by §4.7's `[0.5, 2.0]` acceptance test (a "circularity"
    /// check applied symmetrically in either axis order).
    pub fn axis_ratio(&self) -> f64 {
        if self.semi_major.abs() < f64::EPSILON {
            0.0
        } else {
            self.semi_minor / self.semi_major
        }
    }
}

/// Basic descriptive statistics over an image's samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub median: f32,
}

impl ImageStats {
    pub fn compute(data: &Array2<f32>) -> Self {
        let mut sorted: Vec<f32> = data.iter().copied().collect();
        sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let min = *sorted.first().unwrap_or(&0.0);
        let max = *sorted.last().unwrap_or(&0.0);
        let mean = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f32>() / sorted.len() as f32
        };
        let median = if sorted.is_empty() {
            0.0
        } else {
            sorted[sorted.len() / 2]
        };
        Self { min, max, mean, median }
    }
}

/// Typed metadata attached to an [`Image`] (§3's `Image wrapper`).
///
/// The distilled design used a reflective `Map<TypeTag, Object>`; per §9's
/// design note this becomes a plain optional-field record instead — the
/// capability ("typed lookup by purpose") survives without reflection.
#[derive(Clone, Debug, Default)]
pub struct ImageMetadata {
    pub ellipse: Option<Ellipse>,
    pub pixel_shift: Option<f64>,
    pub black_point: Option<f32>,
    pub stats: Option<ImageStats>,
}

/// An image passed by move through pipeline stages (§3's `Image wrapper`).
#[derive(Clone, Debug)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub data: Array2<f32>,
    pub metadata: ImageMetadata,
}

impl Image {
    pub fn new(data: Array2<f32>) -> Self {
        let (height, width) = data.dim();
        Self {
            width,
            height,
            data,
            metadata: ImageMetadata::default(),
        }
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self::new(frame.data)
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(self.data.clone())
    }
}

/// Opaque tag distinguishing pipeline stages for progress/result bookkeeping
/// (§3's `resultSlots: map<StageTag, StageResult>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageTag {
    Reconstruction,
    GeometryCorrected,
    BandingFixed,
}

/// The per-shift workflow state owned by the pipeline until it drains (§3).
#[derive(Clone, Debug)]
pub struct WorkflowState {
    /// Signed pixel offset applied to the distortion polynomial (§4.5).
    pub pixel_shift: f64,
    pub width: usize,
    pub height: usize,
    /// Allocated once, filled exactly once per (row, shift) (§3's invariants).
    pub reconstructed: Array2<f32>,
    pub result_slots: HashMap<StageTag, Image>,
    /// Internal shifts never emit visible artifacts (§3, glossary).
    pub internal: bool,
}

impl WorkflowState {
    pub fn new(pixel_shift: f64, width: usize, height: usize, internal: bool) -> Self {
        Self {
            pixel_shift,
            width,
            height,
            reconstructed: Array2::zeros((height, width)),
            result_slots: HashMap::new(),
            internal,
        }
    }
}
