use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_BANDING_PASSES, DEFAULT_BANDING_WIDTH, DEFAULT_CONTINUUM_SHIFT};
use crate::events::GeneratedImageKind;

/// Structured processing request (§6 "Process parameters"). Immutable once
/// built; evolve by copy via the `with_*` helpers rather than mutation,
/// mirroring the builder-style records DESIGN NOTES §9 calls for in place
/// of mutable config setters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessParams {
    #[serde(default)]
    pub spectrum: SpectrumParams,
    #[serde(default)]
    pub observation: ObservationDetails,
    #[serde(default)]
    pub geometry: GeometryParams,
    #[serde(default)]
    pub banding: BandingParams,
    #[serde(default)]
    pub requested_images: RequestedImages,
    #[serde(default)]
    pub extra: ExtraParams,
}

impl ProcessParams {
    pub fn with_geometry(mut self, geometry: GeometryParams) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_banding(mut self, banding: BandingParams) -> Self {
        self.banding = banding;
        self
    }
}

/// Which spectral ray to reconstruct at, and the shifts that derive
/// additional images from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpectrumParams {
    /// Name of the targeted absorption ray (e.g. "H-alpha", "Ca II K").
    #[serde(default)]
    pub ray: String,
    #[serde(default)]
    pub detection_threshold: f64,
    /// Primary pixel shift for the main reconstructed image.
    #[serde(default)]
    pub pixel_shift: f64,
    /// Opposite pixel-shift pair used to build a red/blue Doppler composite
    /// (glossary: "Doppler shift").
    #[serde(default)]
    pub doppler_shift: Option<(f64, f64)>,
    #[serde(default)]
    pub switch_red_blue: bool,
}

impl Default for SpectrumParams {
    fn default() -> Self {
        Self {
            ray: String::new(),
            detection_threshold: crate::consts::DEFAULT_LINE_DETECTION_THRESHOLD,
            pixel_shift: 0.0,
            doppler_shift: None,
            switch_red_blue: false,
        }
    }
}

/// Observation metadata threaded through for technical-card generation;
/// none of it influences reconstruction math.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObservationDetails {
    #[serde(default)]
    pub observer: Option<String>,
    #[serde(default)]
    pub coordinates: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub telescope: Option<String>,
    #[serde(default)]
    pub focal_length_mm: Option<f64>,
    #[serde(default)]
    pub aperture_mm: Option<f64>,
    #[serde(default)]
    pub camera: Option<String>,
}

/// Geometry-correction knobs (§4.7). `None` fields fall back to the
/// automatic ellipse fit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeometryParams {
    #[serde(default)]
    pub forced_tilt: Option<f64>,
    #[serde(default)]
    pub forced_xy_ratio: Option<f64>,
    #[serde(default)]
    pub horizontal_mirror: bool,
    #[serde(default)]
    pub vertical_mirror: bool,
    #[serde(default)]
    pub sharpen: bool,
    #[serde(default)]
    pub disallow_downsampling: bool,
    /// Autocorrect the tilt angle assuming the disk sits at solar position
    /// angle P; `None` disables the autocorrection.
    #[serde(default)]
    pub autocorrect_angle_p: Option<f64>,
}

/// Banding-correction knobs (§4.6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BandingParams {
    #[serde(default = "default_banding_width")]
    pub width: usize,
    #[serde(default = "default_banding_passes")]
    pub passes: usize,
}

fn default_banding_width() -> usize {
    DEFAULT_BANDING_WIDTH
}

fn default_banding_passes() -> usize {
    DEFAULT_BANDING_PASSES
}

impl Default for BandingParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_BANDING_WIDTH,
            passes: DEFAULT_BANDING_PASSES,
        }
    }
}

/// What the caller wants emitted: a set of image kinds, the pixel shifts to
/// reconstruct at, and which of those shifts are internal-only (never
/// emitted, only used as computation inputs — e.g. the continuum shift).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestedImages {
    #[serde(default)]
    pub kinds: Vec<GeneratedImageKind>,
    #[serde(default)]
    pub pixel_shifts: Vec<f64>,
    #[serde(default)]
    pub internal_shifts: Vec<f64>,
}

impl Default for RequestedImages {
    fn default() -> Self {
        Self {
            kinds: vec![GeneratedImageKind::Reconstruction],
            pixel_shifts: vec![0.0],
            internal_shifts: vec![DEFAULT_CONTINUUM_SHIFT],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtraParams {
    #[serde(default)]
    pub autosave: bool,
    #[serde(default)]
    pub file_name_pattern: Option<String>,
    #[serde(default)]
    pub debug_images: bool,
    #[serde(default)]
    pub fits: bool,
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_request_a_single_reconstruction_at_zero_shift() {
        let params = RequestedImages::default();
        assert_eq!(params.pixel_shifts, vec![0.0]);
        assert_eq!(params.internal_shifts, vec![DEFAULT_CONTINUUM_SHIFT]);
    }

    #[test]
    fn with_geometry_replaces_only_that_section() {
        let params = ProcessParams {
            spectrum: SpectrumParams::default(),
            observation: ObservationDetails::default(),
            geometry: GeometryParams::default(),
            banding: BandingParams::default(),
            requested_images: RequestedImages::default(),
            extra: ExtraParams::default(),
        };
        let forced = GeometryParams {
            horizontal_mirror: true,
            ..Default::default()
        };
        let updated = params.with_geometry(forced);
        assert!(updated.geometry.horizontal_mirror);
    }

    #[test]
    fn process_params_round_trip_through_json() {
        let mut params = ProcessParams {
            spectrum: SpectrumParams { ray: "H-alpha".into(), pixel_shift: 3.5, ..Default::default() },
            observation: ObservationDetails::default(),
            geometry: GeometryParams::default(),
            banding: BandingParams::default(),
            requested_images: RequestedImages::default(),
            extra: ExtraParams::default(),
        };
        params.spectrum.doppler_shift = Some((-4.0, 4.0));

        let json = serde_json::to_string(&params).expect("serialize");
        let restored: ProcessParams = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(restored.spectrum.ray, "H-alpha");
        assert_eq!(restored.spectrum.pixel_shift, 3.5);
        assert_eq!(restored.spectrum.doppler_shift, Some((-4.0, 4.0)));
    }
}
