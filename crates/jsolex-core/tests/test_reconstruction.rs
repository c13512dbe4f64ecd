use std::io::Write;

use jsolex_core::events::Broadcaster;
use jsolex_core::io::emitter::NoOpEmitter;
use jsolex_core::pipeline::{
    self, BandingParams, ExtraParams, GeometryParams, ObservationDetails, ProcessParams, RequestedImages,
    SpectrumParams,
};

const SER_HEADER_SIZE: usize = 178;

fn build_synthetic_ser(width: u32, height: u32, bit_depth: u32, frames: &[Vec<u16>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"LUCAM-RECORDER");
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes()); // mono
    buf.extend_from_slice(&0i32.to_le_bytes()); // little-endian
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(frames.len() as i32).to_le_bytes());
    buf.extend_from_slice(&[0u8; 40]); // observer
    buf.extend_from_slice(&[0u8; 40]); // instrument
    buf.extend_from_slice(&[0u8; 40]); // telescope
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());
    assert_eq!(buf.len(), SER_HEADER_SIZE);

    for frame in frames {
        for &sample in frame {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
    }
    buf
}

/// A 32x32 frame with a dark absorption line at a fixed row, scaled by
/// `envelope` (0.0 = sun absent from the slit, 1.0 = full brightness) — the
/// same pattern the distortion-polynomial analyzer's own unit test uses,
/// replicated across frames with a bright middle stretch so edge detection
/// has a sweep to find.
fn synthetic_frame(width: usize, height: usize, center: usize, envelope: f32) -> Vec<u16> {
    let background = 40_000.0 * envelope;
    let near_line = 20_000.0 * envelope;
    let line = 100.0 * envelope;

    let mut data = vec![background as u16; width * height];
    for x in 0..width {
        data[(center - 1) * width + x] = near_line as u16;
        data[center * width + x] = line as u16;
        data[(center + 1) * width + x] = near_line as u16;
    }
    data
}

fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

fn build_sweep_ser() -> tempfile::NamedTempFile {
    let width = 32;
    let height = 32;
    let center = 15;
    let total_frames = 60;

    let frames: Vec<Vec<u16>> = (0..total_frames)
        .map(|i| {
            let envelope = if (10..50).contains(&i) { 1.0 } else { 0.0 };
            synthetic_frame(width, height, center, envelope)
        })
        .collect();

    let ser_data = build_synthetic_ser(width as u32, height as u32, 16, &frames);
    write_temp(&ser_data)
}

fn minimal_params(shift: f64) -> ProcessParams {
    ProcessParams {
        spectrum: SpectrumParams { pixel_shift: shift, ray: "H-alpha".into(), ..Default::default() },
        observation: ObservationDetails::default(),
        geometry: GeometryParams::default(),
        banding: BandingParams::default(),
        requested_images: RequestedImages {
            kinds: vec![jsolex_core::events::GeneratedImageKind::Reconstruction],
            pixel_shifts: vec![shift],
            internal_shifts: vec![],
        },
        extra: ExtraParams::default(),
    }
}

#[test]
fn reconstructs_a_single_shift_end_to_end() {
    let file = build_sweep_ser();
    let params = minimal_params(0.0);
    let emitter = NoOpEmitter;
    let broadcaster = Broadcaster::new();

    let outcome = pipeline::reconstruct(file.path(), &params, &emitter, &broadcaster).unwrap();

    assert_eq!(outcome.source.width, 32);
    assert_eq!(outcome.source.height, 32);
    assert_eq!(outcome.images.len(), 1);

    let image = &outcome.images[0].image;
    for &v in image.data.iter() {
        assert!((0.0..=65_535.0).contains(&v), "sample {v} out of range");
    }
    assert!((outcome.polynomial.c - 15.0).abs() < 2.0);
}

#[test]
fn reconstructs_a_doppler_pair_as_two_distinct_images() {
    let file = build_sweep_ser();
    let mut params = minimal_params(0.0);
    params.spectrum.doppler_shift = Some((-3.0, 3.0));
    params.requested_images.pixel_shifts = vec![0.0];

    let emitter = NoOpEmitter;
    let broadcaster = Broadcaster::new();
    let outcome = pipeline::reconstruct(file.path(), &params, &emitter, &broadcaster).unwrap();

    // primary shift (0.0) + two Doppler shifts (-3.0, 3.0) = 3 distinct images
    assert_eq!(outcome.images.len(), 3);
    let mut shifts: Vec<f64> = outcome.images.iter().map(|g| g.pixel_shift).collect();
    shifts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(shifts, vec![-3.0, 0.0, 3.0]);
}

#[test]
fn internal_shifts_never_produce_emitted_images() {
    let file = build_sweep_ser();
    let mut params = minimal_params(0.0);
    params.requested_images.internal_shifts = vec![15.0, 22.0];

    let emitter = NoOpEmitter;
    let broadcaster = Broadcaster::new();
    let outcome = pipeline::reconstruct(file.path(), &params, &emitter, &broadcaster).unwrap();

    assert_eq!(outcome.images.len(), 1);
    assert_eq!(outcome.images[0].pixel_shift, 0.0);
}

#[test]
fn empty_file_is_rejected() {
    let ser_data = build_synthetic_ser(4, 4, 8, &[]);
    let file = write_temp(&ser_data);
    let params = minimal_params(0.0);
    let emitter = NoOpEmitter;
    let broadcaster = Broadcaster::new();

    let result = pipeline::reconstruct(file.path(), &params, &emitter, &broadcaster);
    assert!(result.is_err());
}
