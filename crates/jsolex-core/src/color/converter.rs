use ndarray::Array2;

use crate::color::debayer::{debayer, luminance, DebayerMethod};
use crate::consts::SAMPLE_MAX;
use crate::error::{JSolexError, Result};
use crate::frame::{ColorFrame, ColorMode, Frame, Geometry, RawFrame};

/// Capability set for turning opaque raw SER bytes into a float frame
/// (§4.2): `create_buffer` preallocates the destination, `convert` fills it
/// in place from one raw frame's bytes.
pub trait FrameConverter: Send + Sync {
    fn create_buffer(&self, geometry: Geometry) -> Array2<f32> {
        Array2::zeros((geometry.height, geometry.width))
    }

    fn convert(&self, raw: &RawFrame, bit_depth: u32, out: &mut Array2<f32>) -> Result<()>;
}

/// Direct 8-/16-bit to float, no demosaicing.
pub struct MonoConverter;

impl FrameConverter for MonoConverter {
    fn convert(&self, raw: &RawFrame, bit_depth: u32, out: &mut Array2<f32>) -> Result<()> {
        decode_plane(raw, bit_depth, 0, out)
    }
}

/// Interleaved RGB input, collapsed through the same luminance weights used
/// for debayered color.
pub struct RgbConverter;

impl FrameConverter for RgbConverter {
    fn convert(&self, raw: &RawFrame, bit_depth: u32, out: &mut Array2<f32>) -> Result<()> {
        let geometry = raw.geometry;
        let mut red = Array2::<f32>::zeros((geometry.height, geometry.width));
        let mut green = Array2::<f32>::zeros((geometry.height, geometry.width));
        let mut blue = Array2::<f32>::zeros((geometry.height, geometry.width));
        decode_interleaved_plane(raw, bit_depth, 0, 3, &mut red)?;
        decode_interleaved_plane(raw, bit_depth, 1, 3, &mut green)?;
        decode_interleaved_plane(raw, bit_depth, 2, 3, &mut blue)?;
        let lum = luminance(&ColorFrame { red, green, blue });
        out.assign(&lum.data);
        Ok(())
    }
}

/// Bayer mosaic: decode the raw single-channel plane, demosaic, then
/// collapse to luminance.
pub struct BayerConverter {
    pub method: DebayerMethod,
}

impl FrameConverter for BayerConverter {
    fn convert(&self, raw: &RawFrame, bit_depth: u32, out: &mut Array2<f32>) -> Result<()> {
        let geometry = raw.geometry;
        let mut mosaic = Array2::<f32>::zeros((geometry.height, geometry.width));
        decode_plane(raw, bit_depth, 0, &mut mosaic)?;
        let color = debayer(&mosaic, geometry.color_mode, &self.method).ok_or_else(|| {
            JSolexError::UnsupportedColorMode(format!("{:?} is not a Bayer mode", geometry.color_mode))
        })?;
        let lum = luminance(&color);
        out.assign(&lum.data);
        Ok(())
    }
}

/// Resolve the converter appropriate for a color mode.
pub fn converter_for(mode: ColorMode, method: DebayerMethod) -> Box<dyn FrameConverter> {
    match mode {
        ColorMode::Mono => Box::new(MonoConverter),
        ColorMode::Rgb => Box::new(RgbConverter),
        _ if mode.is_bayer() => Box::new(BayerConverter { method }),
        _ => Box::new(MonoConverter),
    }
}

/// One-shot convenience: allocate and convert in a single call.
pub fn convert_frame(raw: &RawFrame, bit_depth: u32, method: &DebayerMethod) -> Result<Frame> {
    let converter = converter_for(raw.geometry.color_mode, method.clone());
    let mut buffer = converter.create_buffer(raw.geometry);
    converter.convert(raw, bit_depth, &mut buffer)?;
    Ok(Frame::new(buffer))
}

#[inline]
fn read_sample(bytes: &[u8], offset: usize, bytes_per_plane: usize) -> Result<u32> {
    match bytes_per_plane {
        1 => bytes
            .get(offset)
            .map(|&b| b as u32)
            .ok_or_else(|| JSolexError::Pipeline("raw frame buffer too short".into())),
        2 => {
            let hi = bytes
                .get(offset + 1)
                .ok_or_else(|| JSolexError::Pipeline("raw frame buffer too short".into()))?;
            let lo = bytes
                .get(offset)
                .ok_or_else(|| JSolexError::Pipeline("raw frame buffer too short".into()))?;
            Ok(u16::from_le_bytes([*lo, *hi]) as u32)
        }
        other => Err(JSolexError::UnsupportedColorMode(format!(
            "{other}-byte samples are not supported"
        ))),
    }
}

#[inline]
fn scale_to_full_range(raw_value: u32, bit_depth: u32) -> f32 {
    let max_val = if bit_depth == 0 { 255u32 } else { (1u32 << bit_depth) - 1 };
    (raw_value as f32 / max_val as f32) * SAMPLE_MAX
}

/// Decode a single mono/Bayer plane (one sample per pixel) into `out`.
fn decode_plane(raw: &RawFrame, bit_depth: u32, _plane: usize, out: &mut Array2<f32>) -> Result<()> {
    let geometry = raw.geometry;
    let bytes_per_plane = geometry.bytes_per_pixel;
    for row in 0..geometry.height {
        for col in 0..geometry.width {
            let offset = (row * geometry.width + col) * bytes_per_plane;
            let sample = read_sample(&raw.bytes, offset, bytes_per_plane)?;
            out[[row, col]] = scale_to_full_range(sample, bit_depth);
        }
    }
    Ok(())
}

/// Decode one plane of an N-plane interleaved buffer (e.g. plane 1 of an
/// RGB triple) into `out`.
fn decode_interleaved_plane(
    raw: &RawFrame,
    bit_depth: u32,
    plane: usize,
    plane_count: usize,
    out: &mut Array2<f32>,
) -> Result<()> {
    let geometry = raw.geometry;
    let bytes_per_sample = geometry.bytes_per_pixel / plane_count;
    for row in 0..geometry.height {
        for col in 0..geometry.width {
            let pixel_offset = (row * geometry.width + col) * geometry.bytes_per_pixel;
            let offset = pixel_offset + plane * bytes_per_sample;
            let sample = read_sample(&raw.bytes, offset, bytes_per_sample)?;
            out[[row, col]] = scale_to_full_range(sample, bit_depth);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Geometry;

    fn mono_geometry(width: usize, height: usize) -> Geometry {
        Geometry {
            width,
            height,
            bytes_per_pixel: 1,
            color_mode: ColorMode::Mono,
        }
    }

    #[test]
    fn mono_8bit_scales_to_full_range() {
        let geometry = mono_geometry(2, 2);
        let raw = RawFrame {
            index: 0,
            geometry,
            bytes: vec![0, 255, 128, 64],
        };
        let mut buf = Array2::<f32>::zeros((2, 2));
        MonoConverter.convert(&raw, 8, &mut buf).unwrap();
        assert_eq!(buf[[0, 0]], 0.0);
        assert!((buf[[0, 1]] - SAMPLE_MAX).abs() < 1e-3);
    }
}
