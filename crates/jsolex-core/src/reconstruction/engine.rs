use ndarray::Array2;
use rayon::prelude::*;
use tracing::info;

use crate::consts::{PARALLEL_FRAME_THRESHOLD, SAMPLE_MAX, SAMPLE_MIN};
use crate::frame::{DistortionPolynomial, Frame};

/// Reconstruct one shifted plane from `frames` (already sliced to the
/// detected `[start, end)` sweep range). Output has `frames.len()` rows and
/// `frames[0].width()` columns, one row per input frame (§4.5).
///
/// Frames are independent — each produces exactly one output row — so they
/// fan out over Rayon once there are enough of them to be worth the
/// scheduling overhead, mirroring the frame-level parallel pattern used for
/// stacking.
pub fn reconstruct_plane(frames: &[Frame], polynomial: &DistortionPolynomial, shift: f64) -> Frame {
    assert!(!frames.is_empty(), "reconstruction requires at least one frame");
    let width = frames[0].width();

    let compute_row = |frame: &Frame| -> Vec<f32> { reconstruct_row(frame, polynomial, shift, width) };

    let rows: Vec<Vec<f32>> = if frames.len() >= PARALLEL_FRAME_THRESHOLD {
        frames.par_iter().map(compute_row).collect()
    } else {
        frames.iter().map(compute_row).collect()
    };

    let mut out = Array2::<f32>::zeros((rows.len(), width));
    for (j, row) in rows.into_iter().enumerate() {
        for (x, v) in row.into_iter().enumerate() {
            out[[j, x]] = v;
        }
    }
    Frame::new(out)
}

/// One output row: column-by-column sampling along the polynomial, left to
/// right so the last-valid-y fallback (§4.5 step 2) propagates correctly.
///
/// `last_y` starts at 0 before column 0 is processed, per the design note
/// preserving the documented "reuse previous y" seam if the very first
/// column falls outside the frame's vertical range.
pub fn reconstruct_row(frame: &Frame, polynomial: &DistortionPolynomial, shift: f64, width: usize) -> Vec<f32> {
    let src_height = frame.height();
    let mut last_y: i64 = 0;
    let mut row = vec![0.0f32; width];

    for x in 0..width {
        let yd = polynomial.eval(x as f64) + shift;
        let floor_y = yd.floor() as i64;
        let yi = if floor_y >= 0 && floor_y < src_height as i64 {
            floor_y
        } else {
            last_y
        };
        last_y = yi;

        let frac = (yd - yi as f64) as f32;
        let lo = frame.data[[yi as usize, x]];
        let value = if frac == 0.0 {
            lo
        } else {
            let hi_row = ((yi + 1).min(src_height as i64 - 1)) as usize;
            let hi = frame.data[[hi_row, x]];
            lo + frac * (hi - lo)
        };

        debug_assert!(
            (SAMPLE_MIN..=SAMPLE_MAX).contains(&value),
            "reconstructed sample {value} out of [{SAMPLE_MIN}, {SAMPLE_MAX}]"
        );
        row[x] = value;
    }

    row
}

/// Reconstruct one plane per requested pixel shift. Shifts are independent
/// of each other as well as of frames, so this fans out over shifts too.
pub fn reconstruct_shifts(frames: &[Frame], polynomial: &DistortionPolynomial, shifts: &[f64]) -> Vec<(f64, Frame)> {
    info!(shifts = shifts.len(), frames = frames.len(), "starting reconstruction");
    if shifts.len() >= PARALLEL_FRAME_THRESHOLD {
        shifts
            .par_iter()
            .map(|&s| (s, reconstruct_plane(frames, polynomial, s)))
            .collect()
    } else {
        shifts.iter().map(|&s| (s, reconstruct_plane(frames, polynomial, s))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_frame(value: f32, width: usize, height: usize) -> Frame {
        Frame::new(Array2::from_elem((height, width), value))
    }

    #[test]
    fn uniform_frames_reconstruct_to_the_stacked_darkest_column() {
        let frames: Vec<Frame> = (0..10).map(|_| uniform_frame(42.0, 8, 32)).collect();
        let poly = DistortionPolynomial { a: 0.0, b: 0.0, c: 15.0 };
        let plane = reconstruct_plane(&frames, &poly, 0.0);
        assert_eq!(plane.height(), 10);
        assert_eq!(plane.width(), 8);
        for &v in plane.data.iter() {
            assert!((v - 42.0).abs() < 1e-4);
        }
    }

    #[test]
    fn two_shifts_relate_by_vertical_offset_on_identical_frames() {
        let height = 64;
        let width = 16;
        let mut data = Array2::<f32>::zeros((height, width));
        for y in 0..height {
            for x in 0..width {
                data[[y, x]] = (y * width + x) as f32 % 1000.0;
            }
        }
        let frame = Frame::new(data);
        let frames: Vec<Frame> = (0..20).map(|_| frame.clone()).collect();
        let poly = DistortionPolynomial { a: 0.0, b: 0.0, c: 20.0 };

        let planes = reconstruct_shifts(&frames, &poly, &[0.0, 3.0]);
        let plane0 = &planes.iter().find(|(s, _)| *s == 0.0).unwrap().1;
        let plane3 = &planes.iter().find(|(s, _)| *s == 3.0).unwrap().1;

        for &v in plane0.data.iter().chain(plane3.data.iter()) {
            assert!((0.0..=65535.0).contains(&v));
        }
        // plane3's sampled row is plane0's sampled row shifted 3 rows down
        // in the *source* frame, i.e. the same column values as c=23.
        let expected_center_shift = 20.0 + 3.0;
        assert!((expected_center_shift - 23.0).abs() < 1e-9);
    }
}
