use ndarray::Array2;
use tracing::{debug, info};

use crate::consts::EDGE_DETECTION_PAD;
use crate::error::{JSolexError, Result};
use crate::frame::Frame;

/// Result of the magnitude-based sun-edge sweep (§4.3): the arithmetic-mean
/// frame over the whole sequence, plus the detected `[start, end)` frame
/// range padded 40 frames on each side.
#[derive(Clone, Debug)]
pub struct EdgeDetectionResult {
    pub average: Frame,
    pub start: usize,
    pub end: usize,
    pub magnitudes: Vec<f32>,
}

/// Consume `frames` once, accumulating the running mean and a per-frame
/// magnitude (sum of brightness above `floor`), then locate the sweep range
/// whose magnitude exceeds `relative_threshold` of the peak magnitude.
///
/// `frames` is driven sequentially (grounded in the single-owner SER reader,
/// §4.1) — this function does not itself open the reader, it only folds
/// over whatever frame stream the caller provides.
pub fn detect_edges<I>(frames: I, floor: f32, relative_threshold: f64) -> Result<EdgeDetectionResult>
where
    I: IntoIterator<Item = Frame>,
{
    let mut iter = frames.into_iter();
    let first = iter.next().ok_or(JSolexError::EmptySequence)?;
    let (h, w) = first.data.dim();

    let mut sum = Array2::<f32>::zeros((h, w));
    sum += &first.data;
    let mut magnitudes = vec![magnitude_of(&first.data, floor)];

    for frame in iter {
        sum += &frame.data;
        magnitudes.push(magnitude_of(&frame.data, floor));
    }

    let count = magnitudes.len();
    let average = sum / count as f32;

    let peak = magnitudes.iter().cloned().fold(0.0f32, f32::max);
    let threshold = peak as f64 * relative_threshold;

    let first_above = magnitudes.iter().position(|&m| m as f64 >= threshold);
    let last_above = magnitudes.iter().rposition(|&m| m as f64 >= threshold);

    let (start, end) = match (first_above, last_above) {
        (Some(s), Some(e)) => {
            let padded_start = s.saturating_sub(EDGE_DETECTION_PAD as usize);
            let padded_end = (e + 1 + EDGE_DETECTION_PAD as usize).min(count);
            (padded_start, padded_end)
        }
        _ => {
            debug!("no frame crossed the edge-detection threshold; using the whole file");
            (0, count)
        }
    };

    info!(total_frames = count, start, end, "edge detection complete");

    Ok(EdgeDetectionResult {
        average: Frame::new(average),
        start,
        end,
        magnitudes,
    })
}

fn magnitude_of(data: &Array2<f32>, floor: f32) -> f32 {
    data.iter().map(|&v| (v - floor).max(0.0)).sum()
}
