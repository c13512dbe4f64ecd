pub mod params;

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use ndarray::Array2;
use tracing::info;

use crate::banding::correct_banding;
use crate::color::converter::converter_for;
use crate::color::debayer::DebayerMethod;
use crate::consts::{
    DEFAULT_EDGE_MAGNITUDE_FLOOR, DEFAULT_EDGE_RELATIVE_THRESHOLD, DEFAULT_LINE_MAGNITUDE_CEILING,
};
use crate::edge::detector::detect_edges;
use crate::error::{JSolexError, Result};
use crate::events::{Broadcaster, Event, GeneratedImageKind, GenerationStrategy, Severity};
use crate::frame::{DistortionPolynomial, Ellipse, Frame, Image, ImageStats, SourceInfo, WorkflowState};
use crate::geometry::corrector::{apply_known_correction, correct as fit_and_correct, CorrectionParams};
use crate::io::emitter::ImageEmitter;
use crate::io::ser::SerCursor;
use crate::reconstruction::engine::reconstruct_row;
use crate::scheduling::{ForkJoinContext, Semaphore};
use crate::spectrum::analyzer::analyze_with_ceiling;

pub use params::{
    BandingParams, ExtraParams, GeometryParams, ObservationDetails, ProcessParams, RequestedImages,
    SpectrumParams,
};

/// Final result of one end-to-end reconstruction run (§2 "Data flow", §6).
#[derive(Debug)]
pub struct ProcessingOutcome {
    pub source: SourceInfo,
    pub polynomial: DistortionPolynomial,
    pub ellipse: Option<Ellipse>,
    pub images: Vec<GeneratedImage>,
}

#[derive(Debug)]
pub struct GeneratedImage {
    pub kind: GeneratedImageKind,
    pub pixel_shift: f64,
    pub image: Image,
}

/// One planned reconstruction shift: the pixel offset, whether it is a
/// purely internal computation input (never emitted, glossary's "internal
/// shift"), and — for emitted shifts — the kind the caller wants it tagged
/// with (§6).
#[derive(Clone, Copy, Debug)]
struct ShiftPlan {
    shift: f64,
    internal: bool,
    kind: GeneratedImageKind,
}

/// Merge the primary ray shift, the caller's requested shifts, the Doppler
/// pair and the internal (continuum) shifts into one de-duplicated plan. A
/// shift requested explicitly always wins over one that only shows up as an
/// internal input — it is emitted either way.
fn build_shift_plan(params: &ProcessParams) -> Vec<ShiftPlan> {
    let mut plans: Vec<ShiftPlan> = Vec::new();

    let mut push = |shift: f64, internal: bool, kind: GeneratedImageKind| {
        if let Some(existing) = plans.iter_mut().find(|p| (p.shift - shift).abs() < f64::EPSILON) {
            existing.internal = existing.internal && internal;
        } else {
            plans.push(ShiftPlan { shift, internal, kind });
        }
    };

    push(params.spectrum.pixel_shift, false, GeneratedImageKind::Reconstruction);

    let mut kinds = params.requested_images.kinds.iter().cycle();
    for &shift in &params.requested_images.pixel_shifts {
        let kind = kinds.next().copied().unwrap_or(GeneratedImageKind::Reconstruction);
        push(shift, false, kind);
    }

    if let Some((red, blue)) = params.spectrum.doppler_shift {
        let (red, blue) = if params.spectrum.switch_red_blue { (blue, red) } else { (red, blue) };
        push(red, false, GeneratedImageKind::Doppler);
        push(blue, false, GeneratedImageKind::Doppler);
    }

    for &shift in &params.requested_images.internal_shifts {
        push(shift, true, GeneratedImageKind::Continuum);
    }

    plans
}

/// Read every frame of the SER file sequentially through the color
/// converter appropriate for its mode (§4.1, §4.2). Driven inside the `io`
/// context's single-threaded scope so at most one cursor is ever open on
/// the file at a time.
fn read_all_frames(path: &Path, debayer_method: &DebayerMethod) -> Result<(SourceInfo, Vec<Frame>)> {
    let mut cursor = SerCursor::open(path)?;
    let source_info = cursor.source_info();
    let geometry = cursor.geometry();
    let bit_depth = cursor.header().pixel_depth;
    let converter = converter_for(geometry.color_mode, debayer_method.clone());

    let mut frames = Vec::with_capacity(cursor.frame_count());
    while let Some(raw) = cursor.next_frame()? {
        let mut buffer = converter.create_buffer(raw.geometry);
        converter.convert(&raw, bit_depth, &mut buffer)?;
        frames.push(Frame::new(buffer));
    }
    Ok((source_info, frames))
}

/// Reconstruct every planned shift across every frame in `frames`, fanning
/// out per (frame, shift) pair inside `main_ctx` and bounding concurrent
/// tasks to the CPU count (§4.5, §5, §9).
///
/// `frames` is already sliced to the detected sweep range; the distinction
/// the spec draws between "seek back to the detected range" and "re-read
/// from disk" collapses here into a plain slice of the in-memory frames
/// collected during the first pass, since [`SerCursor`]'s backing store is
/// a memory-mapped file rather than a forward-only stream — re-opening a
/// second cursor to re-read bytes already resident in the mapping would add
/// no correctness and only cost a second copy (recorded as a deliberate
/// simplification, not an omission).
fn run_reconstruction(
    main_ctx: &ForkJoinContext,
    frames: &[Frame],
    polynomial: &DistortionPolynomial,
    plans: &[ShiftPlan],
    broadcaster: &Broadcaster,
) -> Vec<WorkflowState> {
    let width = frames[0].width();
    let height = frames.len();

    let states: Vec<Mutex<WorkflowState>> = plans
        .iter()
        .map(|p| Mutex::new(WorkflowState::new(p.shift, width, height, p.internal)))
        .collect();

    let cpu_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let semaphore = Semaphore::new(cpu_count);

    main_ctx.blocking(|scope| {
        for (frame_idx, frame) in frames.iter().enumerate() {
            for (plan_idx, plan) in plans.iter().enumerate() {
                let state = &states[plan_idx];
                let semaphore = &semaphore;
                let shift = plan.shift;
                let internal = plan.internal;
                scope.spawn_task(move || {
                    let _permit = semaphore.acquire();
                    let row = reconstruct_row(frame, polynomial, shift, width);
                    {
                        let mut guard = state.lock().expect("workflow state lock poisoned");
                        for (x, &v) in row.iter().enumerate() {
                            guard.reconstructed[[frame_idx, x]] = v;
                        }
                    }
                    if !internal {
                        let line = Frame::new(
                            Array2::from_shape_vec((1, width), row).expect("row has the expected width"),
                        );
                        broadcaster.broadcast(Event::PartialReconstruction {
                            row: frame_idx,
                            shift,
                            line,
                            annotated: None,
                        });
                    }
                });
            }
        }
    });

    states
        .into_iter()
        .map(|m| m.into_inner().expect("workflow state lock poisoned"))
        .collect()
}

/// Geometry-correct and band-correct every non-internal shift's
/// reconstruction, fitting the ellipse once on the primary ray shift and
/// reusing that fit for every other shift (§4.6, §4.7, §9 "one fit, many
/// shifts").
fn finish_images(
    states: &[WorkflowState],
    plans: &[ShiftPlan],
    params: &ProcessParams,
    emitter: &dyn ImageEmitter,
    broadcaster: &Broadcaster,
) -> Result<(Option<Ellipse>, Vec<GeneratedImage>)> {
    let correction_params = CorrectionParams {
        forced_tilt: params.geometry.forced_tilt,
        forced_xy_ratio: params.geometry.forced_xy_ratio,
        horizontal_mirror: params.geometry.horizontal_mirror,
        vertical_mirror: params.geometry.vertical_mirror,
    };

    let primary_idx = plans
        .iter()
        .position(|p| (p.shift - params.spectrum.pixel_shift).abs() < f64::EPSILON)
        .unwrap_or(0);
    let primary_frame = Frame::new(states[primary_idx].reconstructed.clone());
    let primary_correction = fit_and_correct(&primary_frame, &correction_params);
    if primary_correction.ellipse.is_none() {
        broadcaster.broadcast(Event::Suggestion {
            message: "ellipse fit failed; images were left geometrically uncorrected".into(),
        });
    }

    let mut images = Vec::new();
    for (idx, (plan, state)) in plans.iter().zip(states.iter()).enumerate() {
        if plan.internal {
            continue;
        }

        let mut corrected = if idx == primary_idx {
            // Already fit and corrected above; reuse it directly instead of
            // re-deriving it through apply_known_correction (which would
            // need the raw fitted ellipse, not yet circularized).
            primary_correction.image.clone()
        } else {
            let raw_frame = Frame::new(state.reconstructed.clone());
            match primary_correction.raw_ellipse {
                Some(ref ellipse) => apply_known_correction(&raw_frame, ellipse, &correction_params),
                None => fit_and_correct(&raw_frame, &correction_params).image,
            }
        };
        corrected.assert_in_range();
        correct_banding(
            &mut corrected,
            primary_correction.ellipse.as_ref(),
            params.banding.width,
            params.banding.passes,
        );

        let mut image = Image::from_frame(corrected);
        image.metadata.ellipse = primary_correction.ellipse;
        image.metadata.pixel_shift = Some(plan.shift);
        image.metadata.black_point = Some(primary_correction.black_point);
        image.metadata.stats = Some(ImageStats::compute(&image.data));

        let ray = if params.spectrum.ray.is_empty() { "line" } else { params.spectrum.ray.as_str() };
        let title = format!("{ray} ({:+.2} px)", plan.shift);
        let name = format!("{}_{:+.2}", sanitize(ray), plan.shift);
        let strategy = if primary_correction.ellipse.is_some() {
            GenerationStrategy::BandingCorrected
        } else {
            GenerationStrategy::Direct
        };

        emitter.new_mono_image(plan.kind, "reconstruction", &title, &name, &image.to_frame(), None)?;
        broadcaster.broadcast(Event::ImageGenerated {
            kind: plan.kind,
            title,
            path: None,
            image: image.to_frame(),
            strategy,
        });

        images.push(GeneratedImage { kind: plan.kind, pixel_shift: plan.shift, image });
    }

    Ok((primary_correction.ellipse, images))
}

fn sanitize(ray: &str) -> String {
    ray.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Full reconstruction of one SER file (§2's data-flow pipeline, end to
/// end): read and convert every frame, detect the sun's edge-to-edge sweep,
/// fit the distortion polynomial, reconstruct every planned shift in
/// parallel, geometry- and banding-correct the results, and hand each
/// emitted image to `emitter`. `broadcaster` receives the full `Event`
/// sequence a caller needs to drive a progress UI (§4.8).
///
/// On failure a `Notification` event is broadcast before the error is
/// returned; no partial image is emitted for a run that fails before
/// reconstruction completes (§4.9's failure semantics).
pub fn reconstruct(
    path: &Path,
    params: &ProcessParams,
    emitter: &dyn ImageEmitter,
    broadcaster: &Broadcaster,
) -> Result<ProcessingOutcome> {
    broadcaster.broadcast(Event::ProcessingStart);
    match run(path, params, emitter, broadcaster) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            broadcaster.broadcast(Event::Notification {
                severity: Severity::Error,
                title: "Reconstruction failed".into(),
                header: path.display().to_string(),
                message: err.to_string(),
            });
            Err(err)
        }
    }
}

fn run(
    path: &Path,
    params: &ProcessParams,
    emitter: &dyn ImageEmitter,
    broadcaster: &Broadcaster,
) -> Result<ProcessingOutcome> {
    let io_ctx = ForkJoinContext::io();
    let main_ctx = ForkJoinContext::main();
    let debayer_method = DebayerMethod::default();

    let (source, frames) = io_ctx.blocking(|_scope| read_all_frames(path, &debayer_method))?;
    info!(
        total_frames = source.total_frames,
        width = source.width,
        height = source.height,
        "read SER source"
    );

    let edge_result = detect_edges(
        frames.iter().cloned(),
        DEFAULT_EDGE_MAGNITUDE_FLOOR,
        DEFAULT_EDGE_RELATIVE_THRESHOLD,
    )?;

    let polynomial = analyze_with_ceiling(&edge_result.average, DEFAULT_LINE_MAGNITUDE_CEILING)?;
    info!(a = polynomial.a, b = polynomial.b, c = polynomial.c, "fit distortion polynomial");

    let sweep = &frames[edge_result.start..edge_result.end];
    if sweep.is_empty() {
        return Err(JSolexError::EmptySequence);
    }
    broadcaster.broadcast(Event::OutputImageDimensionsDetermined {
        width: sweep[0].width(),
        height: sweep.len(),
    });

    let plans = build_shift_plan(params);
    let states = run_reconstruction(&main_ctx, sweep, &polynomial, &plans, broadcaster);
    broadcaster.broadcast(Event::Progress {
        fraction: 0.75,
        task: "geometry and banding correction".into(),
    });

    let (ellipse, images) = finish_images(&states, &plans, params, emitter, broadcaster)?;

    broadcaster.broadcast(Event::ProcessingDone {
        timestamp_unix_ms: now_unix_ms(),
        shift_images: images.len(),
        ellipse,
        stats: images.first().and_then(|g| g.image.metadata.stats),
    });

    Ok(ProcessingOutcome { source, polynomial, ellipse, images })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::emitter::NoOpEmitter;

    fn single_shift_params(shift: f64) -> ProcessParams {
        ProcessParams {
            spectrum: SpectrumParams { pixel_shift: shift, ..Default::default() },
            observation: ObservationDetails::default(),
            geometry: GeometryParams::default(),
            banding: BandingParams::default(),
            requested_images: RequestedImages {
                kinds: vec![GeneratedImageKind::Reconstruction],
                pixel_shifts: vec![shift],
                internal_shifts: vec![],
            },
            extra: ExtraParams::default(),
        }
    }

    #[test]
    fn shift_plan_deduplicates_primary_and_requested_shifts() {
        let params = single_shift_params(2.0);
        let plans = build_shift_plan(&params);
        assert_eq!(plans.len(), 1);
        assert!(!plans[0].internal);
    }

    #[test]
    fn shift_plan_keeps_explicit_shift_even_if_also_listed_as_internal() {
        let mut params = single_shift_params(0.0);
        params.requested_images.internal_shifts = vec![0.0];
        let plans = build_shift_plan(&params);
        let entry = plans.iter().find(|p| p.shift == 0.0).unwrap();
        assert!(!entry.internal);
    }

    #[test]
    fn shift_plan_adds_doppler_pair_as_non_internal() {
        let mut params = single_shift_params(0.0);
        params.spectrum.doppler_shift = Some((-4.0, 4.0));
        let plans = build_shift_plan(&params);
        assert!(plans.iter().any(|p| p.shift == -4.0 && !p.internal));
        assert!(plans.iter().any(|p| p.shift == 4.0 && !p.internal));
    }

    #[test]
    fn reconstruction_over_uniform_frames_produces_one_emitted_image() {
        let frames: Vec<Frame> = (0..8)
            .map(|_| Frame::new(Array2::from_elem((16, 16), 30_000.0)))
            .collect();
        let poly = DistortionPolynomial { a: 0.0, b: 0.0, c: 8.0 };
        let params = single_shift_params(0.0);
        let plans = build_shift_plan(&params);
        let main_ctx = ForkJoinContext::main();
        let broadcaster = Broadcaster::new();

        let states = run_reconstruction(&main_ctx, &frames, &poly, &plans, &broadcaster);
        let emitter = NoOpEmitter;
        let (ellipse, images) = finish_images(&states, &plans, &params, &emitter, &broadcaster).unwrap();

        assert_eq!(images.len(), 1);
        let _ = ellipse;
        for &v in images[0].image.data.iter() {
            assert!((0.0..=65_535.0).contains(&v));
        }
    }
}
