use std::path::Path;

use crate::error::Result;
use crate::events::GeneratedImageKind;
use crate::frame::{ColorFrame, Frame};

/// Collaborator the core pipeline delegates all destination-file I/O to
/// (§1 Non-goals, §6 "Image output contract"). The core never encodes or
/// persists a file itself; it only ever hands the emitter an in-memory
/// float buffer. This is the capability interface DESIGN NOTES §9 calls
/// for in place of the distilled design's anonymous `transform()`
/// subclasses — a plain trait, not a base class to extend.
pub trait ImageEmitter: Send + Sync {
    /// Emit a single-channel image. `transform`, when given, runs against
    /// a clone of `image` before the emitter renders it (e.g. to draw a
    /// debug overlay) — the emitter decides whether and how to apply it.
    fn new_mono_image(
        &self,
        kind: GeneratedImageKind,
        category: &str,
        title: &str,
        name: &str,
        image: &Frame,
        transform: Option<&dyn Fn(&mut Frame)>,
    ) -> Result<()>;

    /// Emit a three-channel color image.
    fn new_color_image(
        &self,
        kind: GeneratedImageKind,
        category: &str,
        title: &str,
        name: &str,
        image: &ColorFrame,
    ) -> Result<()>;

    /// Emit an already-produced file the core does not itself render (a
    /// FITS export, a technical card, ...).
    fn new_generic_file(
        &self,
        kind: GeneratedImageKind,
        category: &str,
        title: &str,
        name: &str,
        path: &Path,
    ) -> Result<()>;
}

/// No-op emitter: discards everything. Useful for tests and dry runs that
/// only care about the events/workflow state the pipeline produces.
#[derive(Default)]
pub struct NoOpEmitter;

impl ImageEmitter for NoOpEmitter {
    fn new_mono_image(
        &self,
        _kind: GeneratedImageKind,
        _category: &str,
        _title: &str,
        _name: &str,
        _image: &Frame,
        _transform: Option<&dyn Fn(&mut Frame)>,
    ) -> Result<()> {
        Ok(())
    }

    fn new_color_image(
        &self,
        _kind: GeneratedImageKind,
        _category: &str,
        _title: &str,
        _name: &str,
        _image: &ColorFrame,
    ) -> Result<()> {
        Ok(())
    }

    fn new_generic_file(
        &self,
        _kind: GeneratedImageKind,
        _category: &str,
        _title: &str,
        _name: &str,
        _path: &Path,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn no_op_emitter_accepts_every_call() {
        let emitter = NoOpEmitter;
        let frame = Frame::new(Array2::zeros((2, 2)));
        assert!(emitter
            .new_mono_image(GeneratedImageKind::Raw, "cat", "title", "name", &frame, None)
            .is_ok());
    }
}
