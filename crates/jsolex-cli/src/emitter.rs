use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageBuffer, Luma, Rgb};
use tracing::info;

use jsolex_core::error::{JSolexError, Result};
use jsolex_core::events::GeneratedImageKind;
use jsolex_core::frame::{ColorFrame, Frame};
use jsolex_core::io::emitter::ImageEmitter;

/// Writes every emitted image as a 16-bit PNG under `directory`, one
/// sub-directory per `category`, named after the kind/shift the core hands
/// it (§6 "Image output contract"). This is the crate's one place that
/// touches an image-encoding library, the same split the core's
/// `ImageEmitter` trait keeps between math (jsolex-core) and file formats
/// (jsolex-cli).
pub struct PngEmitter {
    directory: PathBuf,
    written: AtomicUsize,
}

impl PngEmitter {
    pub fn new(directory: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory, written: AtomicUsize::new(0) })
    }

    pub fn written_count(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    fn target(&self, category: &str, name: &str) -> Result<PathBuf> {
        let dir = self.directory.join(category);
        std::fs::create_dir_all(&dir).map_err(JSolexError::Io)?;
        Ok(dir.join(format!("{name}.png")))
    }
}

fn to_u16(sample: f32) -> u16 {
    sample.round().clamp(0.0, 65_535.0) as u16
}

impl ImageEmitter for PngEmitter {
    fn new_mono_image(
        &self,
        _kind: GeneratedImageKind,
        category: &str,
        title: &str,
        name: &str,
        image: &Frame,
        transform: Option<&dyn Fn(&mut Frame)>,
    ) -> Result<()> {
        let mut rendered = image.clone();
        if let Some(transform) = transform {
            transform(&mut rendered);
        }
        let (height, width) = rendered.data.dim();
        let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
                Luma([to_u16(rendered.data[[y as usize, x as usize]])])
            });

        let path = self.target(category, name)?;
        buffer
            .save(&path)
            .map_err(|e| JSolexError::Pipeline(format!("failed to write {}: {e}", path.display())))?;
        self.written.fetch_add(1, Ordering::Relaxed);
        info!(path = %path.display(), title, "wrote image");
        Ok(())
    }

    fn new_color_image(
        &self,
        _kind: GeneratedImageKind,
        category: &str,
        title: &str,
        name: &str,
        image: &ColorFrame,
    ) -> Result<()> {
        let (height, width) = image.red.data.dim();
        let buffer: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
                let (x, y) = (x as usize, y as usize);
                Rgb([
                    to_u16(image.red.data[[y, x]]),
                    to_u16(image.green.data[[y, x]]),
                    to_u16(image.blue.data[[y, x]]),
                ])
            });

        let path = self.target(category, name)?;
        buffer
            .save(&path)
            .map_err(|e| JSolexError::Pipeline(format!("failed to write {}: {e}", path.display())))?;
        self.written.fetch_add(1, Ordering::Relaxed);
        info!(path = %path.display(), title, "wrote color image");
        Ok(())
    }

    fn new_generic_file(
        &self,
        _kind: GeneratedImageKind,
        _category: &str,
        title: &str,
        _name: &str,
        path: &Path,
    ) -> Result<()> {
        info!(path = %path.display(), title, "generic file already written by caller");
        Ok(())
    }
}
