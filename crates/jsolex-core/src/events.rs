use std::sync::{Arc, RwLock};

use crate::frame::{Ellipse, Frame, ImageStats};

/// Stable tag for a generated image's purpose (§6 "Generated-image kinds").
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GeneratedImageKind {
    Raw,
    GeometryCorrected,
    BandingFixed,
    Doppler,
    Continuum,
    Colorized,
    Redshift,
    Cropped,
    Reconstruction,
    Debug,
    TechnicalCard,
}

/// How an image was produced, attached to `ImageGenerated` for downstream
/// bookkeeping (e.g. whether it came straight off the reconstruction engine
/// or after geometry/banding correction).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationStrategy {
    Direct,
    GeometryCorrected,
    BandingCorrected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Tagged event broadcast to every listener (§4.8). Each variant carries
/// exactly the payload the corresponding pipeline stage has on hand at
/// publish time.
#[derive(Clone, Debug)]
pub enum Event {
    ProcessingStart,
    OutputImageDimensionsDetermined { width: usize, height: usize },
    PartialReconstruction {
        row: usize,
        shift: f64,
        line: Frame,
        annotated: Option<Frame>,
    },
    ImageGenerated {
        kind: GeneratedImageKind,
        title: String,
        path: Option<std::path::PathBuf>,
        image: Frame,
        strategy: GenerationStrategy,
    },
    FileGenerated { path: std::path::PathBuf },
    Notification {
        severity: Severity,
        title: String,
        header: String,
        message: String,
    },
    Suggestion { message: String },
    Progress { fraction: f64, task: String },
    VideoMetadata { total_frames: usize, width: usize, height: usize },
    ProcessingDone {
        timestamp_unix_ms: i64,
        shift_images: usize,
        ellipse: Option<Ellipse>,
        stats: Option<ImageStats>,
    },
    ScriptExecutionResult { script: String, output: String },
}

/// A registered listener. Dispatch is synchronous, on the publishing
/// thread (§4.8) — implementations must not block.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event);
}

/// Fan-out broadcaster generalized from the single-purpose progress
/// reporter into the full tagged-event model §4.8 specifies. Listener
/// identity for removal is by pointer equality of the stored `Arc`.
#[derive(Default)]
pub struct Broadcaster {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().expect("broadcaster lock poisoned").push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) {
        let mut guard = self.listeners.write().expect("broadcaster lock poisoned");
        guard.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn broadcast(&self, event: Event) {
        let guard = self.listeners.read().expect("broadcaster lock poisoned");
        for listener in guard.iter() {
            listener.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: AtomicUsize,
    }

    impl EventListener for CountingListener {
        fn on_event(&self, _event: &Event) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn broadcasts_to_every_registered_listener() {
        let broadcaster = Broadcaster::new();
        let listener = Arc::new(CountingListener { count: AtomicUsize::new(0) });
        broadcaster.add_listener(listener.clone());
        broadcaster.broadcast(Event::ProcessingStart);
        broadcaster.broadcast(Event::Progress { fraction: 0.5, task: "reconstructing".into() });
        assert_eq!(listener.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removed_listener_stops_receiving_events() {
        let broadcaster = Broadcaster::new();
        let listener = Arc::new(CountingListener { count: AtomicUsize::new(0) });
        broadcaster.add_listener(listener.clone());
        broadcaster.remove_listener(&listener);
        broadcaster.broadcast(Event::ProcessingStart);
        assert_eq!(listener.count.load(Ordering::SeqCst), 0);
    }
}
