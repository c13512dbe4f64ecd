use thiserror::Error;

#[derive(Error, Debug)]
pub enum JSolexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Unsupported color mode: {0}")]
    UnsupportedColorMode(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Empty frame sequence")]
    EmptySequence,

    /// The spectral line could not be located after escalating the detection
    /// threshold up to its ceiling (§4.4, §7 "Numerical" errors).
    #[error("spectral line not found: {0}")]
    SpectralLineNotFound(String),

    /// Ellipse fit rejected (bad axis ratio or out-of-image center). Per §4.9
    /// this is recoverable: the pipeline continues uncorrected.
    #[error("ellipse fit rejected: {0}")]
    EllipseFitRejected(String),

    /// A worker pool's uncaught-exception handler received this and the
    /// caller chose to surface it rather than continue (§4.9, §7).
    #[error("cancelled: {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, JSolexError>;
