use thiserror::Error;

/// Errors raised by the constant-Q engine and its backends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CqtError {
    /// FFT length is not a power of two.
    #[error("FFT size {0} is not a power of two")]
    InvalidSize(usize),

    #[error("buffer holds {len} values but {required} are required")]
    BufferTooShort { len: usize, required: usize },

    /// Window length requested by the kernel builder was zero or negative.
    #[error("window length must be > 0, got {0}")]
    InvalidWindowLength(i64),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The incremental backend reported an error or went away.
    #[error("backend failure: {0}")]
    BackendFailure(String),
}

pub type Result<T> = std::result::Result<T, CqtError>;
