use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unrecognized container signature: {found:02X?}")]
    UnrecognizedSignature { found: Vec<u8> },

    #[error("Node {signature} not found after scanning {scanned} nodes")]
    NodeNotFound { signature: String, scanned: u32 },

    #[error("Truncated input at {position:#x}: need {need} bytes, have {have}")]
    TruncatedInput {
        position: u64,
        need: usize,
        have: usize,
    },

    #[error("Declared size {declared} is smaller than the minimum {minimum}")]
    UndersizedDeclaration { declared: u64, minimum: u64 },

    #[error("Offset {value:#x} at position {position:#x} falls outside {limit:#x}")]
    OutOfBoundsOffset {
        position: u64,
        value: u64,
        limit: u64,
    },

    #[error("Offsets in this buffer have already been resolved")]
    DoubleFixupDetected,

    #[error("Offsets are not resolved")]
    OffsetsNotResolved,

    #[error("Offset positions must be strictly increasing: {previous:#x} then {current:#x}")]
    UnsortedOffsets { previous: u64, current: u64 },

    #[error("Offset position {position:#x} is not a multiple of {unit}")]
    MisalignedOffset { position: u64, unit: u64 },

    #[error("Offset delta {delta:#x} does not fit in 30 bits")]
    DeltaOutOfRange { delta: u64 },

    #[error("String at {position:#x} is not valid UTF-8 or lacks a terminator")]
    InvalidString { position: u64 },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error describes malformed container data rather than an
    /// I/O or configuration failure.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::UnrecognizedSignature { .. }
                | Error::NodeNotFound { .. }
                | Error::TruncatedInput { .. }
                | Error::UndersizedDeclaration { .. }
                | Error::OutOfBoundsOffset { .. }
                | Error::InvalidString { .. }
        )
    }
}
