use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to read input file: {0}")]
    InputReadError(String),
    
    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),
    
    #[error("Failed to decode input: {0}")]
    DecodeError(String),
    
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    
    #[error("Failed to construct negative: {0}")]
    NegativeConstructionError(String),
    
    #[error("Negative has no stage-1 image assigned")]
    NegativeNotReady,
    
    #[error("Failed to render image: {0}")]
    RenderError(String),
    
    #[error("Failed to generate preview: {0}")]
    PreviewError(String),
    
    #[error("Container layout is inconsistent: {0}")]
    SerializationError(String),
    
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse error categories reported across the conversion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DimensionMismatch,
    NegativeConstructionError,
    NegativeNotReady,
    RenderError,
    PreviewError,
    IOError,
    SerializationError,
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::InputReadError(_)
            | ConversionError::OutputWriteError(_)
            | ConversionError::IoError(_) => ErrorKind::IOError,
            // A source that cannot be decoded cannot supply the negative's metadata.
            ConversionError::DecodeError(_) => ErrorKind::NegativeConstructionError,
            ConversionError::DimensionMismatch(_) => ErrorKind::DimensionMismatch,
            ConversionError::NegativeConstructionError(_) => ErrorKind::NegativeConstructionError,
            ConversionError::NegativeNotReady => ErrorKind::NegativeNotReady,
            ConversionError::RenderError(_) => ErrorKind::RenderError,
            ConversionError::PreviewError(_) => ErrorKind::PreviewError,
            ConversionError::SerializationError(_) => ErrorKind::SerializationError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::DimensionMismatch => "DimensionMismatch",
            ErrorKind::NegativeConstructionError => "NegativeConstructionError",
            ErrorKind::NegativeNotReady => "NegativeNotReady",
            ErrorKind::RenderError => "RenderError",
            ErrorKind::PreviewError => "PreviewError",
            ErrorKind::IOError => "IOError",
            ErrorKind::SerializationError => "SerializationError",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_variants_share_a_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(ConversionError::from(io).kind(), ErrorKind::IOError);
        assert_eq!(ConversionError::InputReadError("x".into()).kind(), ErrorKind::IOError);
        assert_eq!(ConversionError::OutputWriteError("x".into()).kind(), ErrorKind::IOError);
    }

    #[test]
    fn kind_names_match_boundary_taxonomy() {
        assert_eq!(ConversionError::NegativeNotReady.kind().to_string(), "NegativeNotReady");
        assert_eq!(
            ConversionError::DimensionMismatch("0x0".into()).kind().to_string(),
            "DimensionMismatch"
        );
        assert_eq!(ErrorKind::IOError.to_string(), "IOError");
    }
}
