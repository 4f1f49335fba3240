use crate::ir::ShapeError;
use crate::tflite::TensorType;

/// Why a subgraph could not be lowered.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("unsupported tensor type: {0:?}")]
    UnsupportedType(TensorType),

    #[error("unsupported rank {0}")]
    UnsupportedRank(usize),

    #[error("degenerate shape {0:?}")]
    DegenerateShape(Vec<i32>),

    #[error("operand {0} has no tensor or node")]
    MissingOperand(i32),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("translation failed: {0}")]
    TranslationFailure(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn translation(op: &str, reason: impl std::fmt::Display) -> Self {
        Error::TranslationFailure(format!("{op}: {reason}"))
    }
}

impl From<ShapeError> for Error {
    fn from(err: ShapeError) -> Self {
        Error::TranslationFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
