use crate::record::ParameterSetKind;

/// Errors that can occur while encoding or decoding frame records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Fewer bytes were available than a fixed-width field requires.
    #[error("truncated input ({available} bytes available, {needed} needed)")]
    TruncatedInput { needed: usize, available: usize },

    /// The record is shorter than the fixed header.
    #[error("malformed frame record: {len} bytes is shorter than the {min}-byte header")]
    HeaderTooShort { len: usize, min: usize },

    /// A parameter set declares more bytes than remain in the record.
    #[error(
        "malformed frame record: {kind} parameter set declares {declared} bytes, only {remaining} remain"
    )]
    ParameterSetOverrun {
        kind: ParameterSetKind,
        declared: usize,
        remaining: usize,
    },

    /// A parameter set does not fit its 32-bit length field.
    #[error("{kind} parameter set too large ({size} bytes)")]
    ParameterSetTooLarge { kind: ParameterSetKind, size: usize },
}

impl RecordError {
    /// Returns true for structural violations found while decoding.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            RecordError::TruncatedInput { .. }
                | RecordError::HeaderTooShort { .. }
                | RecordError::ParameterSetOverrun { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
