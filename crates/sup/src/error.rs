// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Every failure surfaced by the registry, the codecs and the two readers is
//! one [`Error`]. Callers that need to branch on the failure category use
//! [`Error::kind`], which folds the variants into the [`ErrorKind`] table:
//!
//! | Kind | Raised by |
//! |------|-----------|
//! | `Truncated` | EOF mid-frame or mid-value |
//! | `MalformedFrame` | bad frame code, version bit, length overflow |
//! | `MalformedHeader` | bad CSUP magic/version, oversized sections |
//! | `MalformedMetadata` | bad metadata node, child id, segment range |
//! | `FrameTooLarge` | frame over the configured maximum |
//! | `InvalidType` | structural type violations |
//! | `UnknownType` | local type id not in the stream's table |
//! | `BadValue` | tag-length body does not match its type |
//! | `UnsupportedPrimitive` | reserved primitive id |
//! | `Canceled` | cancellation observed |

use std::fmt;
use std::io;

/// Error category, one per row of the error table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Truncated,
    MalformedFrame,
    MalformedHeader,
    MalformedMetadata,
    FrameTooLarge,
    InvalidType,
    UnknownType,
    BadValue,
    UnsupportedPrimitive,
    Compression,
    Canceled,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Truncated => "truncated",
            Self::MalformedFrame => "malformed frame",
            Self::MalformedHeader => "malformed header",
            Self::MalformedMetadata => "malformed metadata",
            Self::FrameTooLarge => "frame too large",
            Self::InvalidType => "invalid type",
            Self::UnknownType => "unknown type",
            Self::BadValue => "bad value",
            Self::UnsupportedPrimitive => "unsupported primitive",
            Self::Compression => "compression",
            Self::Canceled => "canceled",
            Self::Io => "I/O",
        };
        f.write_str(name)
    }
}

/// Errors returned by sup operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input ended in the middle of a frame, value or section.
    #[error("truncated input: {0}")]
    Truncated(String),

    /// Frame code or frame layout is invalid.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// CSUP object header is invalid.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// CSUP metadata tree is invalid.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// Frame length exceeds the configured maximum.
    #[error("frame too large: {length} bytes (max {max})")]
    FrameTooLarge { length: u64, max: u64 },

    /// Structural type violation.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// Record field list is invalid (duplicate or non-UTF-8 name).
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// Named type name is invalid.
    #[error("invalid type name: {0:?}")]
    InvalidTypeName(String),

    /// Type id not present in the current type table.
    #[error("unknown type id {0}")]
    UnknownType(u32),

    /// Value bytes do not match the expected type.
    #[error("bad value: {0}")]
    BadValue(String),

    /// Reserved primitive id without an implementation.
    #[error("unsupported primitive id {0}")]
    UnsupportedPrimitive(u32),

    /// Compressor or decompressor failure.
    #[error("compression error: {0}")]
    Compression(String),

    /// Cancellation observed at a suspension point.
    #[error("operation canceled")]
    Canceled,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another error located at a byte offset in its input.
    #[error("{source} (at offset {offset})")]
    At {
        offset: u64,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Truncated(_) => ErrorKind::Truncated,
            Self::MalformedFrame(_) => ErrorKind::MalformedFrame,
            Self::MalformedHeader(_) => ErrorKind::MalformedHeader,
            Self::MalformedMetadata(_) => ErrorKind::MalformedMetadata,
            Self::FrameTooLarge { .. } => ErrorKind::FrameTooLarge,
            Self::InvalidType(_) | Self::InvalidField(_) | Self::InvalidTypeName(_) => {
                ErrorKind::InvalidType
            }
            Self::UnknownType(_) => ErrorKind::UnknownType,
            Self::BadValue(_) => ErrorKind::BadValue,
            Self::UnsupportedPrimitive(_) => ErrorKind::UnsupportedPrimitive,
            Self::Compression(_) => ErrorKind::Compression,
            Self::Canceled => ErrorKind::Canceled,
            Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => ErrorKind::Truncated,
            Self::Io(_) => ErrorKind::Io,
            Self::At { source, .. } => source.kind(),
        }
    }

    /// Byte offset where decoding failed, when known.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::At { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Attach a byte offset. An error that already carries one keeps it.
    #[must_use]
    pub fn at(self, offset: u64) -> Self {
        match self {
            Self::At { .. } => self,
            other => Self::At {
                offset,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn truncated(what: impl fmt::Display) -> Self {
        Self::Truncated(what.to_string())
    }

    pub(crate) fn bad_value(what: impl fmt::Display) -> Self {
        Self::BadValue(what.to_string())
    }
}

/// Convenient alias for results using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::InvalidField("dup".into()).kind(),
            ErrorKind::InvalidType
        );
        assert_eq!(
            Error::InvalidTypeName("int64".into()).kind(),
            ErrorKind::InvalidType
        );
        let eof = Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert_eq!(eof.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn test_offset_is_preserved() {
        let err = Error::bad_value("short int").at(42).at(7);
        assert_eq!(err.offset(), Some(42));
        assert_eq!(err.kind(), ErrorKind::BadValue);
        assert_eq!(err.to_string(), "bad value: short int (at offset 42)");
    }
}
