//! Errors surfaced by the layout engine.
//!
//! Only fatal conditions become errors. Degraded situations (a glyph missing
//! from the font, one malformed beam group) are logged and worked around.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// Beaming was requested but no glyph metrics were supplied
    #[error("glyph metrics are required when beaming is enabled")]
    MissingGlyphMetrics,

    #[error("invalid system width: {0} (must be positive)")]
    InvalidSystemWidth(f64),

    #[error("invalid staff space: {0} (must be positive)")]
    InvalidStaffSpace(f64),

    #[error("invalid time signature {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: i32, denominator: i32 },

    #[error("beam group has no notes")]
    EmptyBeamGroup,

    /// A beam group that cannot be analysed (single note, mismatched positions)
    #[error("malformed beam group: {0}")]
    MalformedBeamGroup(String),

    /// SMuFL metadata could not be read
    #[error("glyph metadata error: {0}")]
    Metadata(String),

    #[error("invalid layout options: {0}")]
    Options(String),

    /// A layout result could not be written out as JSON
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
