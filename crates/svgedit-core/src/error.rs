//! Error types.
//!
//! Attribute-level parse errors never escape the attribute parser: they are
//! downgraded to [`crate::Warning`]s and the attribute is treated as absent.
//! Only malformed XML aborts a document parse. [`ShapeError`] is the
//! operational class: a geometry call that the element kind cannot honour.

use crate::id::ElementId;
use thiserror::Error;

/// Fatal document-level parse failure.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("markup is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Invalid `d` attribute grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path data at offset {offset}: {message}")]
pub struct PathParseError {
    pub offset: usize,
    pub message: String,
}

impl PathParseError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Invalid number-with-unit syntax.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{value}` is an invalid number with unit")]
pub struct LengthParseError {
    pub value: String,
}

/// Invalid or unsupported paint syntax.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaintParseError {
    #[error("`{0}` is not a valid color")]
    Invalid(String),
    #[error("paint server reference `{0}` is unsupported")]
    PaintServer(String),
}

/// Invalid `transform` list grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transform list at offset {offset}: {message}")]
pub struct TransformParseError {
    pub offset: usize,
    pub message: String,
}

/// Invalid number list (`points`, `viewBox`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid number list `{value}`: {message}")]
pub struct NumberListError {
    pub value: String,
    pub message: String,
}

/// A geometry operation the target cannot support.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("unknown element <{tag}> has no geometry")]
    UnknownElement { tag: String },
    #[error("<{tag}> is not a geometric element")]
    NotGeometric { tag: String },
    #[error("<{tag}> does not support `{operation}`")]
    Unsupported { tag: String, operation: &'static str },
    #[error("transform of a multiple selection is undefined")]
    MultiSelectionTransform,
    #[error("selection is empty")]
    EmptySelection,
    #[error("selected elements do not share a parent")]
    MixedParents,
    #[error("no element with id {0}")]
    MissingElement(ElementId),
}

/// Invalid host configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("numberOfDecimalPlaces must be at most {max}, got {got}")]
    DecimalPlaces { got: u32, max: u32 },
    #[error("percentageFallbackPx must be a positive finite number, got {0}")]
    PercentageFallback(f64),
}
