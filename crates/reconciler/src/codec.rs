//! Conversion between the textual attribute form of a metadata value and its
//! typed form.
//!
//! `Codec::decode` is the only place a [`TypedValue`] tag is established from
//! text; everything downstream matches exhaustively on the union.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;

/// Declared type of a metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetadataType {
    #[default]
    String,
    Number,
    Boolean,
}

impl MetadataType {
    /// Canonical wire name of the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::String, Self::Number, Self::Boolean]
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CodecError::UnsupportedType {
                type_name: s.to_string(),
            })
    }
}

/// A metadata value tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl TypedValue {
    /// The declared type matching this value.
    pub const fn metadata_type(&self) -> MetadataType {
        match self {
            Self::String(_) => MetadataType::String,
            Self::Number(_) => MetadataType::Number,
            Self::Boolean(_) => MetadataType::Boolean,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// How NUMBER values are rendered as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberFormat {
    /// Zero decimal places. The management API only stores whole numbers in
    /// this field, so configured fractions are rejected and remote fractions
    /// are rounded on projection.
    #[default]
    Integral,
    /// Shortest decimal text that parses back to the same `f64`.
    Shortest,
}

impl FromStr for NumberFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integral" => Ok(Self::Integral),
            "shortest" => Ok(Self::Shortest),
            other => Err(Error::invalid_config(format!(
                "unknown number format '{other}' (expected 'integral' or 'shortest')"
            ))),
        }
    }
}

/// Codec failures, before a metadata key is attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unsupported metadata type '{type_name}'")]
    UnsupportedType { type_name: String },

    #[error("cannot parse '{value}' as {target}: {reason}")]
    ValueParse {
        value: String,
        target: MetadataType,
        reason: String,
    },
}

impl CodecError {
    fn value_parse(value: &str, target: MetadataType, reason: impl Into<String>) -> Self {
        Self::ValueParse {
            value: value.to_string(),
            target,
            reason: reason.into(),
        }
    }

    /// Attach the offending metadata key.
    pub fn for_key(self, key: impl Into<String>) -> Error {
        let key = key.into();
        match self {
            Self::UnsupportedType { type_name } => Error::UnsupportedType { key, type_name },
            Self::ValueParse {
                value,
                target,
                reason,
            } => Error::ValueParse {
                key,
                value,
                target,
                reason,
            },
        }
    }
}

/// Text <-> typed value codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    number_format: NumberFormat,
}

impl Codec {
    pub const fn new(number_format: NumberFormat) -> Self {
        Self { number_format }
    }

    pub const fn number_format(&self) -> NumberFormat {
        self.number_format
    }

    /// Render a value in its canonical textual form.
    pub fn encode(&self, value: &TypedValue) -> String {
        match value {
            TypedValue::String(s) => s.clone(),
            TypedValue::Number(n) => match self.number_format {
                NumberFormat::Integral => format!("{n:.0}"),
                NumberFormat::Shortest => format!("{n}"),
            },
            TypedValue::Boolean(b) => b.to_string(),
        }
    }

    /// Parse text as the given type.
    ///
    /// # Errors
    ///
    /// Returns `ValueParse` when the text is not a valid value of `ty`.
    pub fn decode(&self, ty: MetadataType, text: &str) -> Result<TypedValue, CodecError> {
        match ty {
            MetadataType::String => Ok(TypedValue::String(text.to_string())),
            MetadataType::Number => {
                let n = text
                    .parse::<f64>()
                    .map_err(|e| CodecError::value_parse(text, ty, e.to_string()))?;
                self.check_number(n)
                    .map_err(|reason| CodecError::value_parse(text, ty, reason))?;
                Ok(TypedValue::Number(n))
            }
            MetadataType::Boolean => {
                if text.eq_ignore_ascii_case("true") {
                    Ok(TypedValue::Boolean(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(TypedValue::Boolean(false))
                } else {
                    Err(CodecError::value_parse(
                        text,
                        ty,
                        "expected 'true' or 'false'",
                    ))
                }
            }
        }
    }

    /// Parse text given a type name as written in configuration.
    ///
    /// A missing type name means STRING.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for an unknown type name, otherwise whatever
    /// [`Codec::decode`] returns.
    pub fn decode_named(
        &self,
        type_name: Option<&str>,
        text: &str,
    ) -> Result<TypedValue, CodecError> {
        let ty = type_name
            .map(MetadataType::from_str)
            .transpose()?
            .unwrap_or_default();
        self.decode(ty, text)
    }

    /// Check that a value can be represented under this codec without loss.
    ///
    /// # Errors
    ///
    /// Returns `ValueParse` for non-finite numbers, and for fractional
    /// numbers under [`NumberFormat::Integral`].
    pub fn validate(&self, value: &TypedValue) -> Result<(), CodecError> {
        match value {
            TypedValue::Number(n) => self.check_number(*n).map_err(|reason| {
                CodecError::value_parse(&n.to_string(), MetadataType::Number, reason)
            }),
            TypedValue::String(_) | TypedValue::Boolean(_) => Ok(()),
        }
    }

    /// Canonicalize a value through an encode/decode round trip.
    ///
    /// Under [`NumberFormat::Integral`] this rounds fractional numbers.
    ///
    /// # Errors
    ///
    /// Returns `ValueParse` when the value is not finite.
    pub fn normalize(&self, value: &TypedValue) -> Result<TypedValue, CodecError> {
        self.decode(value.metadata_type(), &self.encode(value))
    }

    fn check_number(&self, n: f64) -> Result<(), &'static str> {
        if !n.is_finite() {
            return Err("value is not a finite number");
        }
        match self.number_format {
            NumberFormat::Integral if n.fract() != 0.0 => {
                Err("fractional values are not supported with the integral number format")
            }
            NumberFormat::Integral | NumberFormat::Shortest => Ok(()),
        }
    }
}
