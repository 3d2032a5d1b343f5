use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest identification accepted. Stored values are short staff numbers
/// or national-id style strings; anything longer is a typo.
pub const MAX_IDENTIFICATION_LEN: usize = 20;

/// A short numeric string identifying a person, independent of their
/// account id and login email.
///
/// Equality is exact: `"4"` and `"004"` are different identifications.
/// Use [`Identification::equivalent`] or [`Normalization`] when the
/// zero-padded forms should be treated as the same person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identification(String);

impl Identification {
    /// Validates `raw` and wraps it without altering it.
    ///
    /// # Errors
    ///
    /// `AppError::BadRequest` when `raw` is empty, longer than
    /// [`MAX_IDENTIFICATION_LEN`], or contains anything but ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if raw.is_empty() {
            return Err(AppError::BadRequest(
                "identification cannot be empty".to_string(),
            ));
        }
        if raw.len() > MAX_IDENTIFICATION_LEN {
            return Err(AppError::BadRequest(format!(
                "identification longer than {} digits",
                MAX_IDENTIFICATION_LEN
            )));
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::BadRequest(format!(
                "identification must contain only digits: {:?}",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Left-pads with zeros up to `width`. Never truncates.
    pub fn zero_padded(&self, width: usize) -> Identification {
        Identification(format!("{:0>width$}", self.0, width = width))
    }

    /// Compares under fixed-width zero-padding, so `"4"` is equivalent to
    /// `"004"` and `"0"` to `"000000000"`.
    pub fn equivalent(&self, other: &Identification) -> bool {
        let width = self.0.len().max(other.0.len());
        self.zero_padded(width) == other.zero_padded(width)
    }
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identification {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identification {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identification> for String {
    fn from(value: Identification) -> Self {
        value.0
    }
}

impl AsRef<str> for Identification {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How an identification is rewritten before it is looked up or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Use the identification exactly as supplied.
    #[default]
    Exact,
    /// Left-pad with zeros to a fixed width.
    ZeroPadded(usize),
}

impl Normalization {
    pub fn apply(&self, id: &Identification) -> Identification {
        match self {
            Normalization::Exact => id.clone(),
            Normalization::ZeroPadded(width) => id.zero_padded(*width),
        }
    }
}
