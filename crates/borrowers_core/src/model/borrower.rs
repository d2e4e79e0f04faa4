//! Borrower domain model.
//!
//! # Responsibility
//! - Define the canonical borrower record and its card identifier.
//! - Normalize and validate registration input before persistence.
//!
//! # Invariants
//! - `CardId` always matches `ID` followed by at least 6 decimal digits.
//! - `NewBorrower` fields are trimmed and never blank.
//! - `ssn` identifies a person; one card per `ssn`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static CARD_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ID([0-9]{6,})$").expect("valid card id regex"));

const CARD_ID_PREFIX: &str = "ID";

/// Library card identifier, e.g. `ID000042`.
///
/// Rendered with at least 6 digits of zero padding. Wider values appear once
/// the sequence passes `999999`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardId(String);

impl CardId {
    /// First identifier handed out on an empty table.
    pub fn first() -> Self {
        Self::from_sequence(1)
    }

    /// Renders a card id from its numeric sequence value.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{CARD_ID_PREFIX}{sequence:06}"))
    }

    /// Parses a persisted or user-supplied card id.
    ///
    /// # Errors
    /// - Returns `InvalidCardId` when the value is not `ID` + 6 or more digits,
    ///   or when the numeric part does not fit in `u64`.
    pub fn parse(value: &str) -> Result<Self, BorrowerValidationError> {
        let captures = CARD_ID_RE
            .captures(value)
            .ok_or_else(|| BorrowerValidationError::InvalidCardId(value.to_string()))?;
        captures[1]
            .parse::<u64>()
            .map_err(|_| BorrowerValidationError::InvalidCardId(value.to_string()))?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CardId {
    type Error = BorrowerValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CardId> for String {
    fn from(value: CardId) -> Self {
        value.0
    }
}

/// Registration input field names, in validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowerField {
    Name,
    Address,
    Phone,
    Ssn,
}

impl BorrowerField {
    /// Human-readable label for user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Borrower name",
            Self::Address => "Address",
            Self::Phone => "Phone number",
            Self::Ssn => "SSN",
        }
    }
}

/// Domain validation failure for borrower input or persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowerValidationError {
    /// Required field is empty or whitespace-only.
    MissingField(BorrowerField),
    /// Card id does not match `ID` + digits.
    InvalidCardId(String),
}

impl Display for BorrowerValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "{} is required", field.label()),
            Self::InvalidCardId(value) => write!(f, "invalid card id `{value}`"),
        }
    }
}

impl Error for BorrowerValidationError {}

/// Persisted borrower record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrower {
    pub card_id: CardId,
    pub name: String,
    pub address: String,
    pub phone: String,
    /// Unique per borrower.
    pub ssn: String,
}

/// Validated registration input.
///
/// Construction trims every field, so persisted values never carry
/// surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBorrower {
    name: String,
    address: String,
    phone: String,
    ssn: String,
}

impl NewBorrower {
    /// Trims and validates raw registration input.
    ///
    /// # Errors
    /// - Returns `MissingField` for the first blank field, checked in the order
    ///   name, address, phone, ssn.
    pub fn new(
        name: &str,
        address: &str,
        phone: &str,
        ssn: &str,
    ) -> Result<Self, BorrowerValidationError> {
        Ok(Self {
            name: required(BorrowerField::Name, name)?,
            address: required(BorrowerField::Address, address)?,
            phone: required(BorrowerField::Phone, phone)?,
            ssn: required(BorrowerField::Ssn, ssn)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn ssn(&self) -> &str {
        &self.ssn
    }

    /// Binds this input to an allocated card id.
    pub fn into_borrower(self, card_id: CardId) -> Borrower {
        Borrower {
            card_id,
            name: self.name,
            address: self.address,
            phone: self.phone,
            ssn: self.ssn,
        }
    }
}

fn required(field: BorrowerField, value: &str) -> Result<String, BorrowerValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BorrowerValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}
